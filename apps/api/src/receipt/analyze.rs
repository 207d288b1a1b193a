use tracing::info;

use crate::errors::PipelineError;
use crate::llm_client::ModelClient;
use crate::models::receipt::AnalyzedItem;
use crate::nutrition::summary::{summarize_items, ReceiptSummary};
use crate::receipt::classify::ensure_grocery_receipt;
use crate::receipt::lines::analyze_lines;
use crate::receipt::metadata::{extract_metadata, ReceiptMetadata};

/// A fully analyzed receipt, assembled but not yet persisted.
#[derive(Debug, Clone)]
pub struct AnalyzedReceipt {
    pub raw_text: String,
    pub metadata: ReceiptMetadata,
    pub items: Vec<AnalyzedItem>,
    pub summary: ReceiptSummary,
}

/// Runs the full analysis chain over extracted receipt text.
///
/// The classification gate comes first and nothing else runs if it fails.
/// Metadata extraction and line analysis are independent reads of the same
/// text and run concurrently; the merge is a pure join of both results.
pub async fn analyze_receipt(
    raw_text: String,
    model: &dyn ModelClient,
) -> Result<AnalyzedReceipt, PipelineError> {
    ensure_grocery_receipt(&raw_text, model).await?;

    let (metadata, items) = tokio::join!(
        extract_metadata(&raw_text, model),
        analyze_lines(&raw_text, model),
    );
    let items = items?;
    let summary = summarize_items(&items);

    info!(
        "receipt analyzed: {} items, score {:.1}",
        items.len(),
        summary.calculated_score
    );

    Ok(AnalyzedReceipt {
        raw_text,
        metadata,
        items,
        summary,
    })
}
