use tracing::info;

use crate::errors::PipelineError;
use crate::llm_client::{strip_code_fences, ModelClient};
use crate::receipt::prompts::{CLASSIFY_PROMPT, CLASSIFY_SYSTEM};

/// Asks the model whether the extracted text plausibly comes from a grocery
/// receipt. A negative verdict halts the pipeline before any further model
/// call: line analysis is many chunked calls, so this gate preserves quota.
pub async fn ensure_grocery_receipt(
    raw_text: &str,
    model: &dyn ModelClient,
) -> Result<(), PipelineError> {
    let prompt = CLASSIFY_PROMPT.replace("{raw_text}", raw_text);
    let response = model.generate(CLASSIFY_SYSTEM, &prompt).await?;
    let verdict = strip_code_fences(&response).trim().to_string();

    if is_truthy_verdict(&verdict) {
        info!("document accepted as grocery receipt");
        Ok(())
    } else {
        Err(PipelineError::NotAReceipt { verdict })
    }
}

/// The prompt pins the model to TRUE/FALSE, but the parse is tolerant:
/// case-insensitive TRUE or YES counts as truthy, anything else is falsy.
fn is_truthy_verdict(verdict: &str) -> bool {
    verdict.eq_ignore_ascii_case("TRUE") || verdict.eq_ignore_ascii_case("YES")
}
