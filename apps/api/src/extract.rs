use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use bytes::Bytes;
use tracing::warn;

use crate::errors::PipelineError;
use crate::llm_client::ModelClient;

/// Upload cap enforced at the transport boundary.
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

pub const ALLOWED_MIME_TYPES: [&str; 3] = ["image/jpeg", "image/png", "application/pdf"];

const TRANSCRIBE_SYSTEM: &str = "\
You are a precise OCR engine for shopping receipts. \
Transcribe the full text of the receipt image exactly as printed, one \
output line per receipt line, top to bottom. \
Output only the transcribed text — no commentary, no markdown.";

const TRANSCRIBE_PROMPT: &str = "Transcribe all text on this receipt image.";

/// One uploaded document as handed over by the transport boundary.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    pub bytes: Bytes,
    pub mime_type: String,
    pub original_filename: String,
}

pub fn is_allowed_mime_type(mime_type: &str) -> bool {
    ALLOWED_MIME_TYPES.contains(&mime_type)
}

/// Pulls the raw text out of an uploaded document.
///
/// PDFs are read from their text layer; images go through one model
/// transcription call, after which both paths feed the same pipeline.
/// Empty or whitespace-only output means the document is unreadable, which
/// is terminal and not retried — "unreadable" is structural, unlike
/// "readable but not a receipt", which is the classifier's call.
pub async fn extract_raw_text(
    document: &UploadedDocument,
    model: &dyn ModelClient,
) -> Result<String, PipelineError> {
    let text = match document.mime_type.as_str() {
        "application/pdf" => {
            pdf_extract::extract_text_from_mem(&document.bytes).map_err(|e| {
                warn!(
                    "pdf text extraction failed for {:?}: {e}",
                    document.original_filename
                );
                PipelineError::ExtractionFailed
            })?
        }
        _ => {
            let encoded = BASE64.encode(&document.bytes);
            model
                .generate_from_image(
                    TRANSCRIBE_SYSTEM,
                    TRANSCRIBE_PROMPT,
                    &document.mime_type,
                    &encoded,
                )
                .await?
        }
    };

    if text.trim().is_empty() {
        return Err(PipelineError::ExtractionFailed);
    }
    Ok(text)
}
