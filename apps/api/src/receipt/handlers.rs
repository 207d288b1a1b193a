use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::errors::AppError;
use crate::extract::{extract_raw_text, is_allowed_mime_type, UploadedDocument, MAX_UPLOAD_BYTES};
use crate::models::receipt::{AnalyzedItem, Classification, ReceiptResponse};
use crate::models::user::UserSummaryResponse;
use crate::receipt::analyze::analyze_receipt;
use crate::receipt::storage;
use crate::state::AppState;

/// Multipart field carrying the uploaded document.
const UPLOAD_FIELD: &str = "receiptFile";

/// POST /api/v1/receipts/upload
pub async fn handle_upload(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ReceiptResponse>), AppError> {
    let document = read_upload(&mut multipart).await?;

    let raw_text = extract_raw_text(&document, state.model.as_ref()).await?;
    let analyzed = analyze_receipt(raw_text, state.model.as_ref()).await?;
    let receipt_id =
        storage::create_receipt(&state.db, user_id, &document.original_filename, &analyzed).await?;

    let (receipt, items) = storage::get_receipt(&state.db, user_id, receipt_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Receipt {receipt_id} not found")))?;
    Ok((
        StatusCode::CREATED,
        Json(ReceiptResponse::from_rows(receipt, items)),
    ))
}

/// Pulls the document out of the multipart body, enforcing the type
/// allow-list and the size cap before any AI work is spent on it.
async fn read_upload(multipart: &mut Multipart) -> Result<UploadedDocument, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart upload: {e}")))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let original_filename = field.file_name().unwrap_or("receipt").to_string();
        let mime_type = field.content_type().unwrap_or_default().to_string();
        if !is_allowed_mime_type(&mime_type) {
            return Err(AppError::Validation(
                "Invalid file type. Only JPEG, PNG or PDF are allowed.".to_string(),
            ));
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read uploaded file: {e}")))?;
        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(AppError::Validation(
                "File exceeds the 5MB size limit".to_string(),
            ));
        }

        return Ok(UploadedDocument {
            bytes,
            mime_type,
            original_filename,
        });
    }

    Err(AppError::Validation(format!(
        "Missing '{UPLOAD_FIELD}' file field"
    )))
}

/// GET /api/v1/receipts
pub async fn handle_list_receipts(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> Result<Json<Vec<ReceiptResponse>>, AppError> {
    let receipts = storage::list_receipts(&state.db, user_id).await?;
    Ok(Json(
        receipts
            .into_iter()
            .map(|(receipt, items)| ReceiptResponse::from_rows(receipt, items))
            .collect(),
    ))
}

/// GET /api/v1/receipts/:id
pub async fn handle_get_receipt(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(receipt_id): Path<Uuid>,
) -> Result<Json<ReceiptResponse>, AppError> {
    let (receipt, items) = storage::get_receipt(&state.db, user_id, receipt_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Receipt {receipt_id} not found")))?;
    Ok(Json(ReceiptResponse::from_rows(receipt, items)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub items: Vec<VerifyItem>,
    /// User note stored as the receipt's feedback; any client-supplied
    /// summary numbers are ignored, the summary is derived server-side.
    #[serde(default)]
    pub feedback: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyItem {
    pub original_bill_label: String,
    pub ai_suggested_name: String,
    pub price: f64,
    pub is_food_item: bool,
    pub classification: String,
    #[serde(default)]
    pub nutrition_notes: Vec<String>,
}

impl VerifyItem {
    fn into_item(self) -> AnalyzedItem {
        let mut item = AnalyzedItem {
            original_label: self.original_bill_label,
            suggested_name: self.ai_suggested_name,
            price: if self.price.is_finite() {
                self.price.max(0.0)
            } else {
                0.0
            },
            is_food_item: self.is_food_item,
            classification: Classification::parse(&self.classification),
            nutrition_notes: self.nutrition_notes,
        };
        item.enforce_non_food_rule();
        item
    }
}

/// POST /api/v1/receipts/:id/verify
pub async fn handle_verify(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
    Path(receipt_id): Path<Uuid>,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<ReceiptResponse>, AppError> {
    let items: Vec<AnalyzedItem> = req.items.into_iter().map(VerifyItem::into_item).collect();
    let feedback = req.feedback.unwrap_or_else(|| "Verified by user.".to_string());

    storage::verify_receipt(&state.db, user_id, receipt_id, &items, &feedback).await?;

    let (receipt, items) = storage::get_receipt(&state.db, user_id, receipt_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Receipt {receipt_id} not found")))?;
    Ok(Json(ReceiptResponse::from_rows(receipt, items)))
}

/// GET /api/v1/profile/summary
pub async fn handle_profile_summary(
    State(state): State<AppState>,
    AuthenticatedUser(user_id): AuthenticatedUser,
) -> Result<Json<UserSummaryResponse>, AppError> {
    let summary = storage::get_user_summary(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("No nutrition summary found".to_string()))?;
    Ok(Json(UserSummaryResponse::from(summary)))
}
