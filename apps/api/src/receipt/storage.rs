use std::collections::HashMap;

use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::receipt::{AnalyzedItem, ItemRow, ReceiptRow};
use crate::models::user::UserSummaryRow;
use crate::nutrition::aggregate::aggregate_receipt_summaries;
use crate::nutrition::summary::{summarize_items, ReceiptSummary};
use crate::receipt::analyze::AnalyzedReceipt;

/// Feedback note seeded on a freshly uploaded receipt.
const INITIAL_FEEDBACK: &str = "Initial AI analysis complete. Verify items.";

/// Persists a freshly analyzed receipt and folds it into the owner's
/// nutrition aggregate. One transaction: the receipt row, its items and the
/// updated user aggregate commit together or not at all.
pub async fn create_receipt(
    db: &PgPool,
    user_id: Uuid,
    source_name: &str,
    analyzed: &AnalyzedReceipt,
) -> Result<Uuid, AppError> {
    let receipt_id = Uuid::new_v4();
    let mut tx = db.begin().await?;
    lock_user_aggregate(&mut tx, user_id).await?;

    // missing metadata falls back to today / 0 / EUR
    let purchase_date = analyzed
        .metadata
        .purchase_date
        .unwrap_or_else(|| Utc::now().date_naive());
    let total_amount = analyzed.metadata.total_amount.unwrap_or(0.0);
    let currency = analyzed
        .metadata
        .currency
        .clone()
        .unwrap_or_else(|| "EUR".to_string());

    sqlx::query(
        r#"
        INSERT INTO receipts
            (id, user_id, purchase_date, total_amount, currency, raw_text,
             source_name, status, ai_feedback, nutrition_summary)
        VALUES ($1, $2, $3, $4, $5, $6, $7, 'processed', $8, $9)
        "#,
    )
    .bind(receipt_id)
    .bind(user_id)
    .bind(purchase_date)
    .bind(total_amount)
    .bind(&currency)
    .bind(&analyzed.raw_text)
    .bind(source_name)
    .bind(INITIAL_FEEDBACK)
    .bind(analyzed.summary.to_value())
    .execute(&mut *tx)
    .await?;

    insert_items(&mut tx, receipt_id, &analyzed.items, false).await?;
    recompute_user_aggregate(&mut tx, user_id).await?;

    tx.commit().await?;
    info!(
        "created receipt {receipt_id} for user {user_id} ({} items)",
        analyzed.items.len()
    );
    Ok(receipt_id)
}

/// Applies user corrections to a receipt: ownership check, wholesale item
/// replacement (delete-all, insert-new — a shrinking edit must not leave
/// stale items), server-side summary recompute, `status = verified`, then
/// the owner's aggregate recompute. One atomic unit; partial application is
/// never observable.
pub async fn verify_receipt(
    db: &PgPool,
    user_id: Uuid,
    receipt_id: Uuid,
    items: &[AnalyzedItem],
    feedback: &str,
) -> Result<(), AppError> {
    let mut tx = db.begin().await?;
    lock_user_aggregate(&mut tx, user_id).await?;

    // ownership-scoped lookup: another user's receipt reads as missing
    let owned: Option<Uuid> =
        sqlx::query_scalar("SELECT id FROM receipts WHERE id = $1 AND user_id = $2 FOR UPDATE")
            .bind(receipt_id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
    if owned.is_none() {
        return Err(AppError::NotFound(format!("Receipt {receipt_id} not found")));
    }

    // the summary is derived, never client-settable
    let summary = summarize_items(items);

    sqlx::query(
        "UPDATE receipts SET nutrition_summary = $1, ai_feedback = $2, status = 'verified' WHERE id = $3",
    )
    .bind(summary.to_value())
    .bind(feedback)
    .bind(receipt_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM receipt_items WHERE receipt_id = $1")
        .bind(receipt_id)
        .execute(&mut *tx)
        .await?;
    insert_items(&mut tx, receipt_id, items, true).await?;

    recompute_user_aggregate(&mut tx, user_id).await?;

    tx.commit().await?;
    info!(
        "verified receipt {receipt_id} for user {user_id} ({} items)",
        items.len()
    );
    Ok(())
}

async fn insert_items(
    tx: &mut Transaction<'_, Postgres>,
    receipt_id: Uuid,
    items: &[AnalyzedItem],
    manual_correction: bool,
) -> Result<(), AppError> {
    for (position, item) in items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO receipt_items
                (id, receipt_id, original_bill_label, ai_suggested_name, price,
                 is_food_item, classification, nutrition_notes, manual_correction, position)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(receipt_id)
        .bind(&item.original_label)
        .bind(&item.suggested_name)
        .bind(item.price)
        .bind(item.is_food_item)
        .bind(item.classification.as_str())
        .bind(&item.nutrition_notes)
        .bind(manual_correction)
        .bind(position as i32)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// Serializes all aggregate recomputation for one user. Two concurrent
/// writes for the same user queue on this lock instead of racing the
/// read-then-write; the lock is transaction-scoped and released at commit.
async fn lock_user_aggregate(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
) -> Result<(), AppError> {
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(user_lock_key(user_id))
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Stable 64-bit advisory-lock key for a user id: the two halves of the
/// UUID folded together.
fn user_lock_key(user_id: Uuid) -> i64 {
    let bits = user_id.as_u128();
    let folded = ((bits >> 64) ^ (bits & u128::from(u64::MAX))) as u64;
    folded as i64
}

/// Recomputes the user's nutrition aggregate from scratch inside the
/// caller's transaction and upserts the single summary row. Must run under
/// `lock_user_aggregate`.
async fn recompute_user_aggregate(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
) -> Result<(), AppError> {
    let stored: Vec<serde_json::Value> = sqlx::query_scalar(
        "SELECT nutrition_summary FROM receipts WHERE user_id = $1 AND status IN ('processed', 'verified')",
    )
    .bind(user_id)
    .fetch_all(&mut **tx)
    .await?;

    let mut summaries = Vec::with_capacity(stored.len());
    for value in &stored {
        match ReceiptSummary::from_value(value) {
            Ok(summary) => summaries.push(summary),
            Err(e) => {
                warn!("skipping malformed stored nutrition summary for user {user_id}: {e}");
            }
        }
    }

    let aggregate = aggregate_receipt_summaries(&summaries);

    sqlx::query(
        r#"
        INSERT INTO user_nutrition_summaries
            (user_id, nutrition_score, fresh_foods_pct, high_sugar_pct,
             processed_pct, good_nutri_score_pct, overall_feedback, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, now())
        ON CONFLICT (user_id) DO UPDATE SET
            nutrition_score = EXCLUDED.nutrition_score,
            fresh_foods_pct = EXCLUDED.fresh_foods_pct,
            high_sugar_pct = EXCLUDED.high_sugar_pct,
            processed_pct = EXCLUDED.processed_pct,
            good_nutri_score_pct = EXCLUDED.good_nutri_score_pct,
            overall_feedback = EXCLUDED.overall_feedback,
            updated_at = now()
        "#,
    )
    .bind(user_id)
    .bind(aggregate.nutrition_score)
    .bind(aggregate.fresh_foods_pct)
    .bind(aggregate.high_sugar_pct)
    .bind(aggregate.processed_pct)
    .bind(aggregate.good_nutri_score_pct)
    .bind(aggregate.feedback)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Returns one receipt with its items, scoped to the owning user.
pub async fn get_receipt(
    db: &PgPool,
    user_id: Uuid,
    receipt_id: Uuid,
) -> Result<Option<(ReceiptRow, Vec<ItemRow>)>, AppError> {
    let receipt: Option<ReceiptRow> =
        sqlx::query_as("SELECT * FROM receipts WHERE id = $1 AND user_id = $2")
            .bind(receipt_id)
            .bind(user_id)
            .fetch_optional(db)
            .await?;
    let Some(receipt) = receipt else {
        return Ok(None);
    };

    let items: Vec<ItemRow> =
        sqlx::query_as("SELECT * FROM receipt_items WHERE receipt_id = $1 ORDER BY position")
            .bind(receipt_id)
            .fetch_all(db)
            .await?;

    Ok(Some((receipt, items)))
}

/// Returns all of the user's receipts with their items, newest first.
pub async fn list_receipts(
    db: &PgPool,
    user_id: Uuid,
) -> Result<Vec<(ReceiptRow, Vec<ItemRow>)>, AppError> {
    let receipts: Vec<ReceiptRow> = sqlx::query_as(
        "SELECT * FROM receipts WHERE user_id = $1 ORDER BY purchase_date DESC, created_at DESC",
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;

    let receipt_ids: Vec<Uuid> = receipts.iter().map(|r| r.id).collect();
    let items: Vec<ItemRow> =
        sqlx::query_as("SELECT * FROM receipt_items WHERE receipt_id = ANY($1) ORDER BY position")
            .bind(&receipt_ids)
            .fetch_all(db)
            .await?;

    let mut grouped: HashMap<Uuid, Vec<ItemRow>> = HashMap::new();
    for item in items {
        grouped.entry(item.receipt_id).or_default().push(item);
    }

    Ok(receipts
        .into_iter()
        .map(|receipt| {
            let items = grouped.remove(&receipt.id).unwrap_or_default();
            (receipt, items)
        })
        .collect())
}

/// Returns the user's nutrition aggregate row, if any receipt has ever
/// been folded in.
pub async fn get_user_summary(
    db: &PgPool,
    user_id: Uuid,
) -> Result<Option<UserSummaryRow>, AppError> {
    Ok(
        sqlx::query_as("SELECT * FROM user_nutrition_summaries WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(db)
            .await?,
    )
}
