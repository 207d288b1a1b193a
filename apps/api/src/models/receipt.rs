use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// Coarse nutrition bucket assigned to a food item.
///
/// The wire strings ("Fresh Food", "Good Nutri-Score", ...) are what the
/// model is prompted to emit and what the frontend displays; anything
/// unrecognized parses as `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    #[serde(rename = "Fresh Food")]
    FreshFood,
    #[serde(rename = "Processed")]
    Processed,
    #[serde(rename = "High Sugar")]
    HighSugar,
    #[serde(rename = "Good Nutri-Score")]
    GoodNutriScore,
    #[serde(rename = "Other")]
    Other,
}

impl Classification {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "fresh food" => Classification::FreshFood,
            "processed" => Classification::Processed,
            "high sugar" => Classification::HighSugar,
            "good nutri-score" | "good nutri score" | "good nutriscore" => {
                Classification::GoodNutriScore
            }
            _ => Classification::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::FreshFood => "Fresh Food",
            Classification::Processed => "Processed",
            Classification::HighSugar => "High Sugar",
            Classification::GoodNutriScore => "Good Nutri-Score",
            Classification::Other => "Other",
        }
    }
}

/// One purchased item as extracted (or corrected) from a receipt.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzedItem {
    /// Verbatim label from the receipt, never translated.
    pub original_label: String,
    /// Normalized English product name.
    pub suggested_name: String,
    pub price: f64,
    pub is_food_item: bool,
    pub classification: Classification,
    pub nutrition_notes: Vec<String>,
}

impl AnalyzedItem {
    /// Classification and notes are meaningless for non-food items.
    /// Producers call this before handing an item on; consumers re-check
    /// `is_food_item` anyway rather than trusting it was called.
    pub fn enforce_non_food_rule(&mut self) {
        if !self.is_food_item {
            self.classification = Classification::Other;
            self.nutrition_notes.clear();
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ReceiptRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub purchase_date: NaiveDate,
    pub total_amount: f64,
    pub currency: String,
    pub raw_text: String,
    pub source_name: String,
    pub status: String,
    pub ai_feedback: String,
    pub nutrition_summary: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ItemRow {
    pub id: Uuid,
    pub receipt_id: Uuid,
    pub original_bill_label: String,
    pub ai_suggested_name: String,
    pub price: f64,
    pub is_food_item: bool,
    pub classification: String,
    pub nutrition_notes: Vec<String>,
    pub manual_correction: bool,
    /// Display order within the receipt; mirrors the item's position in the
    /// extraction (or correction) list.
    pub position: i32,
}

/// Wire shape for one receipt as exposed to the presentation layer.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptResponse {
    pub id: Uuid,
    pub purchase_date: NaiveDate,
    pub total_amount: f64,
    pub currency: String,
    pub status: String,
    pub items: Vec<ItemResponse>,
    pub nutrition_summary: Value,
    pub ai_feedback: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemResponse {
    pub id: Uuid,
    pub original_bill_label: String,
    pub ai_suggested_name: String,
    pub price: f64,
    pub is_food_item: bool,
    pub classification: String,
    pub nutrition_notes: Vec<String>,
    pub manual_correction: bool,
}

impl ReceiptResponse {
    pub fn from_rows(receipt: ReceiptRow, items: Vec<ItemRow>) -> Self {
        ReceiptResponse {
            id: receipt.id,
            purchase_date: receipt.purchase_date,
            total_amount: receipt.total_amount,
            currency: receipt.currency,
            status: receipt.status,
            items: items.into_iter().map(ItemResponse::from).collect(),
            nutrition_summary: receipt.nutrition_summary,
            ai_feedback: receipt.ai_feedback,
        }
    }
}

impl From<ItemRow> for ItemResponse {
    fn from(row: ItemRow) -> Self {
        ItemResponse {
            id: row.id,
            original_bill_label: row.original_bill_label,
            ai_suggested_name: row.ai_suggested_name,
            price: row.price,
            is_food_item: row.is_food_item,
            classification: row.classification,
            nutrition_notes: row.nutrition_notes,
            manual_correction: row.manual_correction,
        }
    }
}
