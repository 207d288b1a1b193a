use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::receipt::{AnalyzedItem, Classification};

/// Derived nutrition summary for one receipt.
///
/// Percentages are over food items only (non-food items do not count
/// toward the denominator). `calculated_score` is
/// `(fresh + goodNutri) - (processed + highSugar)`, so it always lies in
/// [-200, 200]. A receipt with zero food items summarizes to all zeros.
///
/// This is the canonical shape persisted in the `nutrition_summary` JSONB
/// column; `from_value` is the validating parse at that storage boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptSummary {
    pub calculated_score: f64,
    pub fresh_foods: f64,
    pub high_sugar_items: f64,
    pub processed_food: f64,
    pub good_nutri_score: f64,
}

impl ReceiptSummary {
    /// Parses a persisted summary, rejecting values that could not have
    /// been produced by `summarize_items`. Persisted data is not trusted.
    pub fn from_value(value: &Value) -> Result<Self> {
        let summary: ReceiptSummary = serde_json::from_value(value.clone())?;
        for pct in [
            summary.fresh_foods,
            summary.high_sugar_items,
            summary.processed_food,
            summary.good_nutri_score,
        ] {
            if !pct.is_finite() || !(0.0..=100.0).contains(&pct) {
                bail!("percentage out of range in stored nutrition summary: {pct}");
            }
        }
        if !summary.calculated_score.is_finite()
            || !(-200.0..=200.0).contains(&summary.calculated_score)
        {
            bail!(
                "score out of range in stored nutrition summary: {}",
                summary.calculated_score
            );
        }
        Ok(summary)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Computes the nutrition summary for one receipt's item list.
///
/// Only items with `is_food_item` set count, both in the denominator and in
/// the per-bucket tallies; the flag is re-checked here rather than assuming
/// upstream enforced the non-food rule.
pub fn summarize_items(items: &[AnalyzedItem]) -> ReceiptSummary {
    let food_count = items.iter().filter(|i| i.is_food_item).count();
    if food_count == 0 {
        return ReceiptSummary::default();
    }

    let bucket_count = |c: Classification| {
        items
            .iter()
            .filter(|i| i.is_food_item && i.classification == c)
            .count()
    };

    let pct = |count: usize| count as f64 / food_count as f64 * 100.0;

    let fresh_foods = pct(bucket_count(Classification::FreshFood));
    let high_sugar_items = pct(bucket_count(Classification::HighSugar));
    let processed_food = pct(bucket_count(Classification::Processed));
    let good_nutri_score = pct(bucket_count(Classification::GoodNutriScore));

    ReceiptSummary {
        calculated_score: fresh_foods + good_nutri_score - processed_food - high_sugar_items,
        fresh_foods,
        high_sugar_items,
        processed_food,
        good_nutri_score,
    }
}
