use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One row per user: the running nutrition aggregate over all of that
/// user's processed and verified receipts. Always recomputed from scratch,
/// never incrementally updated.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserSummaryRow {
    pub user_id: Uuid,
    pub nutrition_score: f64,
    pub fresh_foods_pct: f64,
    pub high_sugar_pct: f64,
    pub processed_pct: f64,
    pub good_nutri_score_pct: f64,
    pub overall_feedback: String,
    pub updated_at: DateTime<Utc>,
}

/// Wire shape of the user aggregate as the dashboard consumes it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummaryResponse {
    pub nutrition_score: f64,
    pub fresh_foods_percentage: f64,
    pub high_sugar_items_percentage: f64,
    pub processed_food_percentage: f64,
    pub good_nutri_score_percentage: f64,
    pub overall_ai_feedback: String,
}

impl From<UserSummaryRow> for UserSummaryResponse {
    fn from(row: UserSummaryRow) -> Self {
        UserSummaryResponse {
            nutrition_score: row.nutrition_score,
            fresh_foods_percentage: row.fresh_foods_pct,
            high_sugar_items_percentage: row.high_sugar_pct,
            processed_food_percentage: row.processed_pct,
            good_nutri_score_percentage: row.good_nutri_score_pct,
            overall_ai_feedback: row.overall_feedback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_response_uses_pinned_wire_keys() {
        let row = UserSummaryRow {
            user_id: Uuid::nil(),
            nutrition_score: 40.0,
            fresh_foods_pct: 60.0,
            high_sugar_pct: 10.0,
            processed_pct: 10.0,
            good_nutri_score_pct: 0.0,
            overall_feedback: "Keep up the good work!".to_string(),
            updated_at: DateTime::<Utc>::MIN_UTC,
        };
        let json = serde_json::to_value(UserSummaryResponse::from(row)).unwrap();
        assert!(json.get("nutritionScore").is_some());
        assert!(json.get("freshFoodsPercentage").is_some());
        assert!(json.get("highSugarItemsPercentage").is_some());
        assert!(json.get("processedFoodPercentage").is_some());
        assert!(json.get("goodNutriScorePercentage").is_some());
        assert!(json.get("overallAiFeedback").is_some());
    }
}
