use crate::nutrition::summary::ReceiptSummary;

pub const FEEDBACK_DEFAULT: &str = "Keep up the good work!";
pub const FEEDBACK_PROCESSED: &str =
    "A lot of your basket is processed food. Try swapping some of it for fresh alternatives.";
pub const FEEDBACK_FRESH: &str =
    "Less than half of your food purchases are fresh. Add more fresh food to your basket.";
pub const FEEDBACK_SUGAR: &str =
    "High-sugar items make up a big share of your basket. Watch out for hidden sugar.";

/// The per-user nutrition rollup, derived from all qualifying receipts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserAggregate {
    pub nutrition_score: f64,
    pub fresh_foods_pct: f64,
    pub high_sugar_pct: f64,
    pub processed_pct: f64,
    pub good_nutri_score_pct: f64,
    pub feedback: &'static str,
}

/// Folds per-receipt summaries into the user-level aggregate.
///
/// Each numeric field is the arithmetic mean of the receipts' own
/// already-normalized values (mean of means, not re-weighted by item
/// count), so the result is invariant to receipt order and recomputable
/// from scratch at any time. Zero receipts yields all zeros with the
/// default feedback message.
pub fn aggregate_receipt_summaries(summaries: &[ReceiptSummary]) -> UserAggregate {
    if summaries.is_empty() {
        return UserAggregate {
            feedback: FEEDBACK_DEFAULT,
            ..UserAggregate::default()
        };
    }

    let n = summaries.len() as f64;
    let mean = |f: fn(&ReceiptSummary) -> f64| summaries.iter().map(f).sum::<f64>() / n;

    let mut aggregate = UserAggregate {
        nutrition_score: mean(|s| s.calculated_score),
        fresh_foods_pct: mean(|s| s.fresh_foods),
        high_sugar_pct: mean(|s| s.high_sugar_items),
        processed_pct: mean(|s| s.processed_food),
        good_nutri_score_pct: mean(|s| s.good_nutri_score),
        feedback: FEEDBACK_DEFAULT,
    };
    aggregate.feedback = pick_feedback(&aggregate);
    aggregate
}

/// Threshold rules evaluated in fixed order; later rules override earlier
/// ones, so only the last matching message survives.
fn pick_feedback(aggregate: &UserAggregate) -> &'static str {
    let mut message = FEEDBACK_DEFAULT;
    if aggregate.processed_pct > 30.0 {
        message = FEEDBACK_PROCESSED;
    }
    if aggregate.fresh_foods_pct < 50.0 {
        message = FEEDBACK_FRESH;
    }
    if aggregate.high_sugar_pct > 20.0 {
        message = FEEDBACK_SUGAR;
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(score: f64, fresh: f64, sugar: f64, processed: f64, good: f64) -> ReceiptSummary {
        ReceiptSummary {
            calculated_score: score,
            fresh_foods: fresh,
            high_sugar_items: sugar,
            processed_food: processed,
            good_nutri_score: good,
        }
    }

    #[test]
    fn test_no_receipts_is_all_zero_with_default_feedback() {
        let agg = aggregate_receipt_summaries(&[]);
        assert_eq!(agg.nutrition_score, 0.0);
        assert_eq!(agg.fresh_foods_pct, 0.0);
        assert_eq!(agg.feedback, FEEDBACK_DEFAULT);
    }

    #[test]
    fn test_single_receipt_passes_through() {
        let agg = aggregate_receipt_summaries(&[summary(100.0, 100.0, 0.0, 0.0, 0.0)]);
        assert_eq!(agg.nutrition_score, 100.0);
        assert_eq!(agg.fresh_foods_pct, 100.0);
    }

    #[test]
    fn test_mean_of_means_not_item_weighted() {
        // one "receipt" at 100% fresh, one at 0%; means are averaged as-is
        let agg = aggregate_receipt_summaries(&[
            summary(100.0, 100.0, 0.0, 0.0, 0.0),
            summary(-100.0, 0.0, 50.0, 50.0, 0.0),
        ]);
        assert_eq!(agg.fresh_foods_pct, 50.0);
        assert_eq!(agg.nutrition_score, 0.0);
        assert_eq!(agg.high_sugar_pct, 25.0);
    }

    #[test]
    fn test_aggregate_is_order_invariant() {
        let a = summary(60.0, 80.0, 10.0, 10.0, 0.0);
        let b = summary(-20.0, 30.0, 25.0, 25.0, 0.0);
        let c = summary(100.0, 100.0, 0.0, 0.0, 0.0);
        assert_eq!(
            aggregate_receipt_summaries(&[a, b, c]),
            aggregate_receipt_summaries(&[c, a, b])
        );
    }

    #[test]
    fn test_aggregate_is_idempotent() {
        let receipts = [
            summary(50.0, 70.0, 10.0, 10.0, 0.0),
            summary(0.0, 40.0, 20.0, 20.0, 0.0),
        ];
        assert_eq!(
            aggregate_receipt_summaries(&receipts),
            aggregate_receipt_summaries(&receipts)
        );
    }

    #[test]
    fn test_feedback_default_when_healthy() {
        // fresh >= 50, processed <= 30, sugar <= 20
        let agg = aggregate_receipt_summaries(&[summary(60.0, 70.0, 10.0, 20.0, 10.0)]);
        assert_eq!(agg.feedback, FEEDBACK_DEFAULT);
    }

    #[test]
    fn test_feedback_processed_rule() {
        let agg = aggregate_receipt_summaries(&[summary(0.0, 60.0, 5.0, 40.0, 0.0)]);
        assert_eq!(agg.feedback, FEEDBACK_PROCESSED);
    }

    #[test]
    fn test_feedback_fresh_rule_overrides_processed() {
        // both processed > 30 and fresh < 50 trigger; fresh is evaluated later
        let agg = aggregate_receipt_summaries(&[summary(0.0, 30.0, 5.0, 40.0, 0.0)]);
        assert_eq!(agg.feedback, FEEDBACK_FRESH);
    }

    #[test]
    fn test_feedback_sugar_rule_wins_over_everything() {
        // all three thresholds trigger; the sugar rule is last
        let agg = aggregate_receipt_summaries(&[summary(-50.0, 20.0, 40.0, 40.0, 0.0)]);
        assert_eq!(agg.feedback, FEEDBACK_SUGAR);
    }

    #[test]
    fn test_feedback_thresholds_are_strict() {
        // exactly at the thresholds: no rule fires except fresh < 50 needs strictness too
        let agg = aggregate_receipt_summaries(&[summary(0.0, 50.0, 20.0, 30.0, 0.0)]);
        assert_eq!(agg.feedback, FEEDBACK_DEFAULT);
    }
}
