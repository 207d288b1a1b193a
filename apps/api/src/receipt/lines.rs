use futures::future::join_all;
use tracing::{debug, warn};

use crate::errors::PipelineError;
use crate::llm_client::{strip_code_fences, LlmError, ModelClient};
use crate::models::receipt::{AnalyzedItem, Classification};
use crate::receipt::prompts::{LINE_PROMPT, LINE_SYSTEM};

/// Lines per batch. All calls within a batch run concurrently and are
/// joined before the next batch is issued, so at most this many model calls
/// are in flight at any time. This is the backpressure mechanism against
/// provider rate limits.
pub const LINE_BATCH_SIZE: usize = 5;

/// Additional attempts for a batch in which every call failed.
const MAX_BATCH_RETRIES: u32 = 2;

const IGNORE_SENTINEL: &str = "IGNORE";
const EMPTY_NOTES_SENTINEL: &str = "EMPTY";

/// Outcome of parsing one per-line model response. Callers pattern-match;
/// a bad shape never throws.
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    Item(AnalyzedItem),
    Ignored,
    Malformed(String),
}

/// Parses one model response against the six-field pipe contract:
/// `originalBillLabel|aiSuggestedName|price|isFoodItem|classification|nutritionDetails`
/// or the literal `IGNORE` sentinel for non-item lines.
pub fn parse_line_response(response: &str) -> LineOutcome {
    let response = strip_code_fences(response).trim();

    if response.eq_ignore_ascii_case(IGNORE_SENTINEL) {
        return LineOutcome::Ignored;
    }

    let fields: Vec<&str> = response.split('|').collect();
    if fields.len() != 6 {
        return LineOutcome::Malformed(response.to_string());
    }

    let price = fields[2]
        .trim()
        .replace(',', ".")
        .parse::<f64>()
        .unwrap_or(0.0)
        .max(0.0);

    let mut item = AnalyzedItem {
        original_label: fields[0].trim().to_string(),
        suggested_name: fields[1].trim().to_string(),
        price,
        is_food_item: fields[3].trim().eq_ignore_ascii_case("true"),
        classification: Classification::parse(fields[4]),
        nutrition_notes: parse_nutrition_notes(fields[5]),
    };
    item.enforce_non_food_rule();
    LineOutcome::Item(item)
}

fn parse_nutrition_notes(field: &str) -> Vec<String> {
    let field = field.trim();
    if field.is_empty() || field.eq_ignore_ascii_case(EMPTY_NOTES_SENTINEL) {
        return Vec::new();
    }
    field
        .split(',')
        .map(|note| note.trim().to_string())
        .filter(|note| !note.is_empty())
        .collect()
}

/// Runs per-line analysis over all non-empty lines of the receipt text.
///
/// Lines are processed in fixed-size batches; batch N+1 is only issued
/// after batch N fully resolves. Within a batch, an individual call failure
/// degrades to "line skipped" and a malformed response is discarded — one
/// bad line never aborts the receipt. A batch in which every call failed is
/// treated as a provider outage and retried a bounded number of times
/// before the whole analysis fails.
pub async fn analyze_lines(
    raw_text: &str,
    model: &dyn ModelClient,
) -> Result<Vec<AnalyzedItem>, PipelineError> {
    let lines: Vec<&str> = raw_text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let mut items = Vec::new();
    for batch in lines.chunks(LINE_BATCH_SIZE) {
        for outcome in analyze_batch(batch, model).await? {
            match outcome {
                LineOutcome::Item(item) => items.push(item),
                LineOutcome::Ignored => {}
                LineOutcome::Malformed(raw) => {
                    warn!("discarding malformed line response: {raw:?}");
                }
            }
        }
    }

    debug!(
        "line analysis produced {} items from {} lines",
        items.len(),
        lines.len()
    );
    Ok(items)
}

/// One batch: issue every line call concurrently, join, isolate failures.
async fn analyze_batch(
    batch: &[&str],
    model: &dyn ModelClient,
) -> Result<Vec<LineOutcome>, PipelineError> {
    let mut last_error: Option<LlmError> = None;

    for attempt in 0..=MAX_BATCH_RETRIES {
        if attempt > 0 {
            warn!(
                "every call in the batch failed, retrying batch (attempt {attempt}/{MAX_BATCH_RETRIES})"
            );
        }

        let results = join_all(batch.iter().map(|line| analyze_one_line(line, model))).await;

        let all_failed = !results.is_empty() && results.iter().all(Result::is_err);
        if all_failed {
            last_error = results.into_iter().find_map(Result::err);
            continue;
        }

        let mut outcomes = Vec::with_capacity(results.len());
        for (line, result) in batch.iter().zip(results) {
            match result {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => warn!("line analysis call failed, skipping line {line:?}: {e}"),
            }
        }
        return Ok(outcomes);
    }

    Err(PipelineError::ModelUnavailable(last_error.unwrap_or(
        LlmError::RateLimited {
            retries: MAX_BATCH_RETRIES,
        },
    )))
}

async fn analyze_one_line(line: &str, model: &dyn ModelClient) -> Result<LineOutcome, LlmError> {
    let prompt = LINE_PROMPT.replace("{line}", line);
    let response = model.generate(LINE_SYSTEM, &prompt).await?;
    Ok(parse_line_response(&response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::testing::StubModel;

    #[test]
    fn test_parses_six_field_item_line() {
        let outcome =
            parse_line_response("K.Eier|Eggs|1.99|true|Fresh Food|Complete Protein,Heart Health");
        let LineOutcome::Item(item) = outcome else {
            panic!("expected an item, got {outcome:?}");
        };
        assert_eq!(item.original_label, "K.Eier");
        assert_eq!(item.suggested_name, "Eggs");
        assert_eq!(item.price, 1.99);
        assert!(item.is_food_item);
        assert_eq!(item.classification, Classification::FreshFood);
        assert_eq!(item.nutrition_notes, vec!["Complete Protein", "Heart Health"]);
    }

    #[test]
    fn test_ignore_sentinel() {
        assert_eq!(parse_line_response("IGNORE"), LineOutcome::Ignored);
        assert_eq!(parse_line_response("ignore"), LineOutcome::Ignored);
        assert_eq!(parse_line_response("  IGNORE  "), LineOutcome::Ignored);
        assert_eq!(parse_line_response("```\nIGNORE\n```"), LineOutcome::Ignored);
    }

    #[test]
    fn test_wrong_field_count_is_malformed() {
        let outcome = parse_line_response("K.Eier|Eggs|1.99|true");
        assert_eq!(
            outcome,
            LineOutcome::Malformed("K.Eier|Eggs|1.99|true".to_string())
        );
        assert!(matches!(
            parse_line_response("a|b|c|d|e|f|g"),
            LineOutcome::Malformed(_)
        ));
    }

    #[test]
    fn test_unparsable_price_defaults_to_zero() {
        let LineOutcome::Item(item) =
            parse_line_response("Milch|Milk|n/a|true|Fresh Food|Calcium")
        else {
            panic!("expected an item");
        };
        assert_eq!(item.price, 0.0);
    }

    #[test]
    fn test_negative_price_is_clamped() {
        let LineOutcome::Item(item) =
            parse_line_response("Pfand|Deposit Refund|-0.25|false|Other|EMPTY")
        else {
            panic!("expected an item");
        };
        assert_eq!(item.price, 0.0);
    }

    #[test]
    fn test_decimal_comma_price() {
        let LineOutcome::Item(item) = parse_line_response("Milch|Milk|1,19|true|Fresh Food|EMPTY")
        else {
            panic!("expected an item");
        };
        assert_eq!(item.price, 1.19);
    }

    #[test]
    fn test_is_food_item_only_for_exact_true_token() {
        let food = parse_line_response("Milch|Milk|1.19|TRUE|Fresh Food|EMPTY");
        let LineOutcome::Item(item) = food else { panic!() };
        assert!(item.is_food_item);

        let not_food = parse_line_response("Milch|Milk|1.19|yes|Fresh Food|EMPTY");
        let LineOutcome::Item(item) = not_food else { panic!() };
        assert!(!item.is_food_item);
    }

    #[test]
    fn test_empty_sentinel_yields_no_notes() {
        let LineOutcome::Item(item) = parse_line_response("Brot|Bread|2.49|true|Processed|EMPTY")
        else {
            panic!("expected an item");
        };
        assert!(item.nutrition_notes.is_empty());
    }

    #[test]
    fn test_non_food_line_is_coerced_to_other_with_no_notes() {
        let LineOutcome::Item(item) =
            parse_line_response("Spülmittel|Dish Soap|1.49|false|Fresh Food|Vitamin C")
        else {
            panic!("expected an item");
        };
        assert_eq!(item.classification, Classification::Other);
        assert!(item.nutrition_notes.is_empty());
    }

    fn item_response(label: &str) -> String {
        format!("{label}|{label}|1.00|true|Fresh Food|EMPTY")
    }

    #[tokio::test]
    async fn test_all_lines_become_items() {
        let model = StubModel::new(|_, prompt| {
            if prompt.contains("SUMME") {
                Ok("IGNORE".to_string())
            } else {
                Ok("Milch|Milk|1.19|true|Fresh Food|Calcium".to_string())
            }
        });
        let items = analyze_lines("Milch 1,19\n\nSUMME 1,19\n", &model).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].suggested_name, "Milk");
        assert_eq!(model.call_count(), 2);
    }

    #[tokio::test]
    async fn test_single_line_failure_is_isolated() {
        let model = StubModel::new(|_, prompt| {
            if prompt.contains("Pfand") {
                Err(LlmError::Api {
                    status: 500,
                    message: "boom".to_string(),
                })
            } else {
                Ok(item_response("Milch"))
            }
        });
        let items = analyze_lines("Milch 1,19\nPfand -0,25\nBrot 2,49", &model)
            .await
            .unwrap();
        assert_eq!(items.len(), 2);
        // partial failure is not a batch failure: no retry round happened
        assert_eq!(model.call_count(), 3);
    }

    #[tokio::test]
    async fn test_whole_batch_failure_is_retried_then_fails() {
        let model = StubModel::failing();
        let err = analyze_lines("Milch 1,19\nBrot 2,49", &model).await.unwrap_err();
        assert!(matches!(err, PipelineError::ModelUnavailable(_)));
        // 2 lines x (1 attempt + 2 retries)
        assert_eq!(model.call_count(), 6);
    }

    #[tokio::test]
    async fn test_malformed_response_is_skipped_without_error() {
        let model = StubModel::new(|_, prompt| {
            if prompt.contains("Brot") {
                Ok("Brot|Bread|2.49".to_string())
            } else {
                Ok(item_response("Milch"))
            }
        });
        let items = analyze_lines("Milch 1,19\nBrot 2,49", &model).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].original_label, "Milch");
    }

    #[tokio::test]
    async fn test_batches_are_issued_sequentially() {
        let lines: Vec<String> = (1..=7).map(|i| format!("Artikel{i} 1,00")).collect();
        let model = StubModel::always("IGNORE");
        analyze_lines(&lines.join("\n"), &model).await.unwrap();

        let calls = model.calls();
        assert_eq!(calls.len(), 7);
        // first batch holds exactly lines 1-5, second batch lines 6-7
        for call in &calls[..LINE_BATCH_SIZE] {
            assert!((1..=5).any(|i| call.prompt.contains(&format!("Artikel{i} "))));
        }
        for call in &calls[LINE_BATCH_SIZE..] {
            assert!((6..=7).any(|i| call.prompt.contains(&format!("Artikel{i} "))));
        }
    }
}
