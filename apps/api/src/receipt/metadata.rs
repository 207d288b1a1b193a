use chrono::NaiveDate;
use tracing::warn;

use crate::llm_client::{strip_code_fences, ModelClient};
use crate::receipt::prompts::{METADATA_PROMPT, METADATA_SYSTEM};

/// Purchase metadata pulled from the receipt text. Every field is
/// best-effort; `None` means the model could not find it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReceiptMetadata {
    pub purchase_date: Option<NaiveDate>,
    pub total_amount: Option<f64>,
    pub currency: Option<String>,
}

/// Single model call for purchase date, total and currency.
///
/// Metadata is best-effort: a model failure degrades to all-`None` with a
/// warning rather than failing the upload. Item extraction is the mandatory
/// part of the pipeline, this is not.
pub async fn extract_metadata(raw_text: &str, model: &dyn ModelClient) -> ReceiptMetadata {
    let prompt = METADATA_PROMPT.replace("{raw_text}", raw_text);
    match model.generate(METADATA_SYSTEM, &prompt).await {
        Ok(response) => parse_metadata_response(&response),
        Err(e) => {
            warn!("metadata extraction failed, continuing without metadata: {e}");
            ReceiptMetadata::default()
        }
    }
}

/// Parses the fixed `key: value` line format.
///
/// Keys are matched case-insensitively; lines matching none of the known
/// keys are silently ignored, and values that fail to parse stay `None`.
pub fn parse_metadata_response(response: &str) -> ReceiptMetadata {
    let mut metadata = ReceiptMetadata::default();

    for line in strip_code_fences(response).lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("null") {
            continue;
        }
        match key.trim().to_lowercase().as_str() {
            "purchasedate" => {
                metadata.purchase_date = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok();
            }
            "totalamount" => {
                metadata.total_amount = value.replace(',', ".").parse::<f64>().ok();
            }
            "currency" => {
                metadata.currency = Some(value.to_string());
            }
            _ => {}
        }
    }

    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::testing::StubModel;

    #[test]
    fn test_parses_all_three_fields() {
        let response = "purchaseDate: 2024-03-02\ntotalAmount: 12.57\ncurrency: EUR";
        let m = parse_metadata_response(response);
        assert_eq!(m.purchase_date, NaiveDate::from_ymd_opt(2024, 3, 2));
        assert_eq!(m.total_amount, Some(12.57));
        assert_eq!(m.currency, Some("EUR".to_string()));
    }

    #[test]
    fn test_keys_match_case_insensitively() {
        let response = "PURCHASEDATE: 2023-11-20\nTotalAmount: 8.00\nCURRENCY: USD";
        let m = parse_metadata_response(response);
        assert!(m.purchase_date.is_some());
        assert_eq!(m.total_amount, Some(8.0));
        assert_eq!(m.currency, Some("USD".to_string()));
    }

    #[test]
    fn test_unmatched_lines_are_ignored() {
        let response = "Here is the data you asked for:\npurchaseDate: 2024-01-05\nstore: EDEKA";
        let m = parse_metadata_response(response);
        assert!(m.purchase_date.is_some());
        assert_eq!(m.total_amount, None);
        assert_eq!(m.currency, None);
    }

    #[test]
    fn test_null_values_stay_none() {
        let response = "purchaseDate: null\ntotalAmount: null\ncurrency: null";
        assert_eq!(parse_metadata_response(response), ReceiptMetadata::default());
    }

    #[test]
    fn test_unparsable_values_stay_none() {
        let response = "purchaseDate: last tuesday\ntotalAmount: twelve\ncurrency: EUR";
        let m = parse_metadata_response(response);
        assert_eq!(m.purchase_date, None);
        assert_eq!(m.total_amount, None);
        assert_eq!(m.currency, Some("EUR".to_string()));
    }

    #[test]
    fn test_decimal_comma_total_is_accepted() {
        let m = parse_metadata_response("totalAmount: 12,57");
        assert_eq!(m.total_amount, Some(12.57));
    }

    #[test]
    fn test_fenced_response_is_stripped() {
        let response = "```\npurchaseDate: 2024-03-02\ntotalAmount: 5.00\ncurrency: EUR\n```";
        let m = parse_metadata_response(response);
        assert!(m.purchase_date.is_some());
    }

    #[tokio::test]
    async fn test_model_failure_degrades_to_empty_metadata() {
        let model = StubModel::failing();
        let m = extract_metadata("EDEKA\nSUMME 10,00", &model).await;
        assert_eq!(m, ReceiptMetadata::default());
    }

    #[tokio::test]
    async fn test_extract_metadata_happy_path() {
        let model = StubModel::always("purchaseDate: 2024-06-01\ntotalAmount: 23.10\ncurrency: EUR");
        let m = extract_metadata("receipt text", &model).await;
        assert_eq!(m.total_amount, Some(23.10));
    }
}
