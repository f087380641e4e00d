//! Parsing helpers for classifier responses
//!
//! Models often wrap the JSON payload in extra text, or ignore the format
//! and answer with a bare label. Both are accepted; anything that does not
//! map onto the taxonomy is an `InvalidClassifierResponse` carrying the raw
//! payload.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::models::Category;

/// Raw payloads are truncated to this many characters in errors and logs
pub const RAW_PAYLOAD_LIMIT: usize = 200;

/// Truncate a raw payload for error messages
pub fn truncate_raw(raw: &str) -> String {
    if raw.chars().count() > RAW_PAYLOAD_LIMIT {
        let head: String = raw.chars().take(RAW_PAYLOAD_LIMIT).collect();
        format!("{}...", head)
    } else {
        raw.to_string()
    }
}

fn invalid(reason: &str, raw: &str) -> Error {
    Error::InvalidClassifierResponse(format!("{} | Raw: {}", reason, truncate_raw(raw)))
}

/// Parse a category label from a classifier response
pub fn parse_category(response: &str) -> Result<Category> {
    let trimmed = response.trim();
    if trimmed.is_empty() {
        return Err(invalid("Empty classifier response", response));
    }

    let start = trimmed.find('{');
    let end = trimmed.rfind('}');

    match (start, end) {
        (Some(s), Some(e)) if s < e => {
            let json_str = &trimmed[s..=e];
            let value: Value = serde_json::from_str(json_str)
                .map_err(|e| invalid(&format!("Invalid JSON from classifier: {}", e), response))?;
            let label = value
                .get("category")
                .or_else(|| value.get("label"))
                .and_then(Value::as_str)
                .ok_or_else(|| invalid("Missing category field", response))?;
            label
                .parse::<Category>()
                .map_err(|_| invalid("Label outside the taxonomy", response))
        }
        (Some(_), _) | (_, Some(_)) => Err(invalid("Unbalanced JSON in classifier response", response)),
        _ => {
            // Bare label: first non-empty line, quotes and trailing punctuation stripped
            let line = trimmed
                .lines()
                .map(str::trim)
                .find(|l| !l.is_empty())
                .unwrap_or_default();
            let label = line
                .trim_start_matches("Category:")
                .trim_start_matches("category:")
                .trim()
                .trim_matches(|c: char| c == '"' || c == '\'' || c == '.' || c == '`');
            label.parse::<Category>().map_err(|_| invalid("Label outside the taxonomy", response))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_json() {
        assert_eq!(
            parse_category(r#"{"category": "Dining Out"}"#).unwrap(),
            Category::DiningOut
        );
    }

    #[test]
    fn test_parse_json_with_surrounding_text() {
        let response = "Sure! Here is the answer:\n{\"category\": \"groceries\"}\nHope that helps.";
        assert_eq!(parse_category(response).unwrap(), Category::Groceries);
    }

    #[test]
    fn test_parse_label_field_and_loose_spelling() {
        assert_eq!(
            parse_category(r#"{"label": "health_and_wellness"}"#).unwrap(),
            Category::HealthWellness
        );
    }

    #[test]
    fn test_parse_bare_label() {
        assert_eq!(parse_category("Transportation").unwrap(), Category::Transportation);
        assert_eq!(parse_category("  \"Dining Out\".\n").unwrap(), Category::DiningOut);
        assert_eq!(parse_category("Category: Utilities").unwrap(), Category::Utilities);
    }

    #[test]
    fn test_label_outside_taxonomy_is_invalid() {
        let err = parse_category(r#"{"category": "Crypto"}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidClassifierResponse(_)));
        assert!(err.to_string().contains("Crypto"));
    }

    #[test]
    fn test_malformed_payloads_are_invalid() {
        for raw in ["", "{not json}", "{\"category\": 3}", "{\"answer\": \"Other\"}", "{ oops"] {
            let err = parse_category(raw).unwrap_err();
            assert!(
                matches!(err, Error::InvalidClassifierResponse(_)),
                "expected invalid response for {:?}",
                raw
            );
        }
    }

    #[test]
    fn test_raw_payload_is_truncated() {
        let long = "x".repeat(500);
        let truncated = truncate_raw(&long);
        assert_eq!(truncated.len(), RAW_PAYLOAD_LIMIT + 3);
        assert!(truncated.ends_with("..."));

        let err = parse_category(&long).unwrap_err().to_string();
        assert!(err.len() < 300);
    }
}
