//! Merchant fingerprinting
//!
//! The normalized fingerprint (lower-cased, whitespace-collapsed description)
//! is the subject of rule matching and, digested, the cache key.

use sha2::{Digest, Sha256};

use crate::models::Transaction;

/// Words that carry no categorization signal
const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "from", "with", "pos", "purchase", "payment", "debit", "credit",
    "card", "visa", "mastercard", "interac", "inc", "ltd", "llc", "corp", "co", "www", "com",
    "online", "store", "on", "qc", "bc", "ab", "mb", "ns", "nb", "canada", "can", "usa",
];

/// Keywords shorter than this are dropped
const MIN_KEYWORD_LEN: usize = 3;

/// Lower-case and collapse runs of whitespace
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Fingerprint of a transaction: the explicit merchant field when present,
/// otherwise the description
pub fn merchant_fingerprint(transaction: &Transaction) -> String {
    match transaction.merchant.as_deref().map(normalize_text) {
        Some(merchant) if !merchant.is_empty() => merchant,
        _ => normalize_text(&transaction.description),
    }
}

/// One-way digest of a normalized fingerprint
pub fn digest(normalized: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

/// Significant keywords of a description, in first-seen order
///
/// Splits on anything that is not alphanumeric, drops stop words, short
/// tokens and tokens without letters (store numbers, dates).
pub fn extract_keywords(text: &str) -> Vec<String> {
    let normalized = normalize_text(text);
    let mut keywords: Vec<String> = Vec::new();

    for token in normalized.split(|c: char| !c.is_alphanumeric()) {
        if token.len() < MIN_KEYWORD_LEN
            || !token.chars().any(|c| c.is_alphabetic())
            || STOP_WORDS.contains(&token)
        {
            continue;
        }
        if !keywords.iter().any(|k| k == token) {
            keywords.push(token.to_string());
        }
    }

    keywords
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(
            normalize_text("  TIM HORTONS   #123\tTORONTO ON "),
            "tim hortons #123 toronto on"
        );
    }

    #[test]
    fn test_identical_text_yields_identical_digest() {
        let a = digest(&normalize_text("TIM HORTONS #123"));
        let b = digest(&normalize_text("tim   hortons #123"));
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, digest("tim hortons #124"));
    }

    #[test]
    fn test_fingerprint_prefers_merchant_field() {
        let mut tx = Transaction::new("1", "SQ *BLUE BOTTLE 0042", 6.25, "2024-03-01");
        assert_eq!(merchant_fingerprint(&tx), "sq *blue bottle 0042");

        tx.merchant = Some("Blue Bottle".into());
        assert_eq!(merchant_fingerprint(&tx), "blue bottle");

        tx.merchant = Some("   ".into());
        assert_eq!(merchant_fingerprint(&tx), "sq *blue bottle 0042");
    }

    #[test]
    fn test_extract_keywords_filters_noise() {
        let keywords = extract_keywords("POS PURCHASE LOBLAWS #1042 TORONTO ON 2024-03-01");
        assert_eq!(keywords, vec!["loblaws", "toronto"]);
    }

    #[test]
    fn test_extract_keywords_dedupes() {
        let keywords = extract_keywords("uber trip uber eats");
        assert_eq!(keywords, vec!["uber", "trip", "eats"]);
    }
}
