//! Error types for Tally

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// Malformed transaction input. Terminal for the item, never retried.
    #[error("Preprocessing failed: {0}")]
    Preprocessing(String),

    /// Remote classifier unreachable, erroring, or timed out.
    #[error("Classifier unavailable: {0}")]
    ClassifierUnavailable(String),

    /// Remote classifier answered with something we cannot map to a category.
    #[error("Invalid classifier response: {0}")]
    InvalidClassifierResponse(String),

    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Notification error: {0}")]
    Notification(String),
}

impl Error {
    /// True for the recoverable classifier failures that route into the
    /// rule / `Other` fallback chain.
    pub fn is_classifier_failure(&self) -> bool {
        matches!(
            self,
            Error::ClassifierUnavailable(_) | Error::InvalidClassifierResponse(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifier_failure_family() {
        assert!(Error::ClassifierUnavailable("timeout".into()).is_classifier_failure());
        assert!(Error::InvalidClassifierResponse("{}".into()).is_classifier_failure());
        assert!(!Error::CacheUnavailable("down".into()).is_classifier_failure());
        assert!(!Error::Preprocessing("empty id".into()).is_classifier_failure());
    }
}
