//! Classifier request/response types
//!
//! These types are backend-agnostic and used across all classifier
//! implementations.

use serde::{Deserialize, Serialize};

use crate::models::{Category, TokenUsage};

/// Input to the remote classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationPrompt {
    /// Fixed instruction listing the taxonomy and the answer format
    pub system_instruction: String,
    /// Normalized transaction description
    pub transaction_text: String,
}

impl ClassificationPrompt {
    /// Prompt for one normalized description
    pub fn for_description(transaction_text: &str) -> Self {
        Self {
            system_instruction: system_instruction(),
            transaction_text: transaction_text.to_string(),
        }
    }

    /// Rough token estimate (~4 chars per token) for backends that do not
    /// report usage
    pub fn estimated_tokens(&self) -> u32 {
        let chars = self.system_instruction.len() + self.transaction_text.len();
        u32::try_from(chars.div_ceil(4)).unwrap_or(u32::MAX)
    }
}

fn system_instruction() -> String {
    let labels = Category::ALL
        .iter()
        .map(|c| c.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "You categorize bank transactions. Reply with JSON only, in the form \
         {{\"category\": \"<label>\"}}, where <label> is exactly one of: {}. \
         Use Other when unsure.",
        labels
    )
}

/// Output of a successful classifier call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierResponse {
    pub category: Category,
    pub token_usage: TokenUsage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_lists_every_category() {
        let prompt = ClassificationPrompt::for_description("loblaws #1042");
        for category in Category::ALL {
            assert!(prompt.system_instruction.contains(category.as_str()));
        }
        assert_eq!(prompt.transaction_text, "loblaws #1042");
        assert!(prompt.estimated_tokens() > 10);
    }
}
