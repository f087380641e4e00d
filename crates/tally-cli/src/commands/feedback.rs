//! Feedback command implementation

use anyhow::Result;
use tally_core::{Engine, FeedbackRecord};

use super::print_json;

pub async fn cmd_feedback(
    engine: &Engine,
    transaction_id: &str,
    category: &str,
    original: Option<String>,
    rating: Option<u8>,
    json: bool,
) -> Result<()> {
    let record = FeedbackRecord {
        transaction_id: transaction_id.to_string(),
        original_category: original,
        corrected_category: category.to_string(),
        confidence_rating: rating,
        source: "cli".to_string(),
    };

    let receipt = engine.submit_feedback(&record).await?;

    if json {
        return print_json(&receipt);
    }

    println!(
        "✅ Recorded correction #{}: {} → {}",
        receipt.feedback_id, receipt.transaction_id, receipt.category
    );
    if receipt.cache_updated {
        println!("   Cache updated: future transactions from this merchant use the correction");
    } else {
        println!("   ⚠️  Cache unavailable: correction stored but not yet applied");
    }
    println!("   Learning patterns updated: {}", receipt.patterns_updated);

    Ok(())
}
