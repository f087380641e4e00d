//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Engine assembly (open_engine) and `init`
//! - `classify` - Single, batch and rule dry-run classification
//! - `feedback` - User corrections
//! - `reports` - Performance report and Prometheus metrics
//! - `alerts` - Alerts, thresholds and the monitoring check
//! - `validate` - Validation harness runs
//! - `serve` - Web server command

pub mod alerts;
pub mod classify;
pub mod core;
pub mod feedback;
pub mod reports;
pub mod serve;
pub mod validate;

// Re-export command functions for main.rs
pub use alerts::*;
pub use classify::*;
pub use core::*;
pub use feedback::*;
pub use reports::*;
pub use serve::*;
pub use validate::*;

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Print a value as pretty JSON
pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Render a 0.0 - 1.0 ratio as a percentage
pub fn pct(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}
