//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod alerts;
pub mod classify;
pub mod feedback;
pub mod health;
pub mod metrics;
pub mod validation;

// Re-export all handlers for use in router
pub use alerts::*;
pub use classify::*;
pub use feedback::*;
pub use health::*;
pub use metrics::*;
pub use validation::*;
