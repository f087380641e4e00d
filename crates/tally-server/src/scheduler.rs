//! Background monitoring check
//!
//! Every `monitoring.interval_secs` the last hour of metrics is compared
//! with the alert thresholds. The task only reads metric state and writes
//! alert state, so it never blocks classification requests. Failures are
//! logged and the next tick runs as usual.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, error, info};

use tally_core::Engine;

/// Start the monitoring scheduler as a background task
pub fn start_monitor_scheduler(engine: Arc<Engine>, every: Duration) -> JoinHandle<()> {
    info!("Starting monitoring scheduler: every {}s", every.as_secs());

    tokio::spawn(async move {
        let mut ticker = interval(every);

        // Skip the first immediate tick - nothing has been recorded yet
        ticker.tick().await;

        loop {
            ticker.tick().await;
            run_scheduled_check(&engine).await;
        }
    })
}

async fn run_scheduled_check(engine: &Engine) {
    match engine.run_check().await {
        Ok(outcome) => {
            if outcome.opened.is_empty() && outcome.resolved.is_empty() {
                debug!("Scheduled check: no alert changes");
            } else {
                info!(
                    opened = outcome.opened.len(),
                    resolved = outcome.resolved.len(),
                    "Scheduled check changed alerts"
                );
            }
        }
        Err(e) => {
            error!(error = %e, "Scheduled monitoring check failed");
        }
    }
}
