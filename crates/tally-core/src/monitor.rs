//! Scheduled health check
//!
//! Aggregates the last hour of metrics and feeds the snapshot to the alert
//! engine. Reads metric state, writes only alert state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::alerts::{Alert, AlertEngine, MetricSnapshot};
use crate::error::Result;
use crate::metrics::{MetricsRecorder, ReportPeriod};

/// Window the check aggregates over
pub const CHECK_PERIOD: ReportPeriod = ReportPeriod::Hour;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub checked_at: DateTime<Utc>,
    pub snapshot: MetricSnapshot,
    pub opened: Vec<Alert>,
    pub resolved: Vec<Alert>,
}

pub struct Monitor {
    metrics: Arc<MetricsRecorder>,
    alerts: Arc<AlertEngine>,
}

impl Monitor {
    pub fn new(metrics: Arc<MetricsRecorder>, alerts: Arc<AlertEngine>) -> Self {
        Self { metrics, alerts }
    }

    pub async fn run_check(&self) -> Result<CheckOutcome> {
        let report = self.metrics.try_report(CHECK_PERIOD)?;
        let snapshot = MetricSnapshot::from_report(&report);
        let outcome = self.alerts.evaluate(&snapshot).await?;

        debug!(
            transactions = report.total,
            opened = outcome.opened.len(),
            resolved = outcome.resolved.len(),
            "Monitoring check complete"
        );

        Ok(CheckOutcome {
            checked_at: report.generated_at,
            snapshot,
            opened: outcome.opened,
            resolved: outcome.resolved,
        })
    }
}
