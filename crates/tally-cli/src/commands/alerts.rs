//! Alert, threshold and monitoring command implementations

use anyhow::{Context, Result};
use tally_core::{Alert, Engine, ThresholdsUpdate};

use super::print_json;

fn print_alert(alert: &Alert) {
    let state = if alert.resolved { "resolved" } else { "active" };
    println!(
        "   [{}] {} {} ({})",
        alert.severity,
        alert.alert_type,
        alert.id,
        state
    );
    println!("       {}", alert.message);
    println!(
        "       value {:.4} vs threshold {:.4}, opened {}",
        alert.current_value,
        alert.threshold,
        alert.created_at.format("%Y-%m-%d %H:%M:%S")
    );
    if let Some(at) = alert.resolved_at {
        println!("       resolved {}", at.format("%Y-%m-%d %H:%M:%S"));
    }
}

pub fn cmd_alerts(engine: &Engine, history: bool, json: bool) -> Result<()> {
    let alerts = if history {
        engine.alert_history()
    } else {
        engine.active_alerts()
    };

    if json {
        return print_json(&alerts);
    }

    if alerts.is_empty() {
        if history {
            println!("No alerts recorded");
        } else {
            println!("✅ No active alerts");
        }
        return Ok(());
    }

    println!("🚨 {} alert(s)", alerts.len());
    println!();
    for alert in &alerts {
        print_alert(alert);
    }

    Ok(())
}

pub fn cmd_alerts_resolve(engine: &Engine, id: &str, json: bool) -> Result<()> {
    let alert = engine
        .resolve_alert(id)
        .with_context(|| format!("Failed to resolve alert {}", id))?;

    if json {
        return print_json(&alert);
    }

    println!("✅ Resolved alert {} ({})", alert.id, alert.alert_type);
    Ok(())
}

pub fn cmd_thresholds(engine: &Engine, set: &[(String, f64)], json: bool) -> Result<()> {
    let thresholds = if set.is_empty() {
        engine.thresholds()
    } else {
        let mut update = ThresholdsUpdate::default();
        for (key, value) in set {
            update.set(key, *value)?;
        }
        engine.update_thresholds(&update)?
    };

    if json {
        return print_json(&thresholds);
    }

    if !set.is_empty() {
        println!("✅ Thresholds updated");
    }
    println!("   Accuracy (min):             {:.1}%", thresholds.accuracy);
    println!("   Cost per transaction (max): ${:.4}", thresholds.cost_per_transaction);
    println!("   Error rate (max):           {:.1}%", thresholds.error_rate);
    println!("   Latency (max):              {:.0}ms", thresholds.latency_ms);
    println!("   Throughput (min):           {:.1}/min", thresholds.throughput_per_minute);

    Ok(())
}

pub async fn cmd_monitor(engine: &Engine, json: bool) -> Result<()> {
    let outcome = engine.run_check().await?;

    if json {
        return print_json(&outcome);
    }

    println!("🔍 Monitoring check at {}", outcome.checked_at.format("%Y-%m-%d %H:%M:%S"));
    if outcome.opened.is_empty() && outcome.resolved.is_empty() {
        println!("   No alert changes");
    }
    for alert in &outcome.opened {
        println!("   🚨 Opened:");
        print_alert(alert);
    }
    for alert in &outcome.resolved {
        println!("   ✅ Resolved:");
        print_alert(alert);
    }

    let active = engine.active_alerts().len();
    println!("   Active alerts: {}", active);

    Ok(())
}
