//! Server command implementation

use std::sync::Arc;

use anyhow::Result;
use tally_server::ServerConfig;

use super::{open_engine, EnginePaths};

pub async fn cmd_serve(
    paths: &EnginePaths,
    host: &str,
    port: u16,
    allowed_origins: Vec<String>,
) -> Result<()> {
    let engine = Arc::new(open_engine(paths)?);

    println!("🚀 Starting Tally web server...");
    println!("   Database: {}", paths.db.display());
    println!("   Listening: http://{}:{}", host, port);
    if allowed_origins.is_empty() {
        println!("   CORS: same-origin only");
    } else {
        println!("   CORS: {}", allowed_origins.join(", "));
    }
    let monitoring = &engine.config().monitoring;
    if monitoring.enabled {
        println!("   Monitoring: every {}s", monitoring.interval_secs);
    }
    println!();

    tally_server::serve(engine, host, port, ServerConfig { allowed_origins }).await
}
