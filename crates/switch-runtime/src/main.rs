//! Transfer switch binary.
//!
//! Starts the HTTP ingress and publishes transfer prepares until Ctrl+C.

use anyhow::{Context, Result};
use std::sync::Arc;
use switch_runtime::{init_tracing, SwitchConfig, SwitchRuntime, TelemetryConfig};
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing(&TelemetryConfig::from_env()).context("failed to initialise logging")?;

    let config = SwitchConfig::load().context("failed to load configuration")?;
    let addr = config.http_addr();
    let runtime = Arc::new(SwitchRuntime::new(config).context("failed to start switch")?);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    let server = {
        let runtime = Arc::clone(&runtime);
        tokio::spawn(async move { runtime.serve(listener).await })
    };

    info!("Transfer switch is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    runtime.shutdown().await;
    server.await??;

    Ok(())
}
