//! Helio Daemon - solar fleet dashboard backend.
//!
//! Resolves callers to device serials, authenticates against the
//! telemetry cloud, fans out to the metric endpoints and merges the
//! results into one dashboard report.

use anyhow::Result;
use heliod::server::{self, AppState};
use helio_common::Config;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Helio Daemon v{} starting", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    info!(
        "Telemetry cloud: {}  token gate: {}  strict merge: {}",
        config.telemetry_base, config.require_token, config.strict_merge
    );

    let state = AppState::new(config)?;
    server::run(state).await
}
