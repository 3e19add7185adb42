//! HTTP server for heliod.

use crate::aggregator::{AggregationEngine, MergeMode};
use crate::cloud::CloudClient;
use crate::directory::DirectoryClient;
use crate::otp::OtpClient;
use crate::routes;
use crate::token_gate::{MemoryTokenStore, TokenStore};
use anyhow::{Context, Result};
use axum::http::Method;
use axum::Router;
use helio_common::Config;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Application state shared across handlers.
pub struct AppState {
    pub config: Config,
    pub engine: AggregationEngine,
    pub tokens: Arc<dyn TokenStore>,
    pub directory: Option<DirectoryClient>,
    pub otp: Option<OtpClient>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let cloud = CloudClient::new(&config).context("Failed to build telemetry cloud client")?;
        let mode = if config.strict_merge {
            MergeMode::Strict
        } else {
            MergeMode::Degrade
        };
        let engine = AggregationEngine::new(Arc::new(cloud)).with_mode(mode);

        let directory = match &config.directory {
            Some(dir) => Some(
                DirectoryClient::new(dir, config.request_timeout)
                    .context("Failed to build directory client")?,
            ),
            None => None,
        };

        let otp = match &config.otp {
            Some(otp) => Some(
                OtpClient::new(otp, config.request_timeout)
                    .context("Failed to build OTP client")?,
            ),
            None => None,
        };

        Ok(Self {
            config,
            engine,
            tokens: Arc::new(MemoryTokenStore::new()),
            directory,
            otp,
            start_time: Instant::now(),
        })
    }
}

/// Run the HTTP server.
pub async fn run(state: AppState) -> Result<()> {
    let port = state.config.port;
    let state = Arc::new(state);

    // The dashboard is a browser SPA served from another origin, so the
    // API answers cross-origin GET/POST.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    let app = Router::new()
        .merge(routes::dashboard_routes())
        .merge(routes::device_routes())
        .merge(routes::otp_routes())
        .merge(routes::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("  Listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
