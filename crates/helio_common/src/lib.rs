//! Shared types for the Helio dashboard daemon.
//!
//! Everything the transport layer and the daemon internals exchange lives
//! here: request/response DTOs, the aggregate report shape, and the
//! environment-driven configuration.

pub mod config;
pub mod types;

pub use config::{Config, ConfigError, DirectoryConfig, OtpConfig};
pub use types::{
    AggregateReport, DashboardQuery, DeviceRecord, HealthResponse, OtpDecision, OtpSendRequest,
    OtpVerifyRequest, TokenResponse, ViewMode,
};

/// Daemon version, taken from the workspace manifest.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
