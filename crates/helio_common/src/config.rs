//! Configuration for heliod.
//!
//! Everything is environment-driven, matching how the daemon is deployed
//! (systemd unit or container with an env file). Telemetry-cloud
//! credentials are mandatory; the device directory and the OTP provider
//! are optional collaborators and their features stay disabled when the
//! corresponding variables are absent.

use std::env;
use std::time::Duration;

use tracing::warn;

/// Default telemetry cloud API root.
pub const DEFAULT_TELEMETRY_BASE: &str = "https://lb.solinteg-cloud.com/openapi/v2";

/// Default per-call timeout for upstream requests, in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default listen port, matching the original deployment.
const DEFAULT_PORT: u16 = 5000;

/// Device directory (external tabular store) settings.
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub base_url: String,
    pub api_key: String,
}

/// SMS-verification provider settings.
#[derive(Debug, Clone)]
pub struct OtpConfig {
    pub base_url: String,
    pub account_sid: String,
    pub auth_token: String,
    pub service_sid: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Telemetry cloud account used for `acquire_token`.
    pub auth_account: String,
    pub auth_password: String,
    /// Telemetry cloud API root (no trailing slash).
    pub telemetry_base: String,
    /// Per-call timeout applied to every upstream request.
    pub request_timeout: Duration,
    pub port: u16,
    /// When true, /api/dashboard requires a valid session token.
    pub require_token: bool,
    /// When true, a realtime or day-aggregate failure rejects the whole
    /// request instead of degrading field-by-field. Off by default;
    /// exists for parity with older deployments.
    pub strict_merge: bool,
    pub directory: Option<DirectoryConfig>,
    pub otp: Option<OtpConfig>,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// Fails only when the telemetry credentials are missing; every other
    /// setting has a default or disables its feature.
    pub fn from_env() -> Result<Self, ConfigError> {
        let auth_account =
            env::var("AUTH_ACCOUNT").map_err(|_| ConfigError::Missing("AUTH_ACCOUNT"))?;
        let auth_password =
            env::var("AUTH_PASSWORD").map_err(|_| ConfigError::Missing("AUTH_PASSWORD"))?;

        let telemetry_base = env::var("TELEMETRY_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_TELEMETRY_BASE.to_string())
            .trim_end_matches('/')
            .to_string();

        let request_timeout = Duration::from_secs(
            env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        );

        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let require_token = env::var("REQUIRE_TOKEN")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let strict_merge = env::var("STRICT_MERGE")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let directory = match (env::var("DIRECTORY_URL"), env::var("DIRECTORY_API_KEY")) {
            (Ok(base_url), Ok(api_key)) => Some(DirectoryConfig { base_url, api_key }),
            (Ok(_), Err(_)) | (Err(_), Ok(_)) => {
                warn!("Device directory partially configured, lookups disabled");
                None
            }
            _ => None,
        };

        let otp = match (
            env::var("TWILIO_ACCOUNT_SID"),
            env::var("TWILIO_AUTH_TOKEN"),
            env::var("TWILIO_VERIFY_SERVICE_SID"),
        ) {
            (Ok(account_sid), Ok(auth_token), Ok(service_sid)) => Some(OtpConfig {
                base_url: env::var("TWILIO_VERIFY_BASE_URL")
                    .unwrap_or_else(|_| "https://verify.twilio.com/v2".to_string()),
                account_sid,
                auth_token,
                service_sid,
            }),
            (Err(_), Err(_), Err(_)) => None,
            _ => {
                warn!("OTP provider partially configured, token issuing disabled");
                None
            }
        };

        if require_token && otp.is_none() {
            warn!("REQUIRE_TOKEN set but OTP provider not configured; no token can ever be issued");
        }

        Ok(Self {
            auth_account,
            auth_password,
            telemetry_base,
            request_timeout,
            port,
            require_token,
            strict_merge,
            directory,
            otp,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
}
