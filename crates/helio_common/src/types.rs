//! Request/response types shared between the routes and the engine.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The merged dashboard report: a flat mapping of field name to value,
/// built by folding upstream payloads together in plan order.
pub type AggregateReport = Map<String, Value>;

/// Long-range production view requested by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    Month,
    Year,
}

/// Caller-supplied parameters for one aggregation call.
///
/// `date`, `month` and `year` are pre-formatted strings (`YYYYMMDD`,
/// `YYYYMM`, `YYYY`) exactly as the telemetry cloud expects them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DashboardQuery {
    /// Defaults to empty so a missing parameter reaches the engine's own
    /// validation instead of failing query-string deserialization.
    #[serde(default)]
    pub device_sn: String,
    pub date: Option<String>,
    pub view_mode: Option<ViewMode>,
    pub month: Option<String>,
    pub year: Option<String>,
    /// Session token, checked only when the token gate is enabled.
    pub token: Option<String>,
}

impl DashboardQuery {
    pub fn for_device(device_sn: &str) -> Self {
        Self {
            device_sn: device_sn.to_string(),
            ..Default::default()
        }
    }
}

/// Result of resolving a phone number in the device directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub name: String,
    pub devices: Vec<String>,
    pub default_device: String,
}

/// Outcome of an OTP check at the SMS-verification provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpDecision {
    Approved,
    Denied,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpSendRequest {
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpVerifyRequest {
    pub phone: String,
    pub code: String,
}

/// Session token handed to the dashboard after a successful OTP check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
}
