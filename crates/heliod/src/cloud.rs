//! Telemetry cloud client - authentication and per-endpoint fetches.
//!
//! The upstream cloud exposes a login endpoint that returns a short-lived
//! bearer token and a family of GET query endpoints that all wrap their
//! payload in a top-level `body` field. Every upstream problem (network,
//! status, decode, missing envelope) is captured into [`FetchError`] at
//! this boundary; nothing propagates past it as a panic or a raw reqwest
//! error.
//!
//! Production code uses [`CloudClient`]. Test code uses [`FakeTelemetryApi`]
//! with pre-configured responses, so the aggregation engine can be tested
//! without any network calls.

use async_trait::async_trait;
use helio_common::Config;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::debug;

/// One query endpoint of the telemetry cloud.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Realtime,
    DayAggregate,
    MonthAggregate,
    ProductionByDay,
    ProductionByMonth,
    ProductionByYear,
}

impl Endpoint {
    /// URL path below the API root.
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Realtime => "/device/queryDeviceRealtimeData",
            Endpoint::DayAggregate => "/device/queryDayAggregateValues",
            Endpoint::MonthAggregate => "/device/queryMonthAggregateValues",
            Endpoint::ProductionByDay => "/device/queryProductionByDay",
            Endpoint::ProductionByMonth => "/device/queryProductionByMonth",
            Endpoint::ProductionByYear => "/device/queryProductionByYear",
        }
    }

    /// Short name used in log lines and degrade markers.
    pub fn name(self) -> &'static str {
        match self {
            Endpoint::Realtime => "realtime",
            Endpoint::DayAggregate => "day_aggregate",
            Endpoint::MonthAggregate => "month_aggregate",
            Endpoint::ProductionByDay => "production_by_day",
            Endpoint::ProductionByMonth => "production_by_month",
            Endpoint::ProductionByYear => "production_by_year",
        }
    }
}

/// Errors at the upstream boundary.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("upstream returned HTTP {0}")]
    Status(u16),

    #[error("network error: {0}")]
    Network(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("response missing body envelope")]
    MissingBody,
}

/// Outcome of one endpoint fetch: the decoded `body` envelope, or the
/// captured failure. Never partially populated.
pub type FetchOutcome = Result<Value, FetchError>;

/// Trait abstraction over the telemetry cloud.
///
/// The aggregation engine only needs these two operations; keeping them
/// behind a trait lets tests drive the engine with canned responses.
#[async_trait]
pub trait TelemetryApi: Send + Sync {
    /// Authenticate and return a bearer token valid for one aggregation
    /// call. No retry, no caching.
    async fn acquire_token(&self) -> Result<String, FetchError>;

    /// Issue one GET against `endpoint` with the given query params.
    async fn fetch(&self, endpoint: Endpoint, token: &str, params: &[(&str, String)])
        -> FetchOutcome;
}

// ============================================================================
// Cloud Client (Production)
// ============================================================================

/// Real client talking to the telemetry cloud over HTTPS.
pub struct CloudClient {
    http: reqwest::Client,
    base: String,
    account: String,
    password: String,
}

impl CloudClient {
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self {
            http,
            base: config.telemetry_base.clone(),
            account: config.auth_account.clone(),
            password: config.auth_password.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

#[async_trait]
impl TelemetryApi for CloudClient {
    async fn acquire_token(&self) -> Result<String, FetchError> {
        let payload = serde_json::json!({
            "authAccount": self.account,
            "authPassword": self.password,
        });

        let response = self
            .http
            .post(self.url("/loginv2/auth"))
            .json(&payload)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;

        match json.get("body").and_then(|b| b.as_str()) {
            Some(token) => Ok(token.to_string()),
            None => Err(FetchError::MissingBody),
        }
    }

    async fn fetch(
        &self,
        endpoint: Endpoint,
        token: &str,
        params: &[(&str, String)],
    ) -> FetchOutcome {
        debug!("Fetching {} with {:?}", endpoint.name(), params);

        // Upstream quirk: the token must be present both as a bearer
        // header and as a bare `token` header.
        let response = self
            .http
            .get(self.url(endpoint.path()))
            .bearer_auth(token)
            .header("token", token)
            .header("Accept", "application/json")
            .query(params)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))?;

        match json.get("body") {
            Some(body) => Ok(body.clone()),
            None => Err(FetchError::MissingBody),
        }
    }
}

// ============================================================================
// Fake Telemetry API (Testing)
// ============================================================================

/// Fake telemetry cloud for deterministic tests.
///
/// Pre-configure per-endpoint outcomes, then assert on call counts and
/// the parameters each fetch received.
pub struct FakeTelemetryApi {
    auth: Result<String, FetchError>,
    responses: HashMap<Endpoint, FetchOutcome>,
    auth_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    fetch_log: Mutex<Vec<(Endpoint, Vec<(String, String)>)>>,
}

impl FakeTelemetryApi {
    pub fn new() -> Self {
        Self {
            auth: Ok("fake-token".to_string()),
            responses: HashMap::new(),
            auth_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            fetch_log: Mutex::new(Vec::new()),
        }
    }

    /// Make `acquire_token` fail.
    pub fn with_auth_failure(mut self, error: FetchError) -> Self {
        self.auth = Err(error);
        self
    }

    /// Configure a successful `body` payload for one endpoint.
    pub fn with_body(mut self, endpoint: Endpoint, body: Value) -> Self {
        self.responses.insert(endpoint, Ok(body));
        self
    }

    /// Configure a failure for one endpoint.
    pub fn with_failure(mut self, endpoint: Endpoint, error: FetchError) -> Self {
        self.responses.insert(endpoint, Err(error));
        self
    }

    pub fn auth_calls(&self) -> usize {
        self.auth_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Params of every fetch issued against `endpoint`, in call order.
    pub fn params_for(&self, endpoint: Endpoint) -> Vec<Vec<(String, String)>> {
        self.fetch_log
            .lock()
            .unwrap()
            .iter()
            .filter(|(e, _)| *e == endpoint)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

impl Default for FakeTelemetryApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TelemetryApi for FakeTelemetryApi {
    async fn acquire_token(&self) -> Result<String, FetchError> {
        self.auth_calls.fetch_add(1, Ordering::SeqCst);
        self.auth.clone()
    }

    async fn fetch(
        &self,
        endpoint: Endpoint,
        _token: &str,
        params: &[(&str, String)],
    ) -> FetchOutcome {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.fetch_log.lock().unwrap().push((
            endpoint,
            params
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        ));

        match self.responses.get(&endpoint) {
            Some(outcome) => outcome.clone(),
            None => Err(FetchError::Network(format!(
                "no fake response configured for {}",
                endpoint.name()
            ))),
        }
    }
}
