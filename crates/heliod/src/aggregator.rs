//! Aggregation engine - fans out to the telemetry cloud endpoints and
//! merges every response into one dashboard report.
//!
//! The engine builds a declarative query plan per request: three fixed
//! base steps (realtime snapshot, today's day aggregate, current-month
//! aggregate), an optional day production series when the caller supplied
//! a date, and optional month/year production series gated on the view
//! mode. The steps are independent, so they are fetched concurrently and
//! merged afterwards in fixed plan order, making the merge deterministic
//! regardless of completion order.
//!
//! A single failing step degrades only its own fields; authentication
//! failure is the one fatal case and aborts before any fetch.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use helio_common::{AggregateReport, DashboardQuery, ViewMode};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::cloud::{Endpoint, FetchError, FetchOutcome, TelemetryApi};

/// Field extracted from the month aggregate and renamed in the report.
const PV_GENERATION: &str = "pvGeneration";
const PRODUCTION_THIS_MONTH: &str = "productionThisMonth";

/// Sentinel for a value the upstream could not provide.
const NOT_AVAILABLE: &str = "N/A";

/// How the engine reacts when a base step fails.
///
/// `Degrade` is canonical: the failed step's fields are replaced by a
/// `<step>_data_error` marker and the rest of the report survives.
/// `Strict` reproduces the older deployments where a realtime or
/// day-aggregate failure rejects the whole request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeMode {
    #[default]
    Degrade,
    Strict,
}

/// Fatal aggregation errors. Per-step fetch failures never surface here
/// in degrade mode; they are folded into the report instead.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("{0}")]
    Validation(String),

    #[error("failed to fetch {step} data: {message}")]
    Upstream { step: &'static str, message: String },
}

impl EngineError {
    /// The error-report shape handed to the dashboard: exactly one
    /// `error` key, no partial data.
    pub fn to_report(&self) -> AggregateReport {
        let mut report = AggregateReport::new();
        report.insert("error".to_string(), json!(self.to_string()));
        report
    }
}

/// How one plan step's outcome is folded into the report.
#[derive(Debug, Clone, Copy)]
enum MergeRule {
    /// Copy every key of the body envelope; on failure insert a
    /// `<step>_data_error` marker.
    CopyAll,
    /// Extract `pvGeneration` under `productionThisMonth`, defaulting to
    /// `"N/A"` on failure or absence. Always present in the report.
    ProductionThisMonth,
    /// Store the body verbatim under `key`; on failure store `[]`.
    Series { key: &'static str },
}

struct PlanStep {
    endpoint: Endpoint,
    params: Vec<(&'static str, String)>,
    rule: MergeRule,
}

/// Aggregation engine over an injected telemetry API.
pub struct AggregationEngine {
    api: Arc<dyn TelemetryApi>,
    mode: MergeMode,
}

impl AggregationEngine {
    pub fn new(api: Arc<dyn TelemetryApi>) -> Self {
        Self {
            api,
            mode: MergeMode::Degrade,
        }
    }

    pub fn with_mode(mut self, mode: MergeMode) -> Self {
        self.mode = mode;
        self
    }

    /// Run the full plan for one dashboard request.
    pub async fn aggregate(&self, query: &DashboardQuery) -> Result<AggregateReport, EngineError> {
        if query.device_sn.trim().is_empty() {
            return Err(EngineError::Validation(
                "device serial number is required".to_string(),
            ));
        }

        // Auth failure is fatal: no fetch is attempted.
        let token = self
            .api
            .acquire_token()
            .await
            .map_err(|e| EngineError::Auth(e.to_string()))?;

        let plan = build_plan(query, Utc::now());
        info!(
            "Aggregating {} steps for device {}",
            plan.len(),
            query.device_sn
        );

        // Steps are independent; fetch them concurrently, then merge in
        // plan order.
        let mut handles = Vec::with_capacity(plan.len());
        for step in &plan {
            let api = Arc::clone(&self.api);
            let token = token.clone();
            let endpoint = step.endpoint;
            let params = step.params.clone();
            handles.push(tokio::spawn(async move {
                api.fetch(endpoint, &token, &params).await
            }));
        }

        let mut report = AggregateReport::new();
        for (step, handle) in plan.iter().zip(handles) {
            let outcome = handle
                .await
                .unwrap_or_else(|e| Err(FetchError::Network(format!("task failed: {e}"))));
            self.merge(&mut report, step, outcome)?;
        }

        Ok(report)
    }

    fn merge(
        &self,
        report: &mut AggregateReport,
        step: &PlanStep,
        outcome: FetchOutcome,
    ) -> Result<(), EngineError> {
        let name = step.endpoint.name();

        match step.rule {
            MergeRule::CopyAll => match object_body(outcome) {
                Ok(map) => {
                    // Later steps overwrite earlier ones on key collision.
                    for (key, value) in map {
                        report.insert(key, value);
                    }
                }
                Err(e) => {
                    warn!("{} step failed: {}", name, e);
                    if self.mode == MergeMode::Strict {
                        return Err(EngineError::Upstream {
                            step: name,
                            message: e.to_string(),
                        });
                    }
                    report.insert(
                        format!("{name}_data_error"),
                        json!(format!("Failed to fetch {name} data: {e}")),
                    );
                }
            },
            MergeRule::ProductionThisMonth => {
                let value = match object_body(outcome) {
                    Ok(map) => map
                        .get(PV_GENERATION)
                        .cloned()
                        .unwrap_or_else(|| json!(NOT_AVAILABLE)),
                    Err(e) => {
                        warn!("{} step failed: {}", name, e);
                        json!(NOT_AVAILABLE)
                    }
                };
                report.insert(PRODUCTION_THIS_MONTH.to_string(), value);
            }
            MergeRule::Series { key } => {
                let value = match outcome {
                    Ok(body) => body,
                    Err(e) => {
                        warn!("{} step failed: {}", name, e);
                        json!([])
                    }
                };
                report.insert(key.to_string(), value);
            }
        }

        Ok(())
    }
}

/// Decode a `body` envelope expected to be a JSON object.
fn object_body(outcome: FetchOutcome) -> Result<serde_json::Map<String, Value>, FetchError> {
    match outcome? {
        Value::Object(map) => Ok(map),
        other => Err(FetchError::Decode(format!(
            "expected object body, got {}",
            kind(&other)
        ))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Build the query plan for one request.
///
/// The day aggregate always targets today's date and the month aggregate
/// the current calendar month, independent of the caller-supplied `date`.
fn build_plan(query: &DashboardQuery, now: DateTime<Utc>) -> Vec<PlanStep> {
    let sn = query.device_sn.clone();
    let today = now.format("%Y%m%d").to_string();
    let month_start = now.format("%Y%m01").to_string();

    let mut plan = vec![
        PlanStep {
            endpoint: Endpoint::Realtime,
            params: vec![("deviceSn", sn.clone())],
            rule: MergeRule::CopyAll,
        },
        PlanStep {
            endpoint: Endpoint::DayAggregate,
            params: vec![("deviceSn", sn.clone()), ("date", today.clone())],
            rule: MergeRule::CopyAll,
        },
        PlanStep {
            endpoint: Endpoint::MonthAggregate,
            params: vec![
                ("deviceSn", sn.clone()),
                ("startDate", month_start),
                ("endDate", today),
            ],
            rule: MergeRule::ProductionThisMonth,
        },
    ];

    if let Some(date) = &query.date {
        plan.push(PlanStep {
            endpoint: Endpoint::ProductionByDay,
            params: vec![("deviceSn", sn.clone()), ("date", date.clone())],
            rule: MergeRule::Series {
                key: "productionDay",
            },
        });
    }

    if query.view_mode == Some(ViewMode::Month) {
        if let Some(month) = &query.month {
            plan.push(PlanStep {
                endpoint: Endpoint::ProductionByMonth,
                params: vec![
                    ("deviceSn", sn.clone()),
                    ("startDate", format!("{month}01")),
                    ("endDate", format!("{month}31")),
                ],
                rule: MergeRule::Series {
                    key: "productionMonth",
                },
            });
        }
    }

    if query.view_mode == Some(ViewMode::Year) {
        if let Some(year) = &query.year {
            plan.push(PlanStep {
                endpoint: Endpoint::ProductionByYear,
                params: vec![
                    ("deviceSn", sn),
                    ("startDate", format!("{year}0101")),
                    ("endDate", format!("{year}1231")),
                ],
                rule: MergeRule::Series {
                    key: "productionYear",
                },
            });
        }
    }

    plan
}
