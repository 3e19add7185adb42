//! API routes for heliod.
//!
//! Thin transport layer: parse the request, check the token gate where
//! enabled, hand off to the engine or a collaborator client, and map
//! errors to status codes. All bodies are JSON.

use crate::aggregator::EngineError;
use crate::directory::LookupError;
use crate::server::AppState;
use crate::token_gate::issue_token;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use helio_common::{
    AggregateReport, DashboardQuery, DeviceRecord, HealthResponse, OtpDecision, OtpSendRequest,
    OtpVerifyRequest, TokenResponse, VERSION,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};

type AppStateArc = Arc<AppState>;

type ErrorResponse = (StatusCode, Json<Value>);

fn error_body(status: StatusCode, message: &str) -> ErrorResponse {
    (status, Json(json!({ "error": message })))
}

// ============================================================================
// Dashboard Routes
// ============================================================================

pub fn dashboard_routes() -> Router<AppStateArc> {
    Router::new().route("/api/dashboard", get(dashboard))
}

async fn dashboard(
    State(state): State<AppStateArc>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<AggregateReport>, ErrorResponse> {
    if state.config.require_token {
        let valid = query
            .token
            .as_deref()
            .map(|t| state.tokens.validate(t))
            .unwrap_or(false);
        if !valid {
            return Err(error_body(
                StatusCode::UNAUTHORIZED,
                "invalid or expired session token",
            ));
        }
    }

    info!("Dashboard request for device {}", query.device_sn);

    match state.engine.aggregate(&query).await {
        Ok(report) => Ok(Json(report)),
        Err(e @ EngineError::Validation(_)) => {
            Err((StatusCode::BAD_REQUEST, Json(Value::Object(e.to_report()))))
        }
        Err(e) => {
            error!("Aggregation failed: {}", e);
            Err((StatusCode::BAD_GATEWAY, Json(Value::Object(e.to_report()))))
        }
    }
}

// ============================================================================
// Device Directory Routes
// ============================================================================

pub fn device_routes() -> Router<AppStateArc> {
    Router::new().route("/api/devices/:phone", get(resolve_devices))
}

async fn resolve_devices(
    State(state): State<AppStateArc>,
    Path(phone): Path<String>,
) -> Result<Json<DeviceRecord>, ErrorResponse> {
    let directory = state.directory.as_ref().ok_or_else(|| {
        error_body(
            StatusCode::SERVICE_UNAVAILABLE,
            "device directory not configured",
        )
    })?;

    match directory.resolve(&phone).await {
        Ok(record) => Ok(Json(record)),
        Err(LookupError::NotFound) => Err(error_body(
            StatusCode::NOT_FOUND,
            "no device registered for this phone number",
        )),
        Err(e) => {
            error!("Device lookup failed: {}", e);
            Err(error_body(StatusCode::BAD_GATEWAY, &e.to_string()))
        }
    }
}

// ============================================================================
// OTP Routes
// ============================================================================

pub fn otp_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/api/otp/send", post(otp_send))
        .route("/api/otp/verify", post(otp_verify))
}

async fn otp_send(
    State(state): State<AppStateArc>,
    Json(req): Json<OtpSendRequest>,
) -> Result<Json<Value>, ErrorResponse> {
    let otp = state.otp.as_ref().ok_or_else(|| {
        error_body(StatusCode::SERVICE_UNAVAILABLE, "OTP provider not configured")
    })?;

    match otp.send(&req.phone).await {
        Ok(()) => Ok(Json(json!({ "status": "pending" }))),
        Err(e) => {
            error!("OTP send failed: {}", e);
            Err(error_body(StatusCode::BAD_GATEWAY, &e.to_string()))
        }
    }
}

async fn otp_verify(
    State(state): State<AppStateArc>,
    Json(req): Json<OtpVerifyRequest>,
) -> Result<Json<TokenResponse>, ErrorResponse> {
    let otp = state.otp.as_ref().ok_or_else(|| {
        error_body(StatusCode::SERVICE_UNAVAILABLE, "OTP provider not configured")
    })?;

    match otp.check(&req.phone, &req.code).await {
        Ok(OtpDecision::Approved) => {
            info!("OTP approved, issuing session token");
            Ok(Json(issue_token(state.tokens.as_ref())))
        }
        Ok(OtpDecision::Denied) => Err(error_body(
            StatusCode::UNAUTHORIZED,
            "verification denied",
        )),
        Err(e) => {
            error!("OTP check failed: {}", e);
            Err(error_body(StatusCode::BAD_GATEWAY, &e.to_string()))
        }
    }
}

// ============================================================================
// Health Routes
// ============================================================================

pub fn health_routes() -> Router<AppStateArc> {
    Router::new().route("/api/health", get(health_check))
}

async fn health_check(State(state): State<AppStateArc>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: VERSION.to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}
