use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    database: &'static str,
    uptime: u64,
    timestamp: String,
}

/// Liveness plus a database ping. Reports degraded with 503 when the pool is
/// missing or the ping fails, so orchestration can tell the two states apart
/// from a plain crash.
pub async fn health(State(state): State<AppState>) -> Response {
    let db_connected = match state.db() {
        Some(db) => db.ping().await,
        None => false,
    };

    let response = HealthResponse {
        status: if db_connected { "ok" } else { "degraded" },
        database: if db_connected {
            "connected"
        } else {
            "disconnected"
        },
        uptime: state.uptime_seconds(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    };

    let status_code = if db_connected {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(response)).into_response()
}
