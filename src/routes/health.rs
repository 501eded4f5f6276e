//! Health check endpoints
//!
//! - /health, /healthz - Liveness probe (is the service running?)
//! - /ready, /readyz - Readiness probe (is the mirror store reachable?)
//! - /version - build information

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::server::AppState;

use super::response::{json_response, ok_json};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: &'static str,
    pub timestamp: String,
    /// development or production
    pub mode: &'static str,
    /// memory or mongodb
    pub store: &'static str,
    /// Sequence of the newest ledger log entry
    pub ledger_sequence: u64,
    /// Sequence the mirror listener has applied up to
    pub mirror_cursor: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

async fn build_health_response(state: &AppState, error: Option<String>) -> HealthResponse {
    HealthResponse {
        healthy: error.is_none(),
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().to_rfc3339(),
        mode: if state.args.dev_mode {
            "development"
        } else {
            "production"
        },
        store: state.store.backend(),
        ledger_sequence: state.ledger.last_sequence().await,
        mirror_cursor: state.listener.cursor(),
        error,
    }
}

/// Liveness: 200 whenever the process is serving
pub async fn health_check(state: &AppState) -> Response<Full<Bytes>> {
    ok_json(&build_health_response(state, None).await)
}

/// Readiness: 200 only when the mirror store answers a ping
pub async fn readiness_check(state: &AppState) -> Response<Full<Bytes>> {
    let error = state.store.ping().await.err().map(|e| e.to_string());
    let status = if error.is_none() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    json_response(status, &build_health_response(state, error).await)
}

pub fn version() -> Response<Full<Bytes>> {
    ok_json(&serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
