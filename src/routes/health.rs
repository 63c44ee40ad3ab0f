//! Health check endpoints
//!
//! - /health, /healthz - liveness probe (is the service running?)
//! - /ready, /readyz   - readiness probe (is the user store reachable?)
//!
//! Liveness returns 200 whenever the process is up. Readiness returns
//! 200 only when a user store is available; in dev mode the in-memory
//! store always counts as ready.

use chrono::Utc;
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use crate::routes::helpers::{json_response, BoxBody};
use crate::server::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: &'static str,
    pub commit: &'static str,
    pub uptime: u64,
    pub timestamp: String,
    pub mode: &'static str,
    pub node_id: String,
    /// Whether MongoDB is connected (false means the in-memory dev store)
    pub database: bool,
    /// Whether payment endpoints are configured
    pub payments: bool,
}

fn build_response(state: &AppState) -> HealthResponse {
    HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        commit: option_env!("GIT_COMMIT_SHORT").unwrap_or("unknown"),
        uptime: state.started_at.elapsed().as_secs(),
        timestamp: Utc::now().to_rfc3339(),
        mode: if state.args.dev_mode {
            "development"
        } else {
            "production"
        },
        node_id: state.args.node_id.to_string(),
        database: state.mongo.is_some(),
        payments: state.args.payments_configured(),
    }
}

/// GET /health - liveness
pub fn health_check(state: &Arc<AppState>) -> Response<BoxBody> {
    json_response(StatusCode::OK, &build_response(state))
}

/// GET /ready - readiness
pub fn readiness_check(state: &Arc<AppState>) -> Response<BoxBody> {
    let body = build_response(state);
    // Without MongoDB, only dev mode (memory store) is ready for traffic
    let status = if body.database || state.args.dev_mode {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    json_response(status, &body)
}
