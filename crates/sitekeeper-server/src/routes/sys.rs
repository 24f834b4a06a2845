//! System routes: `/health`.

use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Build the system router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health))
}

// ── Request / Response types ─────────────────────────────────────────

/// Response body for `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub message: &'static str,
}

// ── Handlers ─────────────────────────────────────────────────────────

/// `GET /health`: liveness check. Never touches the filesystem.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        message: "sitekeeper is running",
    })
}
