//! Domains routes: `/merchant/{merchantId}/domains`.
//!
//! Reads and replaces the merchant's `data/domains.json`. The document is
//! treated as an opaque JSON object.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, put};
use axum::{Json, Router};
use tracing::info;

use sitekeeper_core::domains::DomainsDocument;
use sitekeeper_core::merchant::MerchantId;

use crate::error::AppError;
use crate::response::ApiResponse;
use crate::state::AppState;

pub fn read_router() -> Router<Arc<AppState>> {
    Router::new().route("/merchant/{merchant_id}/domains", get(get_domains))
}

pub fn write_router() -> Router<Arc<AppState>> {
    Router::new().route("/merchant/{merchant_id}/domains", put(put_domains))
}

// ── Handlers ─────────────────────────────────────────────────────────

/// `GET /merchant/{merchantId}/domains`
async fn get_domains(
    State(state): State<Arc<AppState>>,
    Path(merchant_id): Path<String>,
) -> Result<Json<ApiResponse<DomainsDocument>>, AppError> {
    let merchant = MerchantId::parse(&merchant_id)?;
    let doc = state.sites.domains(&merchant).await?;
    Ok(Json(ApiResponse::data(doc)))
}

/// `PUT /merchant/{merchantId}/domains`: body must be a JSON object.
async fn put_domains(
    State(state): State<Arc<AppState>>,
    Path(merchant_id): Path<String>,
    body: Result<Json<DomainsDocument>, JsonRejection>,
) -> Result<Json<ApiResponse<DomainsDocument>>, AppError> {
    let merchant = MerchantId::parse(&merchant_id)?;
    let Json(doc) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let written = state.sites.replace_domains(&merchant, doc).await?;
    info!(merchant = %merchant, keys = written.len(), "domains.json replaced");
    Ok(Json(ApiResponse::ok("domains updated", written)))
}
