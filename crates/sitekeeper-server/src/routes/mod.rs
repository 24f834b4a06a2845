//! HTTP route handlers for `SiteKeeper`.
//!
//! Routes are organized by subsystem:
//! - `sys`: Health check
//! - `merchants`: Provisioning, re-pointing, listings, and file reads
//! - `domains`: The merchant's `data/domains.json` document
//! - `uploads`: Multipart image and `domains.json` uploads
//!
//! The static admin frontend is served under `/admin`.

pub mod domains;
pub mod merchants;
pub mod sys;
pub mod uploads;

use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderValue, Method, header};
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Mutating requests allowed in flight at once.
const MAX_CONCURRENT_WRITES: usize = 16;

/// Build the full admin API router.
pub fn build_router(state: Arc<AppState>) -> Router {
    // One permit pool for every route that writes to the upload root.
    let write_routes = Router::new()
        .merge(merchants::write_router())
        .merge(domains::write_router())
        .merge(uploads::router(state.sites.max_file_bytes()))
        .layer(write_limit(MAX_CONCURRENT_WRITES));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .merge(sys::router())
        .merge(merchants::read_router())
        .merge(domains::read_router())
        .merge(write_routes)
        .nest_service("/admin", ServeDir::new(&state.admin_dir))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .with_state(state)
}

/// One semaphore for every service the layer wraps. `Router::layer` wraps
/// each route separately.
fn write_limit(max: usize) -> GlobalConcurrencyLimitLayer {
    GlobalConcurrencyLimitLayer::new(max)
}
