//! Merchant routes: `/merchants` and `/merchant/{merchantId}/*`.
//!
//! Provisioning and re-pointing are exposed through [`write_router`], which
//! the top-level router wraps in a concurrency limit. Listings and file reads
//! go through [`read_router`].

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;

use sitekeeper_core::listing::MerchantEntry;
use sitekeeper_core::merchant::MerchantId;
use sitekeeper_core::site::{CreatedSite, FileContent, MerchantFiles, ReconfiguredSite};
use sitekeeper_core::substitute::{DEFAULT_HOST, DEFAULT_PORT, SiteAddress};

use crate::error::AppError;
use crate::response::ApiResponse;
use crate::state::AppState;

/// Routes that only read the upload root.
pub fn read_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/merchants", get(list_merchants))
        .route("/merchant/{merchant_id}/files", get(list_files))
        .route("/merchant/{merchant_id}/file", get(read_file))
}

/// Routes that create or rewrite merchant sites.
pub fn write_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/merchant/create/{merchant_id}", post(create))
        .route("/merchant/{merchant_id}/domain-port", put(update_domain_port))
}

// ── Request / Response types ─────────────────────────────────────────

/// Query for `POST /merchant/create/{merchantId}`.
#[derive(Debug, Deserialize)]
pub struct CreateParams {
    /// Domain the site is served from (default `localhost`).
    pub domain: Option<String>,
    /// Port the site is served on (default `8080`).
    pub port: Option<String>,
}

/// Query for `PUT /merchant/{merchantId}/domain-port`. Both are required.
#[derive(Debug, Deserialize)]
pub struct DomainPortParams {
    pub domain: Option<String>,
    pub port: Option<String>,
}

/// Query for `GET /merchant/{merchantId}/file`.
#[derive(Debug, Deserialize)]
pub struct FileParams {
    /// Double-encoded path, e.g. `www%252Fmerchant_1000%252Fhtml%252Findex.html`.
    pub path: Option<String>,
}

// ── Handlers ─────────────────────────────────────────────────────────

/// `GET /merchants`: every provisioned merchant.
async fn list_merchants(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<MerchantEntry>>>, AppError> {
    let merchants = state.sites.list_merchants().await?;
    let total = merchants.len();
    Ok(Json(ApiResponse::data(merchants).with_total(total)))
}

/// `POST /merchant/create/{merchantId}`: provision a site from the template.
async fn create(
    State(state): State<Arc<AppState>>,
    Path(merchant_id): Path<String>,
    Query(params): Query<CreateParams>,
) -> Result<Json<ApiResponse<CreatedSite>>, AppError> {
    let merchant = MerchantId::parse(&merchant_id)?;
    let address = SiteAddress::new(
        params.domain.unwrap_or_else(|| DEFAULT_HOST.to_owned()),
        params.port.unwrap_or_else(|| DEFAULT_PORT.to_owned()),
        state.protocol.as_str(),
    );

    let created = state.sites.create(&merchant, address).await?;
    info!(
        merchant = %merchant,
        url = %created.url,
        files = created.files_written,
        "merchant site created"
    );

    Ok(Json(ApiResponse::ok("merchant site created", created)))
}

/// `GET /merchant/{merchantId}/files`: every file of the site.
async fn list_files(
    State(state): State<Arc<AppState>>,
    Path(merchant_id): Path<String>,
) -> Result<Json<ApiResponse<MerchantFiles>>, AppError> {
    let merchant = MerchantId::parse(&merchant_id)?;
    let files = state.sites.list_files(&merchant).await?;
    Ok(Json(ApiResponse::data(files)))
}

/// `GET /merchant/{merchantId}/file?path=`: one file, confined to the
/// merchant's directory.
async fn read_file(
    State(state): State<Arc<AppState>>,
    Path(merchant_id): Path<String>,
    Query(params): Query<FileParams>,
) -> Result<Json<ApiResponse<FileContent>>, AppError> {
    let merchant = MerchantId::parse(&merchant_id)?;
    let Some(path) = params.path.filter(|p| !p.is_empty()) else {
        return Err(AppError::BadRequest("path parameter is required".to_owned()));
    };

    let file = state.sites.read_file(&merchant, &path).await?;
    Ok(Json(ApiResponse::data(file)))
}

/// `PUT /merchant/{merchantId}/domain-port?domain&port`: re-point the site.
async fn update_domain_port(
    State(state): State<Arc<AppState>>,
    Path(merchant_id): Path<String>,
    Query(params): Query<DomainPortParams>,
) -> Result<Json<ApiResponse<ReconfiguredSite>>, AppError> {
    let merchant = MerchantId::parse(&merchant_id)?;
    let (Some(domain), Some(port)) = (params.domain, params.port) else {
        return Err(AppError::BadRequest(
            "domain and port parameters are required".to_owned(),
        ));
    };

    let address = SiteAddress::new(domain, port, state.protocol.as_str());
    let updated = state.sites.reconfigure(&merchant, address).await?;
    Ok(Json(ApiResponse::ok("domain and port updated", updated)))
}
