//! Upload routes: `/upload/{merchantId}` and
//! `/merchant/{merchantId}/domains/upload`.
//!
//! Both take `multipart/form-data` with the file in the `file` field.

use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::routing::post;
use axum::{Json, Router};

use sitekeeper_core::merchant::MerchantId;
use sitekeeper_core::upload::UploadedFile;

use crate::error::AppError;
use crate::response::ApiResponse;
use crate::state::AppState;

/// Form field carrying the uploaded file.
pub const FILE_FIELD: &str = "file";

/// Room for multipart framing on top of the largest accepted file.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Build the upload router. Request bodies may exceed `max_file_bytes` only
/// by the multipart framing; the file itself is checked by the site manager.
pub fn router(max_file_bytes: u64) -> Router<Arc<AppState>> {
    let body_limit = usize::try_from(max_file_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/upload/{merchant_id}", post(upload_image))
        .route("/merchant/{merchant_id}/domains/upload", post(upload_domains))
        .layer(DefaultBodyLimit::max(body_limit))
}

// ── Request / Response types ─────────────────────────────────────────

/// The `file` part of a multipart body.
#[derive(Debug)]
struct FilePart {
    file_name: String,
    content_type: String,
    bytes: Vec<u8>,
}

// ── Handlers ─────────────────────────────────────────────────────────

/// `POST /upload/{merchantId}`: store an image in the site root.
async fn upload_image(
    State(state): State<Arc<AppState>>,
    Path(merchant_id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ApiResponse<UploadedFile>>, AppError> {
    let merchant = MerchantId::parse(&merchant_id)?;
    let part = file_part(multipart).await?;

    let saved = state
        .sites
        .upload_image(&merchant, part.file_name, part.content_type, part.bytes)
        .await?;
    Ok(Json(ApiResponse::ok("file uploaded", saved)))
}

/// `POST /merchant/{merchantId}/domains/upload`: replace `domains.json`.
async fn upload_domains(
    State(state): State<Arc<AppState>>,
    Path(merchant_id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ApiResponse<UploadedFile>>, AppError> {
    let merchant = MerchantId::parse(&merchant_id)?;
    let part = file_part(multipart).await?;

    let saved = state
        .sites
        .upload_domains(&merchant, part.file_name, part.content_type, part.bytes)
        .await?;
    Ok(Json(ApiResponse::ok("domains.json uploaded", saved)))
}

/// Read the first `file` field; other fields are skipped.
async fn file_part(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<FilePart, AppError> {
    let mut multipart = multipart.map_err(|e| AppError::BadRequest(e.body_text()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_owned();
        let content_type = field.content_type().unwrap_or_default().to_owned();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        return Ok(FilePart {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    Err(AppError::BadRequest(format!(
        "multipart field '{FILE_FIELD}' is required"
    )))
}
