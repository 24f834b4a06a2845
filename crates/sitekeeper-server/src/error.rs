//! HTTP error types for `SiteKeeper` server.
//!
//! Maps [`SiteError`] from `sitekeeper-core` into HTTP responses. Every error
//! renders the failure envelope `{success: false, error, message}` with a
//! machine-readable `error` kind and a human-readable `message`. Filesystem
//! failures also carry `data.paths`, the files involved.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use sitekeeper_core::error::SiteError;

/// Application-level error returned from HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Client sent invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The request names a path outside the merchant's site.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Requested merchant or file not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The merchant site already exists.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A filesystem operation failed on the listed paths. For an interrupted
    /// reconfiguration these are the files already rewritten.
    #[error("filesystem error: {message}")]
    Filesystem { message: String, paths: Vec<String> },

    /// Runtime failure with nothing useful to report to the caller.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<ErrorData>,
}

#[derive(Serialize)]
struct ErrorData {
    paths: Vec<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut data = None;
        let (status, error_type, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            Self::Filesystem { message, paths } => {
                tracing::error!(error = %message, paths = ?paths, "filesystem error");
                data = Some(ErrorData { paths });
                (StatusCode::INTERNAL_SERVER_ERROR, "filesystem_error", message)
            }
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal server error".to_owned(),
                )
            }
        };

        let body = ErrorBody {
            success: false,
            error: error_type,
            message,
            data,
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<SiteError> for AppError {
    fn from(err: SiteError) -> Self {
        match err {
            SiteError::InvalidArgument { .. } | SiteError::InvalidPath { .. } => {
                Self::BadRequest(err.to_string())
            }
            SiteError::AlreadyExists { .. } => Self::Conflict(err.to_string()),
            SiteError::NotFound { .. } => Self::NotFound(err.to_string()),
            SiteError::Forbidden { .. } => Self::Forbidden(err.to_string()),
            SiteError::TemplateMissing { ref path }
            | SiteError::Io { ref path, .. }
            | SiteError::Json { ref path, .. } => Self::Filesystem {
                paths: vec![path.display().to_string()],
                message: err.to_string(),
            },
            SiteError::Rename { ref from, ref to, .. } => Self::Filesystem {
                paths: vec![from.display().to_string(), to.display().to_string()],
                message: err.to_string(),
            },
            SiteError::Interrupted { ref completed, .. } => Self::Filesystem {
                paths: completed.iter().map(|p| p.display().to_string()).collect(),
                message: err.to_string(),
            },
            SiteError::Task { .. } => Self::Internal(err.to_string()),
        }
    }
}
