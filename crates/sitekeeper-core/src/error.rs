//! Error types for `sitekeeper-core`.
//!
//! Filesystem failures always carry the offending path. Nothing here is
//! retried; callers surface the error as a single terminal failure.

use std::path::PathBuf;

/// Errors from provisioning, reconfiguration, and file resolution.
#[derive(Debug, thiserror::Error)]
pub enum SiteError {
    /// Missing or malformed merchant id, domain, port, or path.
    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// A client-supplied path could not be decoded.
    #[error("invalid path: {reason}")]
    InvalidPath { reason: String },

    /// The merchant directory already exists.
    #[error("merchant already exists: {merchant}")]
    AlreadyExists { merchant: String },

    /// The merchant, file, or document does not exist.
    #[error("not found: {what}")]
    NotFound { what: String },

    /// The request crossed a security boundary.
    #[error("forbidden: {reason}")]
    Forbidden { reason: String },

    /// The template root is absent.
    #[error("template directory does not exist: {}", path.display())]
    TemplateMissing { path: PathBuf },

    /// A filesystem operation failed.
    #[error("I/O failure at '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Renaming a provisioned file or directory into place failed.
    #[error("failed to rename '{}' to '{}': {source}", from.display(), to.display())]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A reconfiguration pass stopped after rewriting some files.
    ///
    /// `completed` lists every file already rewritten (each has a `.bak`).
    #[error("reconfiguration interrupted after {} rewritten file(s): {source}", completed.len())]
    Interrupted {
        completed: Vec<PathBuf>,
        #[source]
        source: Box<SiteError>,
    },

    /// A JSON document on disk or in a request is not a JSON object.
    #[error("invalid JSON in '{}': {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A blocking filesystem task panicked or was cancelled.
    #[error("blocking task failed: {reason}")]
    Task { reason: String },
}

impl SiteError {
    /// Wrap an I/O error with the path it happened on.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
