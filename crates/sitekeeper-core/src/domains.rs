//! The merchant's `data/domains.json` document.
//!
//! The admin tool edits it as an opaque JSON object; only its shape (an
//! object) is checked.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::SiteError;
use crate::provision::write_file;

pub const DOMAINS_FILE: &str = "domains.json";

/// A `domains.json` document.
pub type DomainsDocument = Map<String, Value>;

/// Location of `domains.json` inside a merchant directory.
pub fn domains_path(merchant_root: &Path) -> PathBuf {
    merchant_root.join("data").join(DOMAINS_FILE)
}

/// Read and parse the merchant's `domains.json`.
///
/// # Errors
///
/// - [`SiteError::NotFound`] if the file does not exist.
/// - [`SiteError::Json`] if it is not a JSON object.
/// - [`SiteError::Io`] on any other read failure.
pub fn read_domains(merchant_root: &Path) -> Result<DomainsDocument, SiteError> {
    let path = domains_path(merchant_root);
    let raw = fs::read(&path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => SiteError::NotFound {
            what: format!("'{}'", path.display()),
        },
        _ => SiteError::io(&path, e),
    })?;

    serde_json::from_slice(&raw).map_err(|source| SiteError::Json { path, source })
}

/// Replace the merchant's `domains.json` with `doc`, pretty-printed.
///
/// Creates `data/` if it went missing.
///
/// # Errors
///
/// - [`SiteError::NotFound`] if the merchant directory does not exist.
/// - [`SiteError::Io`] if the directory or file cannot be written.
pub fn write_domains(merchant_root: &Path, doc: &DomainsDocument) -> Result<(), SiteError> {
    if !merchant_root.is_dir() {
        return Err(SiteError::NotFound {
            what: format!("merchant directory '{}'", merchant_root.display()),
        });
    }

    let path = domains_path(merchant_root);
    if let Some(data) = path.parent() {
        fs::create_dir_all(data).map_err(|e| SiteError::io(data, e))?;
    }

    let body = serde_json::to_vec_pretty(doc).map_err(|source| SiteError::Json {
        path: path.clone(),
        source,
    })?;
    write_file(&path, &body)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn write_then_read_back() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("merchant_1000");
        fs::create_dir_all(&root).unwrap();

        let doc = json!({"main": "shop.example.com", "backup": ["a.example.com"]});
        let doc = doc.as_object().unwrap().clone();
        write_domains(&root, &doc).unwrap();

        let raw = fs::read_to_string(domains_path(&root)).unwrap();
        assert!(raw.contains("\n  \"main\""), "expected two-space indentation: {raw}");
        assert_eq!(read_domains(&root).unwrap(), doc);
    }

    #[test]
    fn missing_file_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let result = read_domains(tmp.path());
        assert!(matches!(result, Err(SiteError::NotFound { .. })));
    }

    #[test]
    fn non_object_is_json_error() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("data")).unwrap();
        fs::write(domains_path(tmp.path()), "[1, 2]").unwrap();
        let result = read_domains(tmp.path());
        assert!(matches!(result, Err(SiteError::Json { .. })));
    }

    #[test]
    fn write_requires_merchant_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let result = write_domains(&tmp.path().join("merchant_9"), &DomainsDocument::new());
        assert!(matches!(result, Err(SiteError::NotFound { .. })));
    }
}
