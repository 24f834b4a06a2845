//! Directory listings for the admin tool.

use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::warn;
use walkdir::WalkDir;

use crate::error::SiteError;
use crate::merchant::{MERCHANT_DIR_PREFIX, MerchantId};

/// One provisioned merchant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantEntry {
    pub merchant_id: String,
    pub directory: String,
}

/// One file inside a merchant site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
    /// Public URL path, e.g. `/merchant_1000/html/index.html`.
    pub url: String,
    /// Path the file-content reader accepts, e.g. `www/merchant_1000/html/index.html`.
    pub path: String,
}

/// Every `merchant_*` directory directly under `base`, sorted by directory name.
///
/// A missing `base` lists as empty.
///
/// # Errors
///
/// Returns [`SiteError::Io`] if `base` exists but cannot be read.
pub fn list_merchants(base: &Path) -> Result<Vec<MerchantEntry>, SiteError> {
    let entries = match fs::read_dir(base) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(SiteError::io(base, e)),
    };

    let mut merchants = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| SiteError::io(base, e))?;
        let is_dir = entry.file_type().is_ok_and(|t| t.is_dir());
        let name = entry.file_name().to_string_lossy().into_owned();
        if let Some(id) = name.strip_prefix(MERCHANT_DIR_PREFIX).filter(|_| is_dir) {
            merchants.push(MerchantEntry {
                merchant_id: id.to_owned(),
                directory: name.clone(),
            });
        }
    }

    merchants.sort_by(|a, b| a.directory.cmp(&b.directory));
    Ok(merchants)
}

/// Every regular file under the merchant's directory, in walk order.
///
/// Unreadable entries are logged and skipped.
///
/// # Errors
///
/// Returns [`SiteError::NotFound`] if the merchant directory does not exist.
pub fn list_files(base: &Path, merchant: &MerchantId) -> Result<Vec<FileEntry>, SiteError> {
    let root = merchant.dir_in(base);
    if !root.is_dir() {
        return Err(SiteError::NotFound {
            what: format!("merchant '{merchant}'"),
        });
    }

    let base_name = base
        .file_name()
        .map_or_else(|| "www".to_owned(), |n| n.to_string_lossy().into_owned());
    let dir_name = merchant.dir_name();

    let mut files = Vec::new();
    for entry in WalkDir::new(&root).min_depth(1).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(merchant = %merchant, error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(&root) else {
            continue;
        };
        let relative = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let size = match entry.metadata() {
            Ok(meta) => meta.len(),
            Err(e) => {
                warn!(path = %entry.path().display(), error = %e, "skipping file without metadata");
                continue;
            }
        };

        files.push(FileEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            size,
            url: format!("/{dir_name}/{relative}"),
            path: format!("{base_name}/{dir_name}/{relative}"),
        });
    }

    Ok(files)
}
