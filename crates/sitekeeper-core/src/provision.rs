//! Template materializer.
//!
//! Seeds a new merchant site from the template tree. The whole tree is built
//! in a hidden staging directory next to the final location and moved into
//! place with a single `rename`, so a failure at any step leaves no
//! half-provisioned merchant behind: either `merchant_{id}/` exists and is
//! complete, or it does not exist at all.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::SiteError;
use crate::merchant::{MERCHANT_SUBDIRS, MerchantId};
use crate::substitute::{SubstitutionRules, substitute};

/// Template subdirectories copied into every new site.
pub const COPIED_SUBDIRS: [&str; 3] = ["html", "data", "static"];

/// Landing page name inside the template's `html/` directory.
pub const TEMPLATE_INDEX_FILE: &str = "merchant_MERCHANT_ID_index.html";

/// Outcome of a successful provisioning run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionReport {
    /// Final merchant directory.
    pub directory: PathBuf,
    /// Number of template files written (after substitution).
    pub files_written: usize,
    /// Whether the template landing page was renamed for this merchant.
    pub index_renamed: bool,
}

/// Materialize `template_root` into `dest_root` for `merchant`.
///
/// # Errors
///
/// - [`SiteError::AlreadyExists`] if `dest_root` exists (checked before any write).
/// - [`SiteError::TemplateMissing`] if `template_root` is not a directory.
/// - [`SiteError::Io`] if reading the template or writing the copy fails.
/// - [`SiteError::Rename`] if the landing page or the final move fails.
///
/// On every error the staging directory is removed.
pub fn provision(
    template_root: &Path,
    dest_root: &Path,
    merchant: &MerchantId,
    rules: &SubstitutionRules,
) -> Result<ProvisionReport, SiteError> {
    if exists(dest_root)? {
        return Err(SiteError::AlreadyExists {
            merchant: merchant.to_string(),
        });
    }

    if !template_root.is_dir() {
        return Err(SiteError::TemplateMissing {
            path: template_root.to_path_buf(),
        });
    }

    let parent = dest_root
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|e| SiteError::io(parent, e))?;

    let staging = parent.join(format!(
        ".{}.staging-{}",
        merchant.dir_name(),
        uuid::Uuid::new_v4().simple()
    ));
    fs::create_dir(&staging).map_err(|e| SiteError::io(&staging, e))?;
    debug!(staging = %staging.display(), "staging directory created");

    let result = populate(template_root, &staging, merchant, rules)
        .and_then(|report| commit(&staging, dest_root, merchant).map(|()| report));

    match result {
        Ok((files_written, index_renamed)) => {
            info!(
                merchant = %merchant,
                directory = %dest_root.display(),
                files_written,
                "merchant site provisioned"
            );
            Ok(ProvisionReport {
                directory: dest_root.to_path_buf(),
                files_written,
                index_renamed,
            })
        }
        Err(err) => {
            discard_staging(&staging);
            Err(err)
        }
    }
}

/// Build the full site inside `staging`. Returns (files written, index renamed).
fn populate(
    template_root: &Path,
    staging: &Path,
    merchant: &MerchantId,
    rules: &SubstitutionRules,
) -> Result<(usize, bool), SiteError> {
    for sub in MERCHANT_SUBDIRS {
        let dir = staging.join(sub);
        fs::create_dir_all(&dir).map_err(|e| SiteError::io(&dir, e))?;
    }

    let mut files_written = 0usize;
    for sub in COPIED_SUBDIRS {
        let source = template_root.join(sub);
        if !source.is_dir() {
            debug!(subdir = sub, "template has no such subdirectory, skipping");
            continue;
        }
        files_written += copy_tree(template_root, &source, staging, rules)?;
    }

    let index_renamed = rename_index(staging, merchant)?;
    set_dir_permissions(staging);

    Ok((files_written, index_renamed))
}

/// Recursively copy `source` (a directory under `template_root`) into
/// `staging`, substituting every regular file.
fn copy_tree(
    template_root: &Path,
    source: &Path,
    staging: &Path,
    rules: &SubstitutionRules,
) -> Result<usize, SiteError> {
    let mut written = 0usize;

    for entry in WalkDir::new(source).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().map_or_else(|| source.to_path_buf(), Path::to_path_buf);
            SiteError::io(path, io::Error::from(e))
        })?;

        let relative = entry
            .path()
            .strip_prefix(template_root)
            .map_err(|_| SiteError::InvalidPath {
                reason: format!("'{}' escaped the template root", entry.path().display()),
            })?;
        let target = staging.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target).map_err(|e| SiteError::io(&target, e))?;
        } else if file_type.is_file() {
            let content = fs::read(entry.path()).map_err(|e| SiteError::io(entry.path(), e))?;
            write_file(&target, &substitute(&content, rules))?;
            written += 1;
        } else {
            warn!(path = %entry.path().display(), "skipping non-regular template entry");
        }
    }

    Ok(written)
}

fn rename_index(staging: &Path, merchant: &MerchantId) -> Result<bool, SiteError> {
    let html = staging.join("html");
    let from = html.join(TEMPLATE_INDEX_FILE);
    if !exists(&from)? {
        return Ok(false);
    }

    let to = html.join(merchant.index_file_name());
    fs::rename(&from, &to).map_err(|source| SiteError::Rename { from, to, source })?;
    Ok(true)
}

/// Move the finished staging tree to its final name.
fn commit(staging: &Path, dest_root: &Path, merchant: &MerchantId) -> Result<(), SiteError> {
    // rename(2) silently replaces an empty directory; refuse instead.
    if exists(dest_root)? {
        return Err(SiteError::AlreadyExists {
            merchant: merchant.to_string(),
        });
    }

    fs::rename(staging, dest_root).map_err(|source| match source.kind() {
        io::ErrorKind::AlreadyExists | io::ErrorKind::DirectoryNotEmpty => {
            SiteError::AlreadyExists {
                merchant: merchant.to_string(),
            }
        }
        _ => SiteError::Rename {
            from: staging.to_path_buf(),
            to: dest_root.to_path_buf(),
            source,
        },
    })
}

fn discard_staging(staging: &Path) {
    if let Err(e) = fs::remove_dir_all(staging) {
        warn!(
            staging = %staging.display(),
            error = %e,
            "failed to remove staging directory after provisioning error"
        );
    }
}

fn exists(path: &Path) -> Result<bool, SiteError> {
    path.try_exists().map_err(|e| SiteError::io(path, e))
}

/// Write `content` to `path` with mode 0644 on unix.
pub(crate) fn write_file(path: &Path, content: &[u8]) -> Result<(), SiteError> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o644);
    }

    let mut file = options.open(path).map_err(|e| SiteError::io(path, e))?;
    io::Write::write_all(&mut file, content).map_err(|e| SiteError::io(path, e))
}

/// Best effort: a failure is logged and provisioning still succeeds.
fn set_dir_permissions(dir: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = fs::set_permissions(dir, fs::Permissions::from_mode(0o755)) {
            warn!(
                directory = %dir.display(),
                error = %e,
                "failed to set merchant directory permissions"
            );
        }
    }
    #[cfg(not(unix))]
    let _ = dir;
}
