//! In-place reconfiguration of an existing merchant site.
//!
//! Walks the whole merchant tree, runs every regular file through the
//! substitution engine, and rewrites only the files whose bytes changed.
//! Each rewrite is preceded by a `{file}.bak` copy of the original bytes.
//! Running the same pass twice changes nothing the second time.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::SiteError;
use crate::provision::write_file;
use crate::substitute::{SubstitutionRules, substitute};

/// Suffix appended to a file's path to form its backup.
pub const BACKUP_SUFFIX: &str = ".bak";

/// Outcome of a reconfiguration pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconfigureReport {
    /// Number of files rewritten.
    pub files_changed: usize,
    /// Every rewritten file, in walk order.
    pub changed: Vec<PathBuf>,
}

/// Backup path for `path`: the original path plus [`BACKUP_SUFFIX`].
pub fn backup_path(path: &Path) -> PathBuf {
    let mut raw = path.as_os_str().to_os_string();
    raw.push(BACKUP_SUFFIX);
    PathBuf::from(raw)
}

/// A `.bak` file counts as a backup only while the file it backs up sits
/// next to it. A template that ships `notes.bak` alone gets it rewritten.
fn is_backup(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "bak") && path.with_extension("").is_file()
}

/// Apply `rules` to every file under `merchant_root`.
///
/// Backups written by earlier passes are never rewritten.
///
/// # Errors
///
/// - [`SiteError::NotFound`] if `merchant_root` is not a directory.
/// - [`SiteError::Io`] if the first failing file fails before anything was
///   rewritten.
/// - [`SiteError::Interrupted`] if a failure happens after some files were
///   already rewritten. Those files keep their new content; their backups
///   hold the old content.
pub fn reconfigure(
    merchant_root: &Path,
    rules: &SubstitutionRules,
) -> Result<ReconfigureReport, SiteError> {
    if !merchant_root.is_dir() {
        return Err(SiteError::NotFound {
            what: format!("merchant directory '{}'", merchant_root.display()),
        });
    }

    let mut report = ReconfigureReport::default();

    for entry in WalkDir::new(merchant_root).sort_by_file_name() {
        let outcome = entry
            .map_err(|e| {
                let path = e
                    .path()
                    .map_or_else(|| merchant_root.to_path_buf(), Path::to_path_buf);
                SiteError::io(path, std::io::Error::from(e))
            })
            .and_then(|entry| {
                if !entry.file_type().is_file() || is_backup(entry.path()) {
                    return Ok(None);
                }
                rewrite_file(entry.path(), rules)
                    .map(|changed| changed.then(|| entry.path().to_path_buf()))
            });

        match outcome {
            Ok(Some(path)) => report.changed.push(path),
            Ok(None) => {}
            Err(err) => return Err(interrupted(report.changed, err)),
        }
    }

    report.files_changed = report.changed.len();
    info!(
        directory = %merchant_root.display(),
        files_changed = report.files_changed,
        "merchant site reconfigured"
    );
    Ok(report)
}

/// Substitute one file. Returns whether it was rewritten.
fn rewrite_file(path: &Path, rules: &SubstitutionRules) -> Result<bool, SiteError> {
    let original = fs::read(path).map_err(|e| SiteError::io(path, e))?;
    let updated = substitute(&original, rules);
    if updated == original {
        return Ok(false);
    }

    write_file(&backup_path(path), &original)?;
    write_file(path, &updated)?;
    debug!(path = %path.display(), "file rewritten");
    Ok(true)
}

fn interrupted(completed: Vec<PathBuf>, err: SiteError) -> SiteError {
    if completed.is_empty() {
        return err;
    }

    warn!(
        rewritten = completed.len(),
        completed = ?completed,
        error = %err,
        "reconfiguration stopped part way; rewritten files keep their .bak backups"
    );
    SiteError::Interrupted {
        completed,
        source: Box::new(err),
    }
}
