//! Safe path resolution for the file-content reader.
//!
//! [`PathResolver::resolve`] is the single security boundary between a
//! client-supplied path and `fs::read`. It decodes the path, anchors it under
//! the base upload directory, and proves, both lexically and after following
//! symlinks, that the result lies inside the caller's own merchant directory.
//! Nothing is opened until every check has passed.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

use crate::error::SiteError;
use crate::merchant::MerchantId;

/// A regular file that passed every resolution check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFile {
    /// Absolute, lexically cleaned path to read.
    pub path: PathBuf,
    /// The decoded path as the client sent it.
    pub display_path: String,
    /// Final path component.
    pub file_name: String,
    /// Size in bytes at resolution time.
    pub size: u64,
}

/// Resolves client paths against a fixed base upload directory.
#[derive(Debug, Clone)]
pub struct PathResolver {
    base: PathBuf,
}

impl PathResolver {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Resolve `raw` (percent-encoded twice by the admin tool) to a readable
    /// file inside `merchant`'s directory.
    ///
    /// # Errors
    ///
    /// - [`SiteError::InvalidArgument`] for an empty path or a directory.
    /// - [`SiteError::InvalidPath`] if either decoding pass fails.
    /// - [`SiteError::Forbidden`] if the path does not name the merchant's
    ///   directory or resolves outside it.
    /// - [`SiteError::NotFound`] if nothing exists at the resolved path.
    pub fn resolve(&self, merchant: &MerchantId, raw: &str) -> Result<ResolvedFile, SiteError> {
        if raw.is_empty() {
            return Err(SiteError::InvalidArgument {
                reason: "file path must not be empty".to_owned(),
            });
        }

        let decoded = decode_twice(raw)?;
        debug!(raw, decoded = %decoded, "file path decoded");

        let dir_name = merchant.dir_name();
        if !decoded.contains(&dir_name) {
            return Err(SiteError::Forbidden {
                reason: format!("path must reference the merchant directory '{dir_name}'"),
            });
        }

        let base = absolute_clean(&self.base)?;
        let candidate = absolute_clean(&anchor(&base, Path::new(&decoded)))?;

        if !candidate.starts_with(&base) {
            warn!(merchant = %merchant, path = %decoded, "path escapes the upload directory");
            return Err(SiteError::Forbidden {
                reason: "path resolves outside the upload directory".to_owned(),
            });
        }

        let merchant_dir = base.join(&dir_name);
        if !candidate.starts_with(&merchant_dir) {
            warn!(merchant = %merchant, path = %decoded, "path escapes the merchant directory");
            return Err(SiteError::Forbidden {
                reason: format!("path resolves outside '{dir_name}'"),
            });
        }

        let metadata = fs::metadata(&candidate).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => SiteError::NotFound {
                what: format!("file '{decoded}'"),
            },
            _ => SiteError::io(&candidate, e),
        })?;

        if metadata.is_dir() {
            return Err(SiteError::InvalidArgument {
                reason: format!("'{decoded}' is a directory, not a file"),
            });
        }

        // Symlinks inside the tree must not lead out of it.
        let real = fs::canonicalize(&candidate).map_err(|e| SiteError::io(&candidate, e))?;
        let real_dir = fs::canonicalize(&merchant_dir).map_err(|e| SiteError::io(&merchant_dir, e))?;
        if !real.starts_with(&real_dir) {
            warn!(merchant = %merchant, path = %decoded, "symlink escapes the merchant directory");
            return Err(SiteError::Forbidden {
                reason: format!("path resolves outside '{dir_name}'"),
            });
        }

        let file_name = candidate
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(ResolvedFile {
            path: candidate,
            display_path: decoded,
            file_name,
            size: metadata.len(),
        })
    }
}

/// Join a decoded path onto the base directory. A path that already starts
/// with the base directory's own name (`www/merchant_1/...`) is taken as rooted
/// at the base. An absolute path already under `base` is kept; any other
/// absolute path loses its root and is joined onto the base like a relative
/// one, so `/merchant_1/...` lands in `{base}/merchant_1/...`.
fn anchor(base: &Path, decoded: &Path) -> PathBuf {
    if decoded.is_absolute() {
        if clean(decoded).starts_with(base) {
            return decoded.to_path_buf();
        }
        let relative: PathBuf = decoded
            .components()
            .filter(|c| !matches!(c, Component::Prefix(_) | Component::RootDir))
            .collect();
        return anchor(base, &relative);
    }

    let mut components = decoded.components();
    let mut first = components.next();
    while matches!(first, Some(Component::CurDir)) {
        first = components.next();
    }

    match (first, base.file_name()) {
        (Some(Component::Normal(head)), Some(name)) if head == name => {
            base.join(components.as_path())
        }
        _ => base.join(decoded),
    }
}

/// Percent-decode exactly twice, the way a query string is unescaped.
///
/// # Errors
///
/// Returns [`SiteError::InvalidPath`] if either pass meets a malformed escape
/// or produces invalid UTF-8, or if the result contains a NUL byte.
pub fn decode_twice(raw: &str) -> Result<String, SiteError> {
    let first = query_unescape(raw, "first")?;
    let second = query_unescape(&first, "second")?;

    if second.contains('\0') {
        return Err(SiteError::InvalidPath {
            reason: "null bytes are not allowed in paths".to_owned(),
        });
    }
    Ok(second)
}

fn query_unescape(input: &str, pass: &str) -> Result<String, SiteError> {
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let well_formed = bytes
                .get(i + 1..i + 3)
                .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
            if !well_formed {
                return Err(SiteError::InvalidPath {
                    reason: format!("{pass} decoding pass failed: malformed escape at byte {i}"),
                });
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    let plus_as_space = input.replace('+', " ");
    urlencoding::decode(&plus_as_space)
        .map(std::borrow::Cow::into_owned)
        .map_err(|e| SiteError::InvalidPath {
            reason: format!("{pass} decoding pass failed: {e}"),
        })
}

/// Absolute form of `path` with `.` and `..` folded away, without touching
/// the filesystem.
fn absolute_clean(path: &Path) -> Result<PathBuf, SiteError> {
    let absolute = std::path::absolute(path).map_err(|e| SiteError::io(path, e))?;
    Ok(clean(&absolute))
}

fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::Normal(_) => {
                out.push(component.as_os_str());
            }
            Component::CurDir => {}
            Component::ParentDir => {
                // `..` at the root stays at the root.
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                }
            }
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn encode(s: &str) -> String {
        urlencoding::encode(s).into_owned()
    }

    fn setup() -> (tempfile::TempDir, PathResolver, MerchantId) {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path().join("www");
        for id in ["1000", "2000"] {
            let data = base.join(format!("merchant_{id}")).join("data");
            fs::create_dir_all(&data).unwrap();
            fs::write(data.join("domains.json"), format!("{{\"id\":\"{id}\"}}")).unwrap();
        }
        let resolver = PathResolver::new(base);
        (tmp, resolver, MerchantId::parse("1000").unwrap())
    }

    fn expected(resolver: &PathResolver) -> PathBuf {
        resolver.base().join("merchant_1000/data/domains.json")
    }

    #[test]
    fn resolves_double_encoded_rooted_path() {
        let (_tmp, resolver, merchant) = setup();
        let raw = encode(&encode("www/merchant_1000/data/domains.json"));
        assert!(raw.contains("%252F"));

        let file = resolver.resolve(&merchant, &raw).unwrap();
        assert_eq!(file.path, expected(&resolver));
        assert_eq!(file.display_path, "www/merchant_1000/data/domains.json");
        assert_eq!(file.file_name, "domains.json");
        assert_eq!(file.size, 13);
    }

    #[test]
    fn resolves_path_relative_to_base() {
        let (_tmp, resolver, merchant) = setup();
        let file = resolver.resolve(&merchant, "merchant_1000/data/domains.json").unwrap();
        assert_eq!(file.path, expected(&resolver));
    }

    #[test]
    fn leading_slash_is_joined_onto_base() {
        let (_tmp, resolver, merchant) = setup();
        for raw in ["/merchant_1000/data/domains.json", "/www/merchant_1000/data/domains.json"] {
            let file = resolver.resolve(&merchant, raw).unwrap();
            assert_eq!(file.path, expected(&resolver));
        }
    }

    #[test]
    fn leading_slash_cannot_climb_out_of_base() {
        let (_tmp, resolver, merchant) = setup();
        let result = resolver.resolve(&merchant, "/../merchant_1000/data/domains.json");
        assert!(matches!(result, Err(SiteError::Forbidden { .. })));
    }

    #[test]
    fn plain_path_survives_both_passes() {
        let (_tmp, resolver, merchant) = setup();
        let file = resolver
            .resolve(&merchant, "www/merchant_1000/./data/domains.json")
            .unwrap();
        assert_eq!(file.path, expected(&resolver));
    }

    #[test]
    fn absolute_path_inside_merchant_dir_is_accepted() {
        let (_tmp, resolver, merchant) = setup();
        let absolute = expected(&resolver);
        let file = resolver
            .resolve(&merchant, &encode(&absolute.to_string_lossy()))
            .unwrap();
        assert_eq!(file.path, absolute);
    }

    #[test]
    fn path_without_merchant_dir_is_forbidden() {
        let (_tmp, resolver, merchant) = setup();
        for raw in ["www/merchant_2000/data/domains.json", "data/domains.json", "../../etc/passwd"] {
            let result = resolver.resolve(&merchant, &encode(&encode(raw)));
            assert!(
                matches!(result, Err(SiteError::Forbidden { .. })),
                "expected {raw} to be forbidden"
            );
        }
    }

    #[test]
    fn traversal_out_of_base_is_forbidden() {
        let (_tmp, resolver, merchant) = setup();
        let raw = encode(&encode("merchant_1000/../../../../etc/passwd"));
        let result = resolver.resolve(&merchant, &raw);
        assert!(matches!(result, Err(SiteError::Forbidden { .. })));
    }

    #[test]
    fn traversal_into_sibling_merchant_is_forbidden() {
        let (_tmp, resolver, merchant) = setup();
        for raw in [
            "www/merchant_1000/../merchant_2000/data/domains.json",
            "www/merchant_10000/data/domains.json",
        ] {
            let result = resolver.resolve(&merchant, raw);
            assert!(
                matches!(result, Err(SiteError::Forbidden { .. })),
                "expected {raw} to be forbidden"
            );
        }
    }

    #[test]
    fn missing_file_is_not_found() {
        let (_tmp, resolver, merchant) = setup();
        let result = resolver.resolve(&merchant, "www/merchant_1000/data/nope.json");
        assert!(matches!(result, Err(SiteError::NotFound { .. })));
    }

    #[test]
    fn directory_is_invalid_argument() {
        let (_tmp, resolver, merchant) = setup();
        let result = resolver.resolve(&merchant, "www/merchant_1000/data");
        assert!(matches!(result, Err(SiteError::InvalidArgument { .. })));
    }

    #[test]
    fn malformed_escape_is_invalid_path() {
        let (_tmp, resolver, merchant) = setup();
        for raw in ["merchant_1000%zz", "merchant_1000%2", "merchant_1000%25zz"] {
            let result = resolver.resolve(&merchant, raw);
            assert!(
                matches!(result, Err(SiteError::InvalidPath { .. })),
                "expected {raw} to fail decoding"
            );
        }
    }

    #[test]
    fn empty_path_is_invalid_argument() {
        let (_tmp, resolver, merchant) = setup();
        let result = resolver.resolve(&merchant, "");
        assert!(matches!(result, Err(SiteError::InvalidArgument { .. })));
    }

    #[test]
    fn decode_twice_treats_plus_as_space() {
        assert_eq!(decode_twice("a+b%2520c").unwrap(), "a b c");
    }

    #[cfg(unix)]
    #[test]
    fn symlink_out_of_merchant_dir_is_forbidden() {
        let (tmp, resolver, merchant) = setup();
        let secret = tmp.path().join("secret.txt");
        fs::write(&secret, "top secret").unwrap();
        std::os::unix::fs::symlink(&secret, resolver.base().join("merchant_1000/data/link.txt"))
            .unwrap();

        let result = resolver.resolve(&merchant, "www/merchant_1000/data/link.txt");
        assert!(matches!(result, Err(SiteError::Forbidden { .. })));
    }

    #[test]
    fn clean_folds_dots() {
        assert_eq!(clean(Path::new("/a/./b/../c")), PathBuf::from("/a/c"));
        assert_eq!(clean(Path::new("/../../x")), PathBuf::from("/x"));
    }
}
