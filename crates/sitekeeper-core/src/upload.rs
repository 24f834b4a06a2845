//! Files uploaded into a merchant site: images into the site root and a
//! replacement `data/domains.json`.
//!
//! Both checks run before anything touches the disk, so a rejected upload
//! leaves the site as it was.

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::domains::{self, DOMAINS_FILE, DomainsDocument};
use crate::error::SiteError;
use crate::merchant::{MERCHANT_SUBDIRS, MerchantId};
use crate::provision::write_file;

/// Media types accepted by [`save_image`].
pub const ALLOWED_IMAGE_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/gif", "image/webp"];

/// Media type accepted by [`save_domains`] without a `.json` file name.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// One stored upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub merchant_id: String,
    pub filename: String,
    pub size: u64,
    /// Public URL, for files served from the site root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A client-supplied part, already read into memory.
#[derive(Debug, Clone, Copy)]
pub struct Upload<'a> {
    pub file_name: &'a str,
    pub content_type: &'a str,
    pub bytes: &'a [u8],
}

/// Store an image in the merchant's site root under the base name of its
/// client file name, replacing any file of that name.
///
/// The merchant directory and its standard subdirectories are created when
/// missing.
///
/// # Errors
///
/// - [`SiteError::InvalidArgument`] for a disallowed media type, a file
///   larger than `max_bytes`, or a file name with no usable base name.
/// - [`SiteError::Io`] if a directory or the file cannot be written.
pub fn save_image(
    merchant_root: &Path,
    merchant: &MerchantId,
    upload: Upload<'_>,
    max_bytes: u64,
) -> Result<UploadedFile, SiteError> {
    let media_type = media_type(upload.content_type);
    if !ALLOWED_IMAGE_TYPES.contains(&media_type.as_str()) {
        return Err(SiteError::InvalidArgument {
            reason: format!(
                "file type '{}' is not allowed, allowed types: {}",
                upload.content_type,
                ALLOWED_IMAGE_TYPES.join(",")
            ),
        });
    }
    let size = check_size(upload.bytes, max_bytes)?;
    let filename = base_name(upload.file_name)?;

    for sub in MERCHANT_SUBDIRS {
        let dir = merchant_root.join(sub);
        fs::create_dir_all(&dir).map_err(|e| SiteError::io(&dir, e))?;
    }
    write_file(&merchant_root.join(&filename), upload.bytes)?;

    Ok(UploadedFile {
        merchant_id: merchant.to_string(),
        url: Some(format!("/{}/{filename}", merchant.dir_name())),
        filename,
        size,
    })
}

/// Replace the merchant's `domains.json` with an uploaded file, stored byte
/// for byte.
///
/// The part must be declared `application/json` or carry a `.json` name, and
/// its content must be a JSON object.
///
/// # Errors
///
/// - [`SiteError::NotFound`] if the merchant directory does not exist.
/// - [`SiteError::InvalidArgument`] for a non-JSON part, content that is not
///   a JSON object, or a file larger than `max_bytes`.
/// - [`SiteError::Io`] if `data/` or the file cannot be written.
pub fn save_domains(
    merchant_root: &Path,
    merchant: &MerchantId,
    upload: Upload<'_>,
    max_bytes: u64,
) -> Result<UploadedFile, SiteError> {
    if !merchant_root.is_dir() {
        return Err(SiteError::NotFound {
            what: format!("merchant '{merchant}'"),
        });
    }
    if media_type(upload.content_type) != JSON_CONTENT_TYPE
        && !upload.file_name.to_ascii_lowercase().ends_with(".json")
    {
        return Err(SiteError::InvalidArgument {
            reason: "only JSON files can be uploaded as domains.json".to_owned(),
        });
    }
    let size = check_size(upload.bytes, max_bytes)?;
    serde_json::from_slice::<DomainsDocument>(upload.bytes).map_err(|e| {
        SiteError::InvalidArgument {
            reason: format!("invalid JSON: {e}"),
        }
    })?;

    let path = domains::domains_path(merchant_root);
    if let Some(data) = path.parent() {
        fs::create_dir_all(data).map_err(|e| SiteError::io(data, e))?;
    }
    write_file(&path, upload.bytes)?;

    Ok(UploadedFile {
        merchant_id: merchant.to_string(),
        filename: DOMAINS_FILE.to_owned(),
        size,
        url: None,
    })
}

/// `image/png; charset=binary` → `image/png`.
fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn check_size(bytes: &[u8], max_bytes: u64) -> Result<u64, SiteError> {
    let size = bytes.len() as u64;
    if size > max_bytes {
        return Err(SiteError::InvalidArgument {
            reason: format!("file is {size} bytes, limit is {max_bytes}"),
        });
    }
    Ok(size)
}

/// Last segment of a client file name, with either separator.
fn base_name(raw: &str) -> Result<String, SiteError> {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    if name.is_empty() || name == "." || name == ".." || name.chars().any(char::is_control) {
        return Err(SiteError::InvalidArgument {
            reason: format!("invalid file name '{raw}'"),
        });
    }
    Ok(name.to_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake";

    fn id(raw: &str) -> MerchantId {
        MerchantId::parse(raw).unwrap()
    }

    fn upload<'a>(file_name: &'a str, content_type: &'a str, bytes: &'a [u8]) -> Upload<'a> {
        Upload {
            file_name,
            content_type,
            bytes,
        }
    }

    #[test]
    fn image_lands_in_site_root_with_base_name() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("merchant_1000");

        let saved = save_image(&root, &id("1000"), upload("C:\\pics/logo.png", "image/png", PNG), 1024)
            .unwrap();

        assert_eq!(saved.filename, "logo.png");
        assert_eq!(saved.size, PNG.len() as u64);
        assert_eq!(saved.url.as_deref(), Some("/merchant_1000/logo.png"));
        assert_eq!(fs::read(root.join("logo.png")).unwrap(), PNG);
        for sub in MERCHANT_SUBDIRS {
            assert!(root.join(sub).is_dir(), "{sub} missing");
        }
    }

    #[test]
    fn image_media_type_parameters_are_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("merchant_1000");
        let result = save_image(&root, &id("1000"), upload("a.gif", "Image/GIF; q=1", PNG), 1024);
        assert!(result.is_ok());
    }

    #[test]
    fn rejected_image_touches_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("merchant_1000");

        for (name, content_type, max) in [
            ("a.svg", "image/svg+xml", 1024),
            ("a.png", "image/png", 4),
            ("uploads/..", "image/png", 1024),
            ("", "image/png", 1024),
        ] {
            let result = save_image(&root, &id("1000"), upload(name, content_type, PNG), max);
            assert!(
                matches!(result, Err(SiteError::InvalidArgument { .. })),
                "expected {name:?} ({content_type}) to be rejected"
            );
        }
        assert!(!root.exists());
    }

    #[test]
    fn domains_upload_is_stored_verbatim() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("merchant_1000");
        fs::create_dir_all(&root).unwrap();
        let body = br#"{"main":"shop.example.com"}"#;

        let saved = save_domains(&root, &id("1000"), upload("d.txt", "application/json", body), 1024)
            .unwrap();

        assert_eq!(saved.filename, "domains.json");
        assert_eq!(saved.url, None);
        assert_eq!(fs::read(domains::domains_path(&root)).unwrap(), body);
    }

    #[test]
    fn invalid_domains_upload_keeps_existing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("merchant_1000");
        fs::create_dir_all(root.join("data")).unwrap();
        fs::write(domains::domains_path(&root), r#"{"main":"old.example.com"}"#).unwrap();

        for (name, content_type, body) in [
            ("domains.json", "text/plain", &b"{not json"[..]),
            ("domains.json", "application/octet-stream", b"[1, 2]"),
            ("domains.txt", "text/plain", b"{}"),
        ] {
            let result = save_domains(&root, &id("1000"), upload(name, content_type, body), 1024);
            assert!(matches!(result, Err(SiteError::InvalidArgument { .. })));
        }

        let kept = fs::read_to_string(domains::domains_path(&root)).unwrap();
        assert!(kept.contains("old.example.com"));
    }

    #[test]
    fn domains_upload_requires_merchant() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("merchant_9");
        let result = save_domains(&root, &id("9"), upload("domains.json", "application/json", b"{}"), 1024);
        assert!(matches!(result, Err(SiteError::NotFound { .. })));
        assert!(!root.exists());
    }
}
