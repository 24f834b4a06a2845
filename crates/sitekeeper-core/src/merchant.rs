//! Merchant identifiers.
//!
//! A [`MerchantId`] becomes a filesystem path segment (`merchant_{id}`), so
//! the character check in [`MerchantId::parse`] is the only thing standing
//! between a request parameter and path injection.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::SiteError;

/// Directory name prefix for every merchant site under the upload root.
pub const MERCHANT_DIR_PREFIX: &str = "merchant_";

/// Fixed subdirectories of every merchant site.
pub const MERCHANT_SUBDIRS: [&str; 4] = ["html", "static", "config", "data"];

/// A validated merchant identifier: non-empty, `[A-Za-z0-9_]` only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MerchantId(String);

impl MerchantId {
    /// Validate and wrap a raw identifier.
    ///
    /// # Errors
    ///
    /// Returns [`SiteError::InvalidArgument`] if the identifier is empty or
    /// contains anything other than ASCII letters, digits, and `_`.
    pub fn parse(raw: &str) -> Result<Self, SiteError> {
        if raw.is_empty() {
            return Err(SiteError::InvalidArgument {
                reason: "merchant id must not be empty".to_owned(),
            });
        }

        if !raw.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
            return Err(SiteError::InvalidArgument {
                reason: "merchant id may only contain letters, digits, and '_'".to_owned(),
            });
        }

        Ok(Self(raw.to_owned()))
    }

    /// The raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Directory name of this merchant's site, e.g. `merchant_1000`.
    pub fn dir_name(&self) -> String {
        format!("{MERCHANT_DIR_PREFIX}{}", self.0)
    }

    /// Absolute-or-relative path of this merchant's site under `base`.
    pub fn dir_in(&self, base: &Path) -> PathBuf {
        base.join(self.dir_name())
    }

    /// Name of the merchant's landing page, e.g. `merchant_1000_index.html`.
    pub fn index_file_name(&self) -> String {
        format!("{}_index.html", self.dir_name())
    }
}

impl fmt::Display for MerchantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for MerchantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
