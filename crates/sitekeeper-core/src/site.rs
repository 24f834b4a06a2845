//! Site manager: the entry point the HTTP layer calls.
//!
//! Owns the configured [`SiteLayout`], validates request arguments, takes the
//! per-merchant lock for every mutating operation, and runs the synchronous
//! filesystem work on Tokio's blocking pool.

use std::path::PathBuf;

use serde::Serialize;
use tracing::info;

use crate::domains::{self, DomainsDocument};
use crate::error::SiteError;
use crate::listing::{self, FileEntry, MerchantEntry};
use crate::lock::MerchantLocks;
use crate::merchant::MerchantId;
use crate::provision;
use crate::reconfigure;
use crate::resolve::PathResolver;
use crate::substitute::{
    DEFAULT_HOST, DEFAULT_PORT, HTTP_SCHEME, LEGACY_HOST_IP, SiteAddress, SubstitutionRules,
    rematched_token,
};
use crate::upload::{self, Upload, UploadedFile};

/// Largest file the content reader returns unless configured otherwise.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

/// Where merchant sites live and what they are seeded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteLayout {
    /// Base upload directory holding every `merchant_{id}/`.
    pub base_dir: PathBuf,
    /// Template tree with `html/`, `data/`, `static/`.
    pub template_dir: PathBuf,
}

impl SiteLayout {
    pub fn new(base_dir: impl Into<PathBuf>, template_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            template_dir: template_dir.into(),
        }
    }

    pub fn merchant_dir(&self, merchant: &MerchantId) -> PathBuf {
        merchant.dir_in(&self.base_dir)
    }
}

/// A freshly provisioned site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedSite {
    pub merchant_id: String,
    pub directory: String,
    pub url: String,
    pub domain: String,
    pub port: String,
    pub files_written: usize,
}

/// A site re-pointed to a new domain and port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconfiguredSite {
    pub merchant_id: String,
    pub domain: String,
    pub port: String,
    pub protocol: String,
    pub files_processed: usize,
}

/// Contents of one merchant file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileContent {
    pub file_name: String,
    pub file_path: String,
    pub size: u64,
    pub content: String,
}

/// Files of one merchant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantFiles {
    pub merchant_id: String,
    pub file_count: usize,
    pub files: Vec<FileEntry>,
}

/// Provisions, reconfigures, and inspects merchant sites under one layout.
#[derive(Debug)]
pub struct SiteManager {
    layout: SiteLayout,
    resolver: PathResolver,
    locks: MerchantLocks,
    max_file_bytes: u64,
}

impl SiteManager {
    pub fn new(layout: SiteLayout) -> Self {
        Self {
            resolver: PathResolver::new(layout.base_dir.clone()),
            layout,
            locks: MerchantLocks::new(),
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
        }
    }

    /// Cap the size of files returned by [`read_file`](Self::read_file) and
    /// accepted by the upload operations.
    #[must_use]
    pub fn with_max_file_bytes(mut self, max_file_bytes: u64) -> Self {
        self.max_file_bytes = max_file_bytes;
        self
    }

    pub fn max_file_bytes(&self) -> u64 {
        self.max_file_bytes
    }

    /// Provision a new site for `merchant` from the template.
    ///
    /// # Errors
    ///
    /// [`SiteError::InvalidArgument`] for a bad domain or port or a merchant
    /// id containing a template token, and anything [`provision::provision`]
    /// returns.
    pub async fn create(
        &self,
        merchant: &MerchantId,
        address: SiteAddress,
    ) -> Result<CreatedSite, SiteError> {
        if let Some(token) = rematched_token(merchant.as_str(), &[]) {
            return Err(SiteError::InvalidArgument {
                reason: format!("merchant id '{merchant}' contains the template token '{token}'"),
            });
        }
        validate_address(&address)?;
        let guard = self.locks.acquire(merchant).await?;

        let template = self.layout.template_dir.clone();
        let dest = self.layout.merchant_dir(merchant);
        let rules = SubstitutionRules::for_provisioning(merchant, &address);
        let id = merchant.clone();
        let report = blocking(move || {
            let _guard = guard;
            provision::provision(&template, &dest, &id, &rules)
        })
        .await?;

        Ok(CreatedSite {
            merchant_id: merchant.to_string(),
            directory: merchant.dir_name(),
            url: address.index_url(merchant),
            domain: address.domain,
            port: address.port,
            files_written: report.files_written,
        })
    }

    /// Re-point an existing site to `address`.
    ///
    /// # Errors
    ///
    /// [`SiteError::InvalidArgument`] for an empty or malformed domain or
    /// port, and anything [`reconfigure::reconfigure`] returns.
    pub async fn reconfigure(
        &self,
        merchant: &MerchantId,
        address: SiteAddress,
    ) -> Result<ReconfiguredSite, SiteError> {
        validate_address(&address)?;
        let guard = self.locks.acquire(merchant).await?;

        let root = self.layout.merchant_dir(merchant);
        let rules = SubstitutionRules::for_reconfiguration(&address);
        let report = blocking(move || {
            let _guard = guard;
            reconfigure::reconfigure(&root, &rules)
        })
        .await?;

        info!(
            merchant = %merchant,
            domain = %address.domain,
            port = %address.port,
            files_changed = report.files_changed,
            "merchant re-pointed"
        );

        Ok(ReconfiguredSite {
            merchant_id: merchant.to_string(),
            domain: address.domain,
            port: address.port,
            protocol: address.protocol,
            files_processed: report.files_changed,
        })
    }

    /// Read one file of `merchant` named by a client-supplied, double-encoded
    /// path.
    ///
    /// # Errors
    ///
    /// Anything [`PathResolver::resolve`] returns;
    /// [`SiteError::InvalidArgument`] if the file exceeds the size cap.
    pub async fn read_file(
        &self,
        merchant: &MerchantId,
        raw_path: &str,
    ) -> Result<FileContent, SiteError> {
        let resolver = self.resolver.clone();
        let id = merchant.clone();
        let raw = raw_path.to_owned();
        let max = self.max_file_bytes;

        blocking(move || {
            let file = resolver.resolve(&id, &raw)?;
            if file.size > max {
                return Err(SiteError::InvalidArgument {
                    reason: format!("file is {} bytes, limit is {max}", file.size),
                });
            }
            let bytes = std::fs::read(&file.path).map_err(|e| SiteError::io(&file.path, e))?;
            Ok(FileContent {
                file_name: file.file_name,
                file_path: file.display_path,
                size: file.size,
                content: String::from_utf8_lossy(&bytes).into_owned(),
            })
        })
        .await
    }

    /// Every provisioned merchant.
    ///
    /// # Errors
    ///
    /// Returns [`SiteError::Io`] if the base directory cannot be read.
    pub async fn list_merchants(&self) -> Result<Vec<MerchantEntry>, SiteError> {
        let base = self.layout.base_dir.clone();
        blocking(move || listing::list_merchants(&base)).await
    }

    /// Every file of `merchant`.
    ///
    /// # Errors
    ///
    /// Returns [`SiteError::NotFound`] for an unknown merchant.
    pub async fn list_files(&self, merchant: &MerchantId) -> Result<MerchantFiles, SiteError> {
        let base = self.layout.base_dir.clone();
        let id = merchant.clone();
        let files = blocking(move || listing::list_files(&base, &id)).await?;
        Ok(MerchantFiles {
            merchant_id: merchant.to_string(),
            file_count: files.len(),
            files,
        })
    }

    /// The merchant's `domains.json`.
    ///
    /// # Errors
    ///
    /// See [`domains::read_domains`].
    pub async fn domains(&self, merchant: &MerchantId) -> Result<DomainsDocument, SiteError> {
        let root = self.layout.merchant_dir(merchant);
        blocking(move || domains::read_domains(&root)).await
    }

    /// Replace the merchant's `domains.json` and return what was written.
    ///
    /// # Errors
    ///
    /// See [`domains::write_domains`].
    pub async fn replace_domains(
        &self,
        merchant: &MerchantId,
        doc: DomainsDocument,
    ) -> Result<DomainsDocument, SiteError> {
        let guard = self.locks.acquire(merchant).await?;
        let root = self.layout.merchant_dir(merchant);
        blocking(move || {
            let _guard = guard;
            domains::write_domains(&root, &doc).map(|()| doc)
        })
        .await
    }

    /// Store an uploaded image in the merchant's site root.
    ///
    /// # Errors
    ///
    /// See [`upload::save_image`].
    pub async fn upload_image(
        &self,
        merchant: &MerchantId,
        file_name: String,
        content_type: String,
        bytes: Vec<u8>,
    ) -> Result<UploadedFile, SiteError> {
        let guard = self.locks.acquire(merchant).await?;
        let root = self.layout.merchant_dir(merchant);
        let id = merchant.clone();
        let max = self.max_file_bytes;
        let saved = blocking(move || {
            let _guard = guard;
            let upload = Upload {
                file_name: &file_name,
                content_type: &content_type,
                bytes: &bytes,
            };
            upload::save_image(&root, &id, upload, max)
        })
        .await?;

        info!(merchant = %merchant, file = %saved.filename, size = saved.size, "image uploaded");
        Ok(saved)
    }

    /// Replace the merchant's `domains.json` with an uploaded file.
    ///
    /// # Errors
    ///
    /// See [`upload::save_domains`].
    pub async fn upload_domains(
        &self,
        merchant: &MerchantId,
        file_name: String,
        content_type: String,
        bytes: Vec<u8>,
    ) -> Result<UploadedFile, SiteError> {
        let guard = self.locks.acquire(merchant).await?;
        let root = self.layout.merchant_dir(merchant);
        let id = merchant.clone();
        let max = self.max_file_bytes;
        let saved = blocking(move || {
            let _guard = guard;
            let upload = Upload {
                file_name: &file_name,
                content_type: &content_type,
                bytes: &bytes,
            };
            upload::save_domains(&root, &id, upload, max)
        })
        .await?;

        info!(merchant = %merchant, size = saved.size, "domains.json uploaded");
        Ok(saved)
    }
}

fn validate_address(address: &SiteAddress) -> Result<(), SiteError> {
    if address.domain.is_empty() {
        return Err(SiteError::InvalidArgument {
            reason: "domain must not be empty".to_owned(),
        });
    }
    if address
        .domain
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || c == '/')
    {
        return Err(SiteError::InvalidArgument {
            reason: format!("invalid domain '{}'", address.domain),
        });
    }

    if address.port.is_empty() {
        return Err(SiteError::InvalidArgument {
            reason: "port must not be empty".to_owned(),
        });
    }
    if !matches!(address.port.parse::<u16>(), Ok(port) if port > 0) {
        return Err(SiteError::InvalidArgument {
            reason: format!("invalid port '{}'", address.port),
        });
    }

    // Literal matching would pick these values up again on the next pass.
    let scheme = format!("{}://", address.protocol);
    for (field, value, identities) in [
        ("domain", address.domain.as_str(), &[DEFAULT_HOST, LEGACY_HOST_IP][..]),
        ("port", address.port.as_str(), &[DEFAULT_PORT][..]),
        ("protocol", scheme.as_str(), &[HTTP_SCHEME][..]),
    ] {
        if let Some(token) = rematched_token(value, identities) {
            return Err(SiteError::InvalidArgument {
                reason: format!("{field} '{value}' contains the template token '{token}'"),
            });
        }
    }
    Ok(())
}

/// Run synchronous filesystem work on the blocking pool.
///
/// Merchant guards are moved into `work` so the lock is held until the
/// filesystem work finishes, even if the caller's future is dropped.
async fn blocking<T, F>(work: F) -> Result<T, SiteError>
where
    F: FnOnce() -> Result<T, SiteError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| SiteError::Task {
            reason: format!("blocking task panicked: {e}"),
        })?
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;

    use super::*;

    fn id(raw: &str) -> MerchantId {
        MerchantId::parse(raw).unwrap()
    }

    fn address(domain: &str, port: &str) -> SiteAddress {
        SiteAddress::new(domain, port, "https")
    }

    fn manager(root: &Path) -> SiteManager {
        let template = root.join("template");
        fs::create_dir_all(template.join("html")).unwrap();
        fs::create_dir_all(template.join("data")).unwrap();
        fs::write(
            template.join("html/merchant_MERCHANT_ID_index.html"),
            "<script src=\"http://localhost:8080/MERCHANT_ID.js\"></script>",
        )
        .unwrap();
        fs::write(
            template.join("data/domains.json"),
            r#"{"main": "localhost:8080"}"#,
        )
        .unwrap();
        SiteManager::new(SiteLayout::new(root.join("www"), template))
    }

    #[tokio::test]
    async fn create_then_reconfigure_twice() {
        let tmp = tempfile::tempdir().unwrap();
        let sites = manager(tmp.path());
        let merchant = id("1000");

        let created = sites.create(&merchant, address("localhost", "8080")).await.unwrap();
        assert_eq!(created.directory, "merchant_1000");
        assert_eq!(
            created.url,
            "https://localhost:8080/merchant_1000/html/merchant_1000_index.html"
        );
        assert_eq!(created.files_written, 2);

        let first = sites
            .reconfigure(&merchant, address("shop.example.com", "9443"))
            .await
            .unwrap();
        assert_eq!(first.files_processed, 2);
        assert_eq!(first.protocol, "https");

        let second = sites
            .reconfigure(&merchant, address("shop.example.com", "9443"))
            .await
            .unwrap();
        assert_eq!(second.files_processed, 0);

        let doc = sites.domains(&merchant).await.unwrap();
        assert_eq!(doc["main"], "shop.example.com:9443");
    }

    #[tokio::test]
    async fn concurrent_creates_for_same_merchant_succeed_once() {
        let tmp = tempfile::tempdir().unwrap();
        let sites = Arc::new(manager(tmp.path()));

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let sites = Arc::clone(&sites);
                tokio::spawn(async move { sites.create(&id("1000"), address("localhost", "8080")).await })
            })
            .collect();

        let mut ok = 0;
        let mut exists = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => ok += 1,
                Err(SiteError::AlreadyExists { .. }) => exists += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!((ok, exists), (1, 3));
    }

    #[tokio::test]
    async fn reconfigure_requires_domain_and_port() {
        let tmp = tempfile::tempdir().unwrap();
        let sites = manager(tmp.path());
        let merchant = id("1000");
        sites.create(&merchant, address("localhost", "8080")).await.unwrap();

        for (domain, port) in [("", "443"), ("shop.example.com", ""), ("a b", "443"), ("x", "http")] {
            let result = sites.reconfigure(&merchant, address(domain, port)).await;
            assert!(
                matches!(result, Err(SiteError::InvalidArgument { .. })),
                "expected ({domain:?}, {port:?}) to be rejected"
            );
        }
    }

    #[tokio::test]
    async fn values_containing_template_tokens_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let sites = manager(tmp.path());
        let merchant = id("1000");
        sites.create(&merchant, address("localhost", "8080")).await.unwrap();

        for (domain, port) in [
            ("shop.example.com", "18080"),
            ("localhost.example.com", "443"),
            ("cdn8080.example.com", "443"),
            ("16.163.193.740", "443"),
        ] {
            let result = sites.reconfigure(&merchant, address(domain, port)).await;
            assert!(
                matches!(result, Err(SiteError::InvalidArgument { .. })),
                "expected ({domain:?}, {port:?}) to be rejected"
            );
        }

        let result = sites.create(&id("shop8080"), address("localhost", "8080")).await;
        assert!(matches!(result, Err(SiteError::InvalidArgument { .. })));
        assert!(!tmp.path().join("www/merchant_shop8080").exists());
    }

    #[tokio::test]
    async fn reconfigure_is_idempotent_for_accepted_values() {
        let tmp = tempfile::tempdir().unwrap();
        let sites = manager(tmp.path());
        let merchant = id("1000");
        sites.create(&merchant, address("localhost", "8080")).await.unwrap();

        for (domain, port) in [("localhost", "8080"), ("16.163.193.74", "8443"), ("shop.example.com", "9443")] {
            sites.reconfigure(&merchant, address(domain, port)).await.unwrap();
            let again = sites.reconfigure(&merchant, address(domain, port)).await.unwrap();
            assert_eq!(again.files_processed, 0, "({domain}, {port}) was not stable");
        }
    }

    #[tokio::test]
    async fn uploads_go_through_the_manager() {
        let tmp = tempfile::tempdir().unwrap();
        let sites = manager(tmp.path()).with_max_file_bytes(64);
        let merchant = id("1000");
        sites.create(&merchant, address("localhost", "8080")).await.unwrap();

        let image = sites
            .upload_image(&merchant, "logo.webp".to_owned(), "image/webp".to_owned(), vec![1; 8])
            .await
            .unwrap();
        assert_eq!(image.url.as_deref(), Some("/merchant_1000/logo.webp"));

        let too_big = sites
            .upload_image(&merchant, "big.png".to_owned(), "image/png".to_owned(), vec![0; 65])
            .await;
        assert!(matches!(too_big, Err(SiteError::InvalidArgument { .. })));

        sites
            .upload_domains(
                &merchant,
                "domains.json".to_owned(),
                "application/json".to_owned(),
                br#"{"main":"shop.example.com"}"#.to_vec(),
            )
            .await
            .unwrap();
        let doc = sites.domains(&merchant).await.unwrap();
        assert_eq!(doc["main"], "shop.example.com");
    }

    #[tokio::test]
    async fn reconfigure_unknown_merchant_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let sites = manager(tmp.path());
        let result = sites.reconfigure(&id("404"), address("a.example.com", "443")).await;
        assert!(matches!(result, Err(SiteError::NotFound { .. })));
    }

    #[tokio::test]
    async fn read_file_returns_content() {
        let tmp = tempfile::tempdir().unwrap();
        let sites = manager(tmp.path());
        let merchant = id("1000");
        sites.create(&merchant, address("shop.example.com", "443")).await.unwrap();

        let file = sites
            .read_file(&merchant, "www%252Fmerchant_1000%252Fdata%252Fdomains.json")
            .await
            .unwrap();
        assert_eq!(file.file_name, "domains.json");
        assert_eq!(file.file_path, "www/merchant_1000/data/domains.json");
        assert_eq!(file.content, r#"{"main": "shop.example.com:443"}"#);
        assert_eq!(file.size, file.content.len() as u64);
    }

    #[tokio::test]
    async fn read_file_enforces_size_cap() {
        let tmp = tempfile::tempdir().unwrap();
        let sites = manager(tmp.path()).with_max_file_bytes(4);
        let merchant = id("1000");
        sites.create(&merchant, address("shop.example.com", "443")).await.unwrap();

        let result = sites
            .read_file(&merchant, "www/merchant_1000/data/domains.json")
            .await;
        assert!(matches!(result, Err(SiteError::InvalidArgument { .. })));
    }

    #[tokio::test]
    async fn lists_merchants_and_files() {
        let tmp = tempfile::tempdir().unwrap();
        let sites = manager(tmp.path());
        sites.create(&id("1000"), address("localhost", "8080")).await.unwrap();
        sites.create(&id("2000"), address("localhost", "8080")).await.unwrap();

        let merchants = sites.list_merchants().await.unwrap();
        assert_eq!(merchants.len(), 2);

        let files = sites.list_files(&id("1000")).await.unwrap();
        assert_eq!(files.file_count, 2);
        assert!(
            files
                .files
                .iter()
                .any(|f| f.url == "/merchant_1000/html/merchant_1000_index.html")
        );
    }

    #[tokio::test]
    async fn replace_domains_round_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let sites = manager(tmp.path());
        let merchant = id("1000");
        sites.create(&merchant, address("localhost", "8080")).await.unwrap();

        let mut doc = DomainsDocument::new();
        doc.insert("main".to_owned(), serde_json::json!("new.example.com"));
        let written = sites.replace_domains(&merchant, doc.clone()).await.unwrap();
        assert_eq!(written, doc);
        assert_eq!(sites.domains(&merchant).await.unwrap(), doc);
    }
}
