//! Server configuration for `SiteKeeper`.
//!
//! Loads configuration from environment variables with sensible defaults.
//! Values are read once at startup and passed down explicitly; nothing reads
//! the environment after that.

use std::net::SocketAddr;
use std::path::PathBuf;

use sitekeeper_core::site::{DEFAULT_MAX_FILE_BYTES, SiteLayout};
use sitekeeper_core::substitute::DEFAULT_PROTOCOL;

/// Default listen port of the admin API.
pub const DEFAULT_PORT: u16 = 4300;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to.
    pub bind_addr: SocketAddr,
    /// Base upload directory holding every `merchant_{id}/`.
    pub base_upload_dir: PathBuf,
    /// Template tree new merchant sites are seeded from.
    pub template_dir: PathBuf,
    /// Scheme written into provisioned and re-pointed sites.
    pub protocol: String,
    /// Log level filter (e.g., `info`, `debug`, `warn`).
    pub log_level: String,
    /// Largest file the file-content endpoint returns or an upload accepts.
    pub max_file_bytes: u64,
    /// Static admin frontend served under `/admin`.
    pub admin_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
            base_upload_dir: PathBuf::from("./www"),
            template_dir: PathBuf::from("generate_scripts/merchant_template"),
            protocol: DEFAULT_PROTOCOL.to_owned(),
            log_level: "info".to_owned(),
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            admin_dir: PathBuf::from("./admin_frontend"),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `PORT`: port to bind on (binds to `0.0.0.0`)
    /// - `SITEKEEPER_BIND_ADDR`: full bind address (overrides `PORT`, default: `127.0.0.1:4300`)
    /// - `BASE_UPLOAD_DIR`: base upload directory (default: `./www`)
    /// - `SITEKEEPER_TEMPLATE_DIR`: template root (default: `generate_scripts/merchant_template`)
    /// - `SITEKEEPER_PROTOCOL`: scheme for site URLs (default: `https`)
    /// - `SITEKEEPER_LOG_LEVEL`: log filter (default: `info`)
    /// - `SITEKEEPER_MAX_FILE_BYTES`: file-content and upload size cap (default: 10 MiB)
    /// - `SITEKEEPER_ADMIN_DIR`: static admin frontend (default: `./admin_frontend`)
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source. Empty values
    /// count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let defaults = Self::default();

        // Priority: SITEKEEPER_BIND_ADDR > PORT > default 127.0.0.1:4300
        let bind_addr = if let Some(addr) = var("SITEKEEPER_BIND_ADDR") {
            addr.parse().unwrap_or(defaults.bind_addr)
        } else if let Some(port_str) = var("PORT") {
            let port: u16 = port_str.parse().unwrap_or(DEFAULT_PORT);
            SocketAddr::from(([0, 0, 0, 0], port))
        } else {
            defaults.bind_addr
        };

        let base_upload_dir = var("BASE_UPLOAD_DIR")
            .map_or(defaults.base_upload_dir, PathBuf::from);

        let template_dir = var("SITEKEEPER_TEMPLATE_DIR")
            .map_or(defaults.template_dir, PathBuf::from);

        let protocol = var("SITEKEEPER_PROTOCOL")
            .map(|p| p.to_lowercase())
            .unwrap_or(defaults.protocol);

        let log_level = var("SITEKEEPER_LOG_LEVEL").unwrap_or(defaults.log_level);

        let max_file_bytes = var("SITEKEEPER_MAX_FILE_BYTES")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_file_bytes);

        let admin_dir = var("SITEKEEPER_ADMIN_DIR").map_or(defaults.admin_dir, PathBuf::from);

        Self {
            bind_addr,
            base_upload_dir,
            template_dir,
            protocol,
            log_level,
            max_file_bytes,
            admin_dir,
        }
    }

    /// Filesystem layout handed to the site manager.
    pub fn layout(&self) -> SiteLayout {
        SiteLayout::new(self.base_upload_dir.clone(), self.template_dir.clone())
    }
}
