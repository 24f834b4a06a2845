//! Shared application state for `SiteKeeper` server.
//!
//! A single [`AppState`] is constructed at startup and shared across all
//! Axum handlers via `Arc`.

use std::path::PathBuf;

use sitekeeper_core::site::SiteManager;

use crate::config::ServerConfig;

/// Shared application state passed to all HTTP handlers.
#[derive(Debug)]
pub struct AppState {
    /// Provisioning, reconfiguration, and file access.
    pub sites: SiteManager,
    /// Scheme written into provisioned and re-pointed sites.
    pub protocol: String,
    /// Static admin frontend served under `/admin`.
    pub admin_dir: PathBuf,
}

impl AppState {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            sites: SiteManager::new(config.layout()).with_max_file_bytes(config.max_file_bytes),
            protocol: config.protocol.clone(),
            admin_dir: config.admin_dir.clone(),
        }
    }
}
