//! `SiteKeeper` HTTP server.
//!
//! Wires the `sitekeeper-core` site manager into an Axum admin API for
//! provisioning merchant sites, re-pointing them to a new domain and port,
//! and inspecting their files.

pub mod config;
pub mod error;
pub mod response;
pub mod routes;
pub mod state;
