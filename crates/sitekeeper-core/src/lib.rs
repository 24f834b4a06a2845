//! Core library for `SiteKeeper`.
//!
//! Contains the placeholder substitution engine, the template materializer
//! that provisions new merchant sites, the in-place reconfigurer that
//! re-points an existing site to a new domain or port, and the path resolver
//! that guards the file-content reader. [`upload`] stores images and
//! replacement `domains.json` files sent by the admin tool. [`site::SiteManager`] ties these to a
//! configured [`site::SiteLayout`] and serializes work per merchant.
//!
//! Everything below [`site`] is synchronous and touches only the local
//! filesystem. This crate knows nothing about HTTP.

pub mod domains;
pub mod error;
pub mod listing;
pub mod lock;
pub mod merchant;
pub mod provision;
pub mod reconfigure;
pub mod resolve;
pub mod site;
pub mod substitute;
pub mod upload;
