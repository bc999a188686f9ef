//! # Nextcloud Provider
//!
//! Sync backend for servers running the Nextcloud Notes app.
//!
//! ## Components
//!
//! - **Connector**: the [`SyncBackend`](core_sync::SyncBackend)
//!   implementation over the platform HTTP bridge
//! - **Types**: Notes API v1 wire structs and the comment-encoded sort key
//!   helpers
//! - **Error**: transport and protocol errors, converting into the sync
//!   layer's error type

pub mod connector;
pub mod error;
pub mod types;

pub use connector::{settings_keys, NextcloudBackend, NextcloudConfig};
pub use error::{NextcloudError, Result};
