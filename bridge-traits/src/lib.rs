//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the note platform core and
//! platform-specific implementations. Each trait represents a capability the
//! core requires but that must be implemented differently per platform
//! (desktop, mobile, headless test harness).
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations with retry and TLS
//! - [`FileSystemAccess`](storage::FileSystemAccess) - Document-tree file I/O
//!   for the folder sync backend
//! - [`SettingsStore`](storage::SettingsStore) - Key-value preferences storage
//! - [`NetworkMonitor`](network::NetworkMonitor) - Connectivity and metered
//!   network detection
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Platform
//! implementations should convert platform-specific errors to `BridgeError`
//! and provide actionable messages (file paths, HTTP status, network state).
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds to support safe concurrent
//! usage across async tasks.

pub mod error;
pub mod http;
pub mod network;
pub mod storage;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use network::{NetworkInfo, NetworkMonitor, NetworkStatus, NetworkType};
pub use storage::{FileEntry, FileMetadata, FileSystemAccess, SettingsStore};
