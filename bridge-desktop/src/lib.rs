//! # Desktop Bridges
//!
//! The bridge-trait implementations a desktop host (macOS, Windows, Linux)
//! injects into the core: `reqwest` behind `HttpClient`, `tokio::fs` behind
//! `FileSystemAccess`, a small SQLite table behind `SettingsStore`, and a
//! TCP reachability probe behind `NetworkMonitor`.
//!
//! ```ignore
//! use bridge_desktop::{ReqwestHttpClient, TokioFileSystem};
//!
//! let http_client = ReqwestHttpClient::new();
//! let fs = TokioFileSystem::new();
//! // hand both to CoreConfig::builder()
//! ```

mod filesystem;
mod http;
mod network;
mod settings;

pub use filesystem::TokioFileSystem;
pub use http::ReqwestHttpClient;
pub use network::DesktopNetworkMonitor;
pub use settings::SqliteSettingsStore;
