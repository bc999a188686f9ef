//! # Folder Provider
//!
//! Sync backend that mirrors notes into a user-chosen folder, one `.md` or
//! `.txt` file per note.
//!
//! ## Components
//!
//! - **Backend**: the [`SyncBackend`](core_sync::SyncBackend)
//!   implementation over the platform filesystem bridge
//! - **Filename**: title sanitization and collision handling
//! - **Error**: filesystem errors converting into the sync layer's error
//!   type

pub mod backend;
pub mod error;
pub mod filename;

pub use backend::{settings_keys, FileStorageBackend};
pub use error::{FileStorageError, Result};
