//! # Sync Backend Abstraction
//!
//! Defines the contract every note backend implements: push a single note
//! (create, update, delete) and pull the full remote listing. Concrete
//! implementations live in the provider crates; this module only fixes the
//! seam between them and the sync engine.

use crate::error::{Result, SyncError};
use async_trait::async_trait;
use core_notes::{IdMapping, Note, NoteId, Provider};
use serde::{Deserialize, Serialize};

/// A full note as the backend holds it, returned by [`SyncBackend::get_all`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteNote {
    /// Opaque remote identity. Stringified numeric id for server backends,
    /// storage URI for the filesystem backend.
    pub id: String,

    /// Remote title.
    pub title: String,

    /// Remote body content, already stripped of transport markers.
    pub content: String,

    /// Whether the remote content is markdown.
    pub is_markdown: bool,

    /// Remote notebook assignment, if the backend carries one.
    pub notebook_id: Option<i64>,

    /// Manual sort position, if the backend carries one.
    pub sort_key: Option<i64>,

    /// Last remote modification (epoch seconds).
    pub last_modified: i64,

    /// Provider-specific concurrency token, e.g. an ETag.
    pub extras: Option<String>,
}

impl RemoteNote {
    /// Project down to the metadata the reconciler works with.
    pub fn meta(&self) -> RemoteNoteMetaData {
        RemoteNoteMetaData {
            id: self.id.clone(),
            title: self.title.clone(),
            last_modified: self.last_modified,
        }
    }
}

/// The slice of remote state the reconciler compares against local notes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteNoteMetaData {
    /// Opaque remote identity, empty when no remote counterpart exists.
    pub id: String,

    /// Remote title.
    pub title: String,

    /// Last remote modification (epoch seconds).
    pub last_modified: i64,
}

impl RemoteNoteMetaData {
    /// Metadata shell for an action whose remote side is gone or not yet
    /// created. Carries the empty identity.
    pub fn absent() -> Self {
        Self::default()
    }
}

/// What a backend hands back after creating a remote note.
///
/// Carries everything needed to build the id mapping and to align the local
/// modification timestamp with the server's view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteHandle {
    /// Server-assigned numeric id (server backends).
    pub remote_note_id: Option<i64>,

    /// Backing file URI (filesystem backend).
    pub storage_uri: Option<String>,

    /// Concurrency token for the freshly created note.
    pub extras: Option<String>,

    /// Modification timestamp the backend recorded (epoch seconds).
    pub last_modified: i64,
}

impl RemoteHandle {
    /// Build the id mapping row this handle represents.
    pub fn into_mapping(self, local_note_id: NoteId, provider: Provider) -> IdMapping {
        IdMapping {
            id: core_notes::MappingId(0),
            local_note_id,
            remote_note_id: self.remote_note_id,
            provider,
            extras: self.extras,
            is_deleted_locally: false,
            storage_uri: self.storage_uri,
            is_being_updated: false,
        }
    }
}

/// Outcome of a backend configuration check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendValidation {
    /// The backend is reachable and compatible.
    Ok,
    /// The server answered but speaks an unsupported protocol version.
    IncompatibleServer { found: String, minimum: String },
    /// The backend could not be reached or is misconfigured.
    Unreachable { reason: String },
}

/// A note backend the sync engine can push to and pull from.
///
/// Implementations must be safe to share across tasks; the dispatcher calls
/// them from spawned workers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SyncBackend: Send + Sync {
    /// Which provider this backend serves.
    fn kind(&self) -> Provider;

    /// Create a remote counterpart for a local note.
    async fn create_note(&self, note: &Note) -> Result<RemoteHandle>;

    /// Overwrite the remote counterpart with the local note's state.
    ///
    /// Returns the mapping with refreshed identity and concurrency token.
    async fn update_note(&self, note: &Note, mapping: &IdMapping) -> Result<IdMapping>;

    /// Delete the remote counterpart. Returns `false` when the remote note
    /// was already gone.
    async fn delete_note(&self, mapping: &IdMapping) -> Result<bool>;

    /// Fetch the complete remote listing.
    async fn get_all(&self) -> Result<Vec<RemoteNote>>;

    /// Cheap reachability probe. `Ok(())` means the backend will likely
    /// accept operations right now.
    async fn check_connection(&self) -> Result<()>;

    /// Full configuration check, used when the user sets the backend up.
    async fn validate(&self) -> Result<BackendValidation>;
}

/// Placeholder backend for providers that are declared but not built yet.
///
/// Every operation fails with [`SyncError::NotImplemented`].
pub struct UnimplementedBackend {
    provider: Provider,
}

impl UnimplementedBackend {
    pub fn new(provider: Provider) -> Self {
        Self { provider }
    }

    fn unimplemented<T>(&self) -> Result<T> {
        Err(SyncError::NotImplemented {
            provider: self.provider,
        })
    }
}

#[async_trait]
impl SyncBackend for UnimplementedBackend {
    fn kind(&self) -> Provider {
        self.provider
    }

    async fn create_note(&self, _note: &Note) -> Result<RemoteHandle> {
        self.unimplemented()
    }

    async fn update_note(&self, _note: &Note, _mapping: &IdMapping) -> Result<IdMapping> {
        self.unimplemented()
    }

    async fn delete_note(&self, _mapping: &IdMapping) -> Result<bool> {
        self.unimplemented()
    }

    async fn get_all(&self) -> Result<Vec<RemoteNote>> {
        self.unimplemented()
    }

    async fn check_connection(&self) -> Result<()> {
        self.unimplemented()
    }

    async fn validate(&self) -> Result<BackendValidation> {
        self.unimplemented()
    }
}
