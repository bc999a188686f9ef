//! Domain models for the note store
//!
//! This module contains rich domain models with validation and database mapping.

use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use std::fmt;

// =============================================================================
// ID Types
// =============================================================================

/// Unique identifier for a note, assigned by the local store on insertion.
///
/// A value of `0` means the note has not been persisted yet.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
    sqlx::Type,
)]
#[sqlx(transparent)]
pub struct NoteId(pub i64);

impl NoteId {
    /// Whether the note has been assigned a persistent id yet.
    pub fn is_assigned(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a sync id mapping row.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(transparent)]
pub struct MappingId(pub i64);

impl fmt::Display for MappingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Provider
// =============================================================================

/// Sync provider tag.
///
/// Identifies which backend a mapping row belongs to. `GoogleDrive` and
/// `OneDrive` are declared but have no working backend; operations on them
/// fail with a not-implemented error.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Disabled,
    Nextcloud,
    FileStorage,
    GoogleDrive,
    OneDrive,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Disabled => "disabled",
            Provider::Nextcloud => "nextcloud",
            Provider::FileStorage => "file_storage",
            Provider::GoogleDrive => "google_drive",
            Provider::OneDrive => "one_drive",
        }
    }

    /// Parse a provider tag from its settings representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "disabled" => Some(Provider::Disabled),
            "nextcloud" => Some(Provider::Nextcloud),
            "file_storage" => Some(Provider::FileStorage),
            "google_drive" => Some(Provider::GoogleDrive),
            "one_drive" => Some(Provider::OneDrive),
            _ => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Note
// =============================================================================

/// A single checklist entry inside a note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteTask {
    /// Task text.
    pub text: String,
    /// Whether the task is checked off.
    pub done: bool,
    /// Nesting depth, 0 for top-level tasks.
    pub indent: i64,
}

impl NoteTask {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            done: false,
            indent: 0,
        }
    }
}

/// The central note entity.
///
/// `modified_date` is epoch seconds and is the only signal the sync
/// subsystem uses to decide which side of a conflict wins. Every
/// content-affecting mutation must go through [`Note::touch`] (or set the
/// field explicitly) for reconciliation to stay correct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Note {
    /// Local id, 0 before insertion.
    pub id: NoteId,

    /// Note title.
    pub title: String,

    /// Body content, markdown or plain text per `is_markdown`.
    pub content: String,

    /// Whether `content` should be interpreted as markdown.
    pub is_markdown: bool,

    /// Ordered checklist tasks.
    pub tasks: Json<Vec<NoteTask>>,

    /// Attachment file references.
    pub attachments: Json<Vec<String>>,

    /// Tag names attached to this note.
    pub tags: Json<Vec<String>>,

    /// Owning notebook, if any.
    pub notebook_id: Option<i64>,

    /// User-defined manual sort position.
    pub sort_key: Option<i64>,

    pub is_pinned: bool,
    pub is_archived: bool,
    pub is_hidden: bool,

    /// Excludes the note from sync entirely.
    pub is_local_only: bool,

    /// Soft-delete (trash) state.
    pub is_deleted: bool,

    /// When the note was moved to trash (epoch seconds).
    pub deletion_date: Option<i64>,

    /// Creation timestamp (epoch seconds).
    pub created_date: i64,

    /// Last content-affecting mutation (epoch seconds).
    pub modified_date: i64,
}

impl Note {
    /// Create a new unsaved note with current timestamps.
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: NoteId(0),
            title: title.into(),
            content: content.into(),
            is_markdown: true,
            tasks: Json(Vec::new()),
            attachments: Json(Vec::new()),
            tags: Json(Vec::new()),
            notebook_id: None,
            sort_key: None,
            is_pinned: false,
            is_archived: false,
            is_hidden: false,
            is_local_only: false,
            is_deleted: false,
            deletion_date: None,
            created_date: now,
            modified_date: now,
        }
    }

    /// Bump `modified_date` to now. Call after any content mutation.
    pub fn touch(&mut self) {
        self.modified_date = chrono::Utc::now().timestamp();
    }

    /// Title for display, substituting a placeholder for blank titles.
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            "Untitled"
        } else {
            &self.title
        }
    }

    /// Whether this note participates in sync at all.
    pub fn is_syncable(&self) -> bool {
        !self.is_local_only && !self.is_deleted
    }

    /// Validate model invariants before persisting.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.title.len() > 1000 {
            return Err("Title exceeds maximum length of 1000 characters".to_string());
        }

        if self.modified_date < 0 {
            return Err("Modified date cannot be negative".to_string());
        }

        if self.is_deleted && self.deletion_date.is_none() {
            return Err("Trashed note must carry a deletion date".to_string());
        }

        Ok(())
    }
}

// =============================================================================
// IdMapping
// =============================================================================

/// Durable link between a local note and its remote representation for one
/// provider.
///
/// At most one mapping per (local note, provider) pair is meaningful for
/// reconciliation. The remote identity lives in `remote_note_id` for server
/// backends and in `storage_uri` for the filesystem backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct IdMapping {
    /// Store-assigned row id, 0 before insertion.
    pub id: MappingId,

    /// Owning local note.
    pub local_note_id: NoteId,

    /// Server-assigned numeric remote id (Nextcloud).
    pub remote_note_id: Option<i64>,

    /// Which backend this mapping belongs to.
    pub provider: Provider,

    /// Opaque provider-specific concurrency token, e.g. an ETag.
    pub extras: Option<String>,

    /// The local note was deleted; the remote copy still needs removal.
    pub is_deleted_locally: bool,

    /// Backing file URI (FileStorage).
    pub storage_uri: Option<String>,

    /// Set while a push for this mapping is in flight. Informational only.
    pub is_being_updated: bool,
}

impl IdMapping {
    /// Create a mapping for a note pushed to a Nextcloud server.
    pub fn new_nextcloud(local_note_id: NoteId, remote_note_id: i64, extras: Option<String>) -> Self {
        Self {
            id: MappingId(0),
            local_note_id,
            remote_note_id: Some(remote_note_id),
            provider: Provider::Nextcloud,
            extras,
            is_deleted_locally: false,
            storage_uri: None,
            is_being_updated: false,
        }
    }

    /// Create a mapping for a note written into a storage folder.
    pub fn new_file_storage(local_note_id: NoteId, storage_uri: impl Into<String>) -> Self {
        Self {
            id: MappingId(0),
            local_note_id,
            remote_note_id: None,
            provider: Provider::FileStorage,
            extras: None,
            is_deleted_locally: false,
            storage_uri: Some(storage_uri.into()),
            is_being_updated: false,
        }
    }

    /// The remote identity this mapping points at, as an opaque string.
    ///
    /// The key format is provider-dependent: stringified numeric id for
    /// Nextcloud, storage URI for FileStorage. Returns `None` when the
    /// identity field for the provider is unset.
    pub fn remote_identity(&self) -> Option<String> {
        match self.provider {
            Provider::FileStorage => self.storage_uri.clone(),
            _ => self.remote_note_id.map(|id| id.to_string()),
        }
    }

    /// Validate model invariants before persisting.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.local_note_id.is_assigned() {
            return Err("Mapping must reference a persisted local note".to_string());
        }

        if self.provider == Provider::Disabled {
            return Err("Mapping cannot belong to the disabled provider".to_string());
        }

        Ok(())
    }
}
