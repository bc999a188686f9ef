//! # Folder Backend
//!
//! Implements [`SyncBackend`] over a user-granted storage folder, one file
//! per note. The remote identity of a note is the path of its backing file,
//! which changes when the title (hence the filename) changes.
//!
//! Listing covers the root folder plus one level of subdirectories; entries
//! with a dot-prefixed name are skipped, and only `.md`/`.txt` files count
//! as notes.

use crate::error::{FileStorageError, Result};
use crate::filename::{file_name, file_name_with_suffix, is_note_file};
use async_trait::async_trait;
use bridge_traits::storage::{FileEntry, FileSystemAccess, SettingsStore};
use bytes::Bytes;
use core_notes::{tasks, IdMapping, Note, Provider};
use core_sync::{BackendValidation, RemoteHandle, RemoteNote, SyncBackend};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Settings keys this backend is configured from.
pub mod settings_keys {
    pub const ROOT: &str = "file_storage.root";
    /// Preferred extension for newly created notes, read by the app layer.
    pub const MARKDOWN: &str = "file_storage.markdown";
}

/// Sync backend writing notes into a folder tree.
pub struct FileStorageBackend {
    fs: Arc<dyn FileSystemAccess>,
    root: PathBuf,
}

impl FileStorageBackend {
    pub fn new(fs: Arc<dyn FileSystemAccess>, root: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            root: root.into(),
        }
    }

    /// Build a backend rooted at the folder named in the settings surface.
    pub async fn from_settings(
        fs: Arc<dyn FileSystemAccess>,
        settings: &dyn SettingsStore,
    ) -> Result<Self> {
        let root = settings
            .get_string(settings_keys::ROOT)
            .await?
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                FileStorageError::RootUnusable("no storage folder configured".to_string())
            })?;
        Ok(Self::new(fs, root))
    }

    async fn ensure_root(&self) -> Result<()> {
        if !self.fs.exists(&self.root).await? {
            return Err(FileStorageError::RootUnusable(format!(
                "'{}' does not exist",
                self.root.display()
            )));
        }
        let meta = self.fs.metadata(&self.root).await?;
        if !meta.is_directory {
            return Err(FileStorageError::RootUnusable(format!(
                "'{}' is not a directory",
                self.root.display()
            )));
        }
        Ok(())
    }

    /// First non-colliding path for a note file in `dir`.
    async fn unique_path(&self, dir: &Path, note: &Note) -> Result<PathBuf> {
        let candidate = dir.join(file_name(&note.title, note.is_markdown));
        if !self.fs.exists(&candidate).await? {
            return Ok(candidate);
        }

        let mut counter = 2;
        loop {
            let candidate =
                dir.join(file_name_with_suffix(&note.title, note.is_markdown, counter));
            if !self.fs.exists(&candidate).await? {
                return Ok(candidate);
            }
            counter += 1;
        }
    }

    fn render(note: &Note) -> Bytes {
        Bytes::from(tasks::render_body(&note.content, &note.tasks.0))
    }

    async fn modified_at(&self, path: &Path) -> Result<i64> {
        let meta = self.fs.metadata(path).await?;
        Ok(meta
            .modified_at
            .unwrap_or_else(|| chrono::Utc::now().timestamp()))
    }

    async fn read_remote(&self, entry: &FileEntry) -> Result<RemoteNote> {
        let content = self.fs.read_file(&entry.path).await?;
        let name = entry.name();
        let is_markdown = name.to_ascii_lowercase().ends_with(".md");
        let title = entry
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(RemoteNote {
            id: entry.path.to_string_lossy().into_owned(),
            title,
            content: String::from_utf8_lossy(&content).into_owned(),
            is_markdown,
            notebook_id: None,
            sort_key: None,
            last_modified: entry.metadata.modified_at.unwrap_or(0),
            extras: None,
        })
    }
}

#[async_trait]
impl SyncBackend for FileStorageBackend {
    fn kind(&self) -> Provider {
        Provider::FileStorage
    }

    #[instrument(skip(self, note), fields(note_id = %note.id))]
    async fn create_note(&self, note: &Note) -> core_sync::Result<RemoteHandle> {
        self.ensure_root().await?;

        let path = self.unique_path(&self.root, note).await?;
        self.fs
            .write_file(&path, Self::render(note))
            .await
            .map_err(FileStorageError::Io)?;

        let last_modified = self.modified_at(&path).await?;
        debug!(path = %path.display(), "Created note file");

        Ok(RemoteHandle {
            remote_note_id: None,
            storage_uri: Some(path.to_string_lossy().into_owned()),
            extras: None,
            last_modified,
        })
    }

    #[instrument(skip(self, note, mapping), fields(note_id = %note.id))]
    async fn update_note(
        &self,
        note: &Note,
        mapping: &IdMapping,
    ) -> core_sync::Result<IdMapping> {
        let uri = mapping
            .storage_uri
            .as_deref()
            .ok_or(FileStorageError::MissingStorageUri)?;
        let current = PathBuf::from(uri);

        let desired = file_name(&note.title, note.is_markdown);
        let path = if current.file_name().map(|n| n.to_string_lossy().into_owned())
            != Some(desired)
        {
            // Title changed, so the backing file has to move.
            let dir = current
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| self.root.clone());
            let target = self.unique_path(&dir, note).await?;
            self.fs
                .rename(&current, &target)
                .await
                .map_err(FileStorageError::Io)?;
            debug!(from = %current.display(), to = %target.display(), "Renamed note file");
            target
        } else {
            current
        };

        self.fs
            .write_file(&path, Self::render(note))
            .await
            .map_err(FileStorageError::Io)?;

        let mut refreshed = mapping.clone();
        refreshed.storage_uri = Some(path.to_string_lossy().into_owned());
        Ok(refreshed)
    }

    #[instrument(skip(self, mapping), fields(note_id = %mapping.local_note_id))]
    async fn delete_note(&self, mapping: &IdMapping) -> core_sync::Result<bool> {
        let Some(uri) = mapping.storage_uri.as_deref() else {
            return Ok(false);
        };
        let path = PathBuf::from(uri);

        if !self.fs.exists(&path).await.map_err(FileStorageError::Io)? {
            debug!(path = %path.display(), "Note file already gone");
            return Ok(false);
        }

        self.fs
            .delete_file(&path)
            .await
            .map_err(FileStorageError::Io)?;
        Ok(true)
    }

    async fn get_all(&self) -> core_sync::Result<Vec<RemoteNote>> {
        self.ensure_root().await?;

        let mut notes = Vec::new();
        let entries = self
            .fs
            .list_directory(&self.root)
            .await
            .map_err(FileStorageError::Io)?;

        for entry in entries {
            let name = entry.name();
            if name.starts_with('.') {
                continue;
            }

            if entry.metadata.is_directory {
                // One level of subdirectories, nothing deeper.
                let children = self
                    .fs
                    .list_directory(&entry.path)
                    .await
                    .map_err(FileStorageError::Io)?;
                for child in children {
                    if !child.metadata.is_directory && is_note_file(&child.name()) {
                        notes.push(self.read_remote(&child).await?);
                    }
                }
            } else if is_note_file(&name) {
                notes.push(self.read_remote(&entry).await?);
            }
        }

        debug!(count = notes.len(), "Listed note files");
        Ok(notes)
    }

    async fn check_connection(&self) -> core_sync::Result<()> {
        self.ensure_root().await?;
        Ok(())
    }

    async fn validate(&self) -> core_sync::Result<BackendValidation> {
        match self.ensure_root().await {
            Ok(()) => Ok(BackendValidation::Ok),
            Err(e) => {
                warn!(error = %e, "Storage root validation failed");
                Ok(BackendValidation::Unreachable {
                    reason: e.to_string(),
                })
            }
        }
    }
}
