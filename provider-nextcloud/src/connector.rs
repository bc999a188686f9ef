//! # Nextcloud Notes Connector
//!
//! Implements [`SyncBackend`] over the Nextcloud Notes API v1: JSON over
//! HTTPS at `index.php/apps/notes/api/v1/`, HTTP Basic auth on every
//! request, optimistic concurrency via `If-Match` entity tags on update.
//!
//! Server compatibility is checked against the capability document at
//! `ocs/v2.php/cloud/capabilities`, which lists the Notes API versions the
//! server speaks.

use crate::error::{NextcloudError, Result};
use crate::types::{
    append_sort_marker, split_sort_marker, NextcloudNote, NoteUpsert, OcsEnvelope,
};
use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use bridge_traits::storage::SettingsStore;
use core_notes::{tasks, IdMapping, Note, Provider};
use core_sync::{BackendValidation, RemoteHandle, RemoteNote, SyncBackend};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Lowest Notes API major version this connector can talk to.
const MIN_API_MAJOR: u32 = 1;

const NOTES_PATH: &str = "index.php/apps/notes/api/v1/notes";
const CAPABILITIES_PATH: &str = "ocs/v2.php/cloud/capabilities";

/// Settings keys this backend is configured from.
pub mod settings_keys {
    pub const URL: &str = "nextcloud.url";
    pub const USERNAME: &str = "nextcloud.username";
    pub const PASSWORD: &str = "nextcloud.password";
    /// Consumed by the HTTP bridge when the client is built, not here.
    pub const TRUST_SELF_SIGNED: &str = "nextcloud.trust_self_signed";
}

/// Connection parameters for one Nextcloud server.
#[derive(Debug, Clone)]
pub struct NextcloudConfig {
    /// Server root, e.g. `https://cloud.example.com`.
    pub base_url: String,
    pub username: String,
    pub password: String,
}

impl NextcloudConfig {
    /// Load connection parameters from the settings surface.
    pub async fn from_settings(settings: &dyn SettingsStore) -> Result<Self> {
        async fn required(
            settings: &dyn SettingsStore,
            key: &'static str,
        ) -> Result<String> {
            settings
                .get_string(key)
                .await
                .map_err(NextcloudError::Http)?
                .filter(|v| !v.trim().is_empty())
                .ok_or(NextcloudError::MissingSetting(key))
        }

        Ok(Self {
            base_url: required(settings, settings_keys::URL).await?,
            username: required(settings, settings_keys::USERNAME).await?,
            password: required(settings, settings_keys::PASSWORD).await?,
        })
    }
}

/// Nextcloud Notes API backend.
pub struct NextcloudBackend {
    http: Arc<dyn HttpClient>,
    config: NextcloudConfig,
}

impl NextcloudBackend {
    pub fn new(http: Arc<dyn HttpClient>, config: NextcloudConfig) -> Self {
        Self { http, config }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn note_url(&self, remote_id: i64) -> String {
        format!("{}/{}", self.url(NOTES_PATH), remote_id)
    }

    fn request(&self, method: HttpMethod, url: String) -> HttpRequest {
        HttpRequest::new(method, url)
            .basic_auth(&self.config.username, &self.config.password)
            .header("Accept", "application/json")
    }

    async fn send(&self, request: HttpRequest, operation: &str) -> Result<bridge_traits::http::HttpResponse> {
        let response = self.http.execute(request).await?;
        if !response.is_success() {
            warn!(status = response.status, operation, "Server rejected request");
            return Err(NextcloudError::Status {
                status: response.status,
                operation: operation.to_string(),
            });
        }
        Ok(response)
    }

    /// Compose the outgoing wire body: rendered checklist plus the
    /// comment-encoded sort key.
    fn upsert_payload(note: &Note) -> NoteUpsert {
        let body = tasks::render_body(&note.content, &note.tasks.0);
        NoteUpsert {
            title: note.display_title().to_string(),
            content: append_sort_marker(&body, note.sort_key),
            category: note
                .notebook_id
                .map(|id| id.to_string())
                .unwrap_or_default(),
            modified: note.modified_date,
        }
    }

    fn to_remote(wire: NextcloudNote) -> RemoteNote {
        let (content, sort_key) = split_sort_marker(&wire.content);
        RemoteNote {
            id: wire.id.to_string(),
            title: wire.title,
            content,
            is_markdown: true,
            notebook_id: if wire.category.is_empty() {
                None
            } else {
                wire.category.parse().ok()
            },
            sort_key,
            last_modified: wire.modified,
            extras: wire.etag,
        }
    }

    async fn fetch_api_versions(&self) -> Result<Vec<String>> {
        let request = self
            .request(HttpMethod::Get, self.url(CAPABILITIES_PATH))
            .header("OCS-APIRequest", "true");

        let response = self.send(request, "capabilities").await?;
        let envelope: OcsEnvelope = response
            .json()
            .map_err(|e| NextcloudError::MalformedResponse(e.to_string()))?;

        Ok(envelope
            .ocs
            .data
            .capabilities
            .notes
            .map(|notes| notes.api_version)
            .unwrap_or_default())
    }
}

fn version_major(version: &str) -> Option<u32> {
    version.split('.').next()?.parse().ok()
}

#[async_trait]
impl SyncBackend for NextcloudBackend {
    fn kind(&self) -> Provider {
        Provider::Nextcloud
    }

    #[instrument(skip(self, note), fields(note_id = %note.id))]
    async fn create_note(&self, note: &Note) -> core_sync::Result<RemoteHandle> {
        let request = self
            .request(HttpMethod::Post, self.url(NOTES_PATH))
            .json(&Self::upsert_payload(note))
            .map_err(NextcloudError::Http)?;

        let response = self.send(request, "create note").await?;
        let created: NextcloudNote = response
            .json()
            .map_err(|e| NextcloudError::MalformedResponse(e.to_string()))?;

        debug!(remote_id = created.id, "Created remote note");
        Ok(RemoteHandle {
            remote_note_id: Some(created.id),
            storage_uri: None,
            extras: created.etag,
            last_modified: created.modified,
        })
    }

    #[instrument(skip(self, note, mapping), fields(note_id = %note.id))]
    async fn update_note(
        &self,
        note: &Note,
        mapping: &IdMapping,
    ) -> core_sync::Result<IdMapping> {
        let remote_id = mapping
            .remote_note_id
            .ok_or(NextcloudError::MissingRemoteId)?;

        let mut request = self
            .request(HttpMethod::Put, self.note_url(remote_id))
            .json(&Self::upsert_payload(note))
            .map_err(NextcloudError::Http)?;
        if let Some(etag) = &mapping.extras {
            request = request.if_match(etag);
        }

        let response = self.send(request, "update note").await?;
        let updated: NextcloudNote = response
            .json()
            .map_err(|e| NextcloudError::MalformedResponse(e.to_string()))?;

        let mut refreshed = mapping.clone();
        refreshed.remote_note_id = Some(updated.id);
        refreshed.extras = updated.etag;
        Ok(refreshed)
    }

    #[instrument(skip(self, mapping), fields(note_id = %mapping.local_note_id))]
    async fn delete_note(&self, mapping: &IdMapping) -> core_sync::Result<bool> {
        let Some(remote_id) = mapping.remote_note_id else {
            return Ok(false);
        };

        let request = self.request(HttpMethod::Delete, self.note_url(remote_id));
        let response = self.http.execute(request).await.map_err(NextcloudError::Http)?;

        if response.status == 404 {
            debug!(remote_id, "Remote note already gone");
            return Ok(false);
        }
        if !response.is_success() {
            return Err(NextcloudError::Status {
                status: response.status,
                operation: "delete note".to_string(),
            }
            .into());
        }
        Ok(true)
    }

    async fn get_all(&self) -> core_sync::Result<Vec<RemoteNote>> {
        let request = self.request(HttpMethod::Get, self.url(NOTES_PATH));
        let response = self.send(request, "list notes").await?;
        let notes: Vec<NextcloudNote> = response
            .json()
            .map_err(|e| NextcloudError::MalformedResponse(e.to_string()))?;

        debug!(count = notes.len(), "Fetched remote listing");
        Ok(notes.into_iter().map(Self::to_remote).collect())
    }

    async fn check_connection(&self) -> core_sync::Result<()> {
        self.fetch_api_versions().await?;
        Ok(())
    }

    async fn validate(&self) -> core_sync::Result<BackendValidation> {
        let versions = match self.fetch_api_versions().await {
            Ok(versions) => versions,
            Err(e) => {
                return Ok(BackendValidation::Unreachable {
                    reason: e.to_string(),
                })
            }
        };

        let compatible = versions
            .iter()
            .filter_map(|v| version_major(v))
            .any(|major| major >= MIN_API_MAJOR);

        if compatible {
            Ok(BackendValidation::Ok)
        } else {
            Ok(BackendValidation::IncompatibleServer {
                found: if versions.is_empty() {
                    "none".to_string()
                } else {
                    versions.join(", ")
                },
                minimum: format!("{MIN_API_MAJOR}.0"),
            })
        }
    }
}
