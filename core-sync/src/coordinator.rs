//! # Sync Coordinator
//!
//! Runs one full reconciliation cycle against a backend.
//!
//! ## Workflow
//!
//! 1. Probe backend availability (cached); abort the cycle when unreachable
//! 2. Pull the remote listing and snapshot the local syncable notes
//! 3. Diff both sides with the reconciler
//! 4. Apply the pull direction directly to the local store
//! 5. Hand the push direction to the dispatcher, which executes it
//!    asynchronously with debouncing and coalescing
//!
//! The cycle itself never talks to the backend for pushes; a slow or flaky
//! backend can therefore not stall the local side of a sync.

use crate::availability::{Availability, AvailabilityChecker};
use crate::backend::{RemoteNote, SyncBackend};
use crate::dispatcher::{RemoteActionDispatcher, RemoteOp};
use crate::error::{Result, SyncError};
use crate::reconciler::{reconcile, NoteAction};
use core_notes::repositories::{IdMappingRepository, NoteRepository};
use core_notes::{tasks, IdMapping, Json, Note, NoteId, Provider};
use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Counters describing one completed cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSummary {
    pub provider: Provider,
    /// Notes created locally from the backend.
    pub pulled_created: u64,
    /// Local notes overwritten from the backend.
    pub pulled_updated: u64,
    /// Local notes removed because the backend removed them.
    pub pulled_deleted: u64,
    /// Operations handed to the dispatcher.
    pub pushed: u64,
    /// Pull actions that could not be applied locally.
    pub failures: u64,
    pub duration_ms: u64,
}

/// Which direction a pull action took, for summary bookkeeping.
enum Pulled {
    Created,
    Updated,
    Deleted,
}

/// Executes reconciliation cycles for one backend.
pub struct SyncCoordinator {
    backend: Arc<dyn SyncBackend>,
    dispatcher: Arc<RemoteActionDispatcher>,
    notes: Arc<dyn NoteRepository>,
    mappings: Arc<dyn IdMappingRepository>,
    availability: Arc<AvailabilityChecker>,
    events: EventBus,
}

impl SyncCoordinator {
    pub fn new(
        backend: Arc<dyn SyncBackend>,
        dispatcher: Arc<RemoteActionDispatcher>,
        notes: Arc<dyn NoteRepository>,
        mappings: Arc<dyn IdMappingRepository>,
        availability: Arc<AvailabilityChecker>,
        events: EventBus,
    ) -> Self {
        Self {
            backend,
            dispatcher,
            notes,
            mappings,
            availability,
            events,
        }
    }

    /// Run one full reconciliation cycle.
    #[instrument(skip(self), fields(provider = %self.backend.kind()))]
    pub async fn run_cycle(&self) -> Result<SyncSummary> {
        let provider = self.backend.kind();

        if let Availability::Unavailable { reason } =
            self.availability.check(self.backend.as_ref()).await
        {
            warn!(%reason, "Skipping sync cycle, backend unavailable");
            let _ = self.events.emit(CoreEvent::Sync(SyncEvent::BackendUnavailable {
                provider: provider.to_string(),
                reason: reason.clone(),
            }));
            return Err(SyncError::Unavailable { reason });
        }

        let _ = self.events.emit(CoreEvent::Sync(SyncEvent::CycleStarted {
            provider: provider.to_string(),
        }));

        let started = Instant::now();
        match self.cycle_inner(provider, started).await {
            Ok(summary) => {
                info!(
                    pulled_created = summary.pulled_created,
                    pulled_updated = summary.pulled_updated,
                    pulled_deleted = summary.pulled_deleted,
                    pushed = summary.pushed,
                    failures = summary.failures,
                    duration_ms = summary.duration_ms,
                    "Sync cycle completed"
                );
                let _ = self.events.emit(CoreEvent::Sync(SyncEvent::CycleCompleted {
                    provider: provider.to_string(),
                    pulled_created: summary.pulled_created,
                    pulled_updated: summary.pulled_updated,
                    pulled_deleted: summary.pulled_deleted,
                    pushed: summary.pushed,
                    failures: summary.failures,
                    duration_ms: summary.duration_ms,
                }));
                Ok(summary)
            }
            Err(e) => {
                warn!(error = %e, "Sync cycle failed");
                let _ = self.events.emit(CoreEvent::Sync(SyncEvent::CycleFailed {
                    provider: provider.to_string(),
                    message: e.to_string(),
                    recoverable: true,
                }));
                Err(e)
            }
        }
    }

    async fn cycle_inner(&self, provider: Provider, started: Instant) -> Result<SyncSummary> {
        let remote_notes = self.backend.get_all().await?;
        let remote_meta: Vec<_> = remote_notes.iter().map(RemoteNote::meta).collect();
        let remote_by_id: HashMap<&str, &RemoteNote> =
            remote_notes.iter().map(|r| (r.id.as_str(), r)).collect();

        let local_notes = self.notes.list_syncable().await?;
        let mappings = self.mappings.get_all_by_provider(provider).await?;

        let outcome = reconcile(&local_notes, &remote_meta, &mappings, provider);
        debug!(
            local_updates = outcome.local_updates.len(),
            remote_updates = outcome.remote_updates.len(),
            "Reconciliation finished"
        );

        let mut summary = SyncSummary {
            provider,
            pulled_created: 0,
            pulled_updated: 0,
            pulled_deleted: 0,
            pushed: 0,
            failures: 0,
            duration_ms: 0,
        };

        // One undigestible note must not starve the rest of the cycle, so
        // each action fails on its own and only bumps the failure counter.
        for action in outcome.local_updates {
            let applied = match action {
                NoteAction::Create { note, meta } => {
                    let Some(remote) = remote_by_id.get(meta.id.as_str()) else {
                        continue;
                    };
                    self.pull_create(provider, note, remote)
                        .await
                        .map(|_| Pulled::Created)
                }
                NoteAction::Update { note, meta } => {
                    let Some(remote) = remote_by_id.get(meta.id.as_str()) else {
                        continue;
                    };
                    self.pull_update(provider, note, remote)
                        .await
                        .map(|_| Pulled::Updated)
                }
                NoteAction::Delete { note, .. } => self
                    .pull_delete(provider, note.id)
                    .await
                    .map(|_| Pulled::Deleted),
            };
            match applied {
                Ok(Pulled::Created) => summary.pulled_created += 1,
                Ok(Pulled::Updated) => summary.pulled_updated += 1,
                Ok(Pulled::Deleted) => summary.pulled_deleted += 1,
                Err(e) => {
                    warn!(error = %e, "Failed to apply pulled change, skipping note");
                    summary.failures += 1;
                }
            }
        }

        for action in outcome.remote_updates {
            let op = match &action {
                NoteAction::Create { .. } => RemoteOp::Create,
                NoteAction::Update { .. } => RemoteOp::Update,
                NoteAction::Delete { .. } => RemoteOp::Delete,
            };
            self.dispatcher.submit(action.note().id, op);
            summary.pushed += 1;
        }

        summary.duration_ms = started.elapsed().as_millis() as u64;
        Ok(summary)
    }

    /// Materialize a remote-only note in the local store.
    async fn pull_create(
        &self,
        provider: Provider,
        mut note: Note,
        remote: &RemoteNote,
    ) -> Result<()> {
        let (content, checklist) = tasks::parse_body(&remote.content);
        note.title = remote.title.clone();
        note.content = content;
        note.tasks = Json(checklist);
        note.is_markdown = remote.is_markdown;
        note.notebook_id = remote.notebook_id;
        note.sort_key = remote.sort_key;
        note.modified_date = remote.last_modified;

        let local_id = self.notes.insert(&note).await?;
        let mapping = mapping_for_remote(provider, local_id, remote)?;
        self.mappings.insert(&mapping).await?;

        debug!(note_id = %local_id, remote_id = %remote.id, "Pulled new note");
        Ok(())
    }

    /// Overwrite a local note with the newer remote state.
    async fn pull_update(
        &self,
        provider: Provider,
        mut note: Note,
        remote: &RemoteNote,
    ) -> Result<()> {
        let (content, checklist) = tasks::parse_body(&remote.content);
        note.title = remote.title.clone();
        note.content = content;
        note.tasks = Json(checklist);
        note.is_markdown = remote.is_markdown;
        note.notebook_id = remote.notebook_id;
        note.sort_key = remote.sort_key;
        note.modified_date = remote.last_modified;
        self.notes.update(&note).await?;

        // Refresh the concurrency token so the next push does not trip the
        // backend's conflict detection.
        if let Some(mut mapping) = self
            .mappings
            .get_by_local_id_and_provider(note.id, provider)
            .await?
        {
            mapping.extras = remote.extras.clone();
            self.mappings.update(&mapping).await?;
        }

        debug!(note_id = %note.id, remote_id = %remote.id, "Pulled note update");
        Ok(())
    }

    /// Mirror a remote deletion into the local store.
    async fn pull_delete(&self, provider: Provider, note_id: NoteId) -> Result<()> {
        self.notes.delete(&[note_id]).await?;
        if let Some(mapping) = self
            .mappings
            .get_by_local_id_and_provider(note_id, provider)
            .await?
        {
            self.mappings.delete_by_id(mapping.id).await?;
        }

        debug!(note_id = %note_id, "Mirrored remote deletion");
        Ok(())
    }
}

/// Build the mapping row for a note pulled from the backend.
fn mapping_for_remote(
    provider: Provider,
    local_note_id: NoteId,
    remote: &RemoteNote,
) -> Result<IdMapping> {
    match provider {
        Provider::FileStorage => Ok(IdMapping::new_file_storage(
            local_note_id,
            remote.id.clone(),
        )),
        Provider::Nextcloud => {
            let remote_id: i64 = remote.id.parse().map_err(|_| {
                SyncError::InvalidRemoteData(format!("non-numeric remote id '{}'", remote.id))
            })?;
            Ok(IdMapping::new_nextcloud(
                local_note_id,
                remote_id,
                remote.extras.clone(),
            ))
        }
        other => Err(SyncError::NotImplemented { provider: other }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockSyncBackend, RemoteHandle};
    use core_notes::db::create_test_pool;
    use core_notes::repositories::{SqliteIdMappingRepository, SqliteNoteRepository};
    use std::time::Duration;

    struct Fixture {
        notes: Arc<SqliteNoteRepository>,
        mappings: Arc<SqliteIdMappingRepository>,
        events: EventBus,
    }

    async fn fixture() -> Fixture {
        let pool = create_test_pool().await.unwrap();
        Fixture {
            notes: Arc::new(SqliteNoteRepository::new(pool.clone())),
            mappings: Arc::new(SqliteIdMappingRepository::new(pool)),
            events: EventBus::default(),
        }
    }

    fn coordinator(fx: &Fixture, backend: MockSyncBackend) -> SyncCoordinator {
        let backend: Arc<dyn SyncBackend> = Arc::new(backend);
        let availability = Arc::new(AvailabilityChecker::new(Duration::from_secs(30)));
        let dispatcher = Arc::new(RemoteActionDispatcher::new(
            backend.clone(),
            fx.notes.clone(),
            fx.mappings.clone(),
            availability.clone(),
            fx.events.clone(),
            Duration::from_millis(10),
        ));
        SyncCoordinator::new(
            backend,
            dispatcher,
            fx.notes.clone(),
            fx.mappings.clone(),
            availability,
            fx.events.clone(),
        )
    }

    fn reachable_backend() -> MockSyncBackend {
        let mut backend = MockSyncBackend::new();
        backend.expect_kind().return_const(Provider::Nextcloud);
        backend.expect_check_connection().returning(|| Ok(()));
        backend
    }

    fn remote(id: &str, title: &str, content: &str, modified: i64) -> RemoteNote {
        RemoteNote {
            id: id.to_string(),
            title: title.to_string(),
            content: content.to_string(),
            is_markdown: true,
            notebook_id: None,
            sort_key: None,
            last_modified: modified,
            extras: Some(format!("\"etag-{id}\"")),
        }
    }

    async fn wait_pushes(coordinator: &SyncCoordinator) {
        for _ in 0..500 {
            tokio::time::sleep(Duration::from_millis(5)).await;
            if coordinator.dispatcher.is_idle() {
                return;
            }
        }
        panic!("pushes did not finish in time");
    }

    #[tokio::test]
    async fn test_pull_creates_local_note_with_parsed_checklist() {
        let fx = fixture().await;

        let mut backend = reachable_backend();
        backend.expect_get_all().returning(|| {
            Ok(vec![remote(
                "5",
                "Groceries",
                "milk and eggs\n\n- [ ] milk\n- [x] eggs",
                400,
            )])
        });

        let coordinator = coordinator(&fx, backend);
        let summary = coordinator.run_cycle().await.unwrap();
        assert_eq!(summary.pulled_created, 1);
        assert_eq!(summary.pushed, 0);

        let notes = fx.notes.list_all().await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, "Groceries");
        assert_eq!(notes[0].content, "milk and eggs");
        assert_eq!(notes[0].tasks.0.len(), 2);
        assert!(notes[0].tasks.0[1].done);
        assert_eq!(notes[0].modified_date, 400);

        let mapping = fx
            .mappings
            .get_by_local_id_and_provider(notes[0].id, Provider::Nextcloud)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(mapping.remote_note_id, Some(5));
        assert_eq!(mapping.extras.as_deref(), Some("\"etag-5\""));
    }

    #[tokio::test]
    async fn test_bad_remote_note_does_not_block_the_rest_of_the_cycle() {
        let fx = fixture().await;

        // The oversized title fails note validation on insert; the valid
        // note and the local push must still go through.
        let mut local = Note::new("local only", "body");
        local.id = fx.notes.insert(&local).await.unwrap();

        let mut backend = reachable_backend();
        backend.expect_get_all().returning(|| {
            Ok(vec![
                remote("3", &"x".repeat(1001), "bad", 400),
                remote("5", "still syncs", "good", 400),
            ])
        });
        backend.expect_create_note().times(1).returning(|_| {
            Ok(RemoteHandle {
                remote_note_id: Some(77),
                storage_uri: None,
                extras: None,
                last_modified: 500,
            })
        });

        let coordinator = coordinator(&fx, backend);
        let summary = coordinator.run_cycle().await.unwrap();
        assert_eq!(summary.failures, 1);
        assert_eq!(summary.pulled_created, 1);
        assert_eq!(summary.pushed, 1);
        wait_pushes(&coordinator).await;

        let titles: Vec<_> = fx
            .notes
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.title)
            .collect();
        assert!(titles.contains(&"still syncs".to_string()));
        assert!(!titles.iter().any(|t| t.len() > 1000));
    }

    #[tokio::test]
    async fn test_pull_overwrites_older_local_note() {
        let fx = fixture().await;

        let mut note = Note::new("old title", "old body");
        note.modified_date = 100;
        note.id = fx.notes.insert(&note).await.unwrap();
        fx.mappings
            .insert(&IdMapping::new_nextcloud(note.id, 5, Some("\"v1\"".to_string())))
            .await
            .unwrap();

        let mut backend = reachable_backend();
        backend
            .expect_get_all()
            .returning(|| Ok(vec![remote("5", "new title", "new body", 900)]));

        let coordinator = coordinator(&fx, backend);
        let summary = coordinator.run_cycle().await.unwrap();
        assert_eq!(summary.pulled_updated, 1);

        let stored = fx.notes.find_by_id(note.id).await.unwrap().unwrap();
        assert_eq!(stored.title, "new title");
        assert_eq!(stored.content, "new body");
        assert_eq!(stored.modified_date, 900);

        let mapping = fx
            .mappings
            .get_by_local_id_and_provider(note.id, Provider::Nextcloud)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(mapping.extras.as_deref(), Some("\"etag-5\""));
    }

    #[tokio::test]
    async fn test_pull_mirrors_remote_deletion() {
        let fx = fixture().await;

        let mut note = Note::new("gone remotely", "body");
        note.id = fx.notes.insert(&note).await.unwrap();
        fx.mappings
            .insert(&IdMapping::new_nextcloud(note.id, 5, None))
            .await
            .unwrap();

        let mut backend = reachable_backend();
        backend.expect_get_all().returning(|| Ok(vec![]));

        let coordinator = coordinator(&fx, backend);
        let summary = coordinator.run_cycle().await.unwrap();
        assert_eq!(summary.pulled_deleted, 1);

        assert!(fx.notes.find_by_id(note.id).await.unwrap().is_none());
        assert!(fx
            .mappings
            .get_by_local_id_and_provider(note.id, Provider::Nextcloud)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_unmapped_local_note_is_pushed_through_dispatcher() {
        let fx = fixture().await;

        let mut note = Note::new("local only so far", "body");
        note.id = fx.notes.insert(&note).await.unwrap();

        let mut backend = reachable_backend();
        backend.expect_get_all().returning(|| Ok(vec![]));
        backend.expect_create_note().times(1).returning(|_| {
            Ok(RemoteHandle {
                remote_note_id: Some(77),
                storage_uri: None,
                extras: Some("\"etag-77\"".to_string()),
                last_modified: 500,
            })
        });

        let coordinator = coordinator(&fx, backend);
        let summary = coordinator.run_cycle().await.unwrap();
        assert_eq!(summary.pushed, 1);

        wait_pushes(&coordinator).await;

        let mapping = fx
            .mappings
            .get_by_local_id_and_provider(note.id, Provider::Nextcloud)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(mapping.remote_note_id, Some(77));
    }

    #[tokio::test]
    async fn test_unreachable_backend_aborts_cycle() {
        let fx = fixture().await;

        let mut backend = MockSyncBackend::new();
        backend.expect_kind().return_const(Provider::Nextcloud);
        backend.expect_check_connection().returning(|| {
            Err(SyncError::Unavailable {
                reason: "timeout".to_string(),
            })
        });
        backend.expect_get_all().never();

        let coordinator = coordinator(&fx, backend);
        assert!(matches!(
            coordinator.run_cycle().await,
            Err(SyncError::Unavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_cycle_emits_started_and_completed_events() {
        let fx = fixture().await;

        let mut backend = reachable_backend();
        backend.expect_get_all().returning(|| Ok(vec![]));

        let mut receiver = fx.events.subscribe();
        let coordinator = coordinator(&fx, backend);
        coordinator.run_cycle().await.unwrap();

        assert!(matches!(
            receiver.recv().await.unwrap(),
            CoreEvent::Sync(SyncEvent::CycleStarted { .. })
        ));
        assert!(matches!(
            receiver.recv().await.unwrap(),
            CoreEvent::Sync(SyncEvent::CycleCompleted { .. })
        ));
    }
}
