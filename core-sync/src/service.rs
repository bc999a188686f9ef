//! # Note Service
//!
//! The mutation entry point the embedding application talks to. Every write
//! goes through here so the modification timestamp invariant holds, note
//! events fire, and the matching incremental push reaches the dispatcher.
//!
//! The service lazily builds one dispatcher and coordinator pair per active
//! backend and rebuilds them when the user switches providers.

use crate::availability::AvailabilityChecker;
use crate::backend::BackendValidation;
use crate::coordinator::{SyncCoordinator, SyncSummary};
use crate::dispatcher::{RemoteActionDispatcher, RemoteOp};
use crate::error::{Result, SyncError};
use crate::selector::{keys, BackendSelector};
use core_notes::repositories::{IdMappingRepository, NoteRepository};
use core_notes::{Note, NoteId, Provider};
use core_runtime::config::SyncTuning;
use core_runtime::events::{CoreEvent, EventBus, NoteEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Dispatcher and coordinator built for one backend.
#[derive(Clone)]
struct ActiveSync {
    provider: Provider,
    dispatcher: Arc<RemoteActionDispatcher>,
    coordinator: Arc<SyncCoordinator>,
}

/// Facade over the note store and the sync subsystem.
pub struct NoteService {
    notes: Arc<dyn NoteRepository>,
    mappings: Arc<dyn IdMappingRepository>,
    selector: Arc<BackendSelector>,
    events: EventBus,
    tuning: SyncTuning,
    active: tokio::sync::Mutex<Option<ActiveSync>>,
}

impl NoteService {
    pub fn new(
        notes: Arc<dyn NoteRepository>,
        mappings: Arc<dyn IdMappingRepository>,
        selector: Arc<BackendSelector>,
        events: EventBus,
        tuning: SyncTuning,
    ) -> Self {
        Self {
            notes,
            mappings,
            selector,
            events,
            tuning,
            active: tokio::sync::Mutex::new(None),
        }
    }

    /// Persist a new note and push it to the active backend.
    pub async fn create_note(&self, mut note: Note) -> Result<Note> {
        note.touch();
        note.id = self.notes.insert(&note).await?;

        let _ = self.events.emit(CoreEvent::Note(NoteEvent::Created {
            note_id: note.id.0,
            title: note.display_title().to_string(),
        }));

        if note.is_syncable() {
            self.submit_push(note.id, RemoteOp::Create).await;
        }
        Ok(note)
    }

    /// Persist an edit to an existing note and push it.
    pub async fn update_note(&self, mut note: Note) -> Result<Note> {
        note.touch();
        self.notes.update(&note).await?;

        let _ = self.events.emit(CoreEvent::Note(NoteEvent::Updated {
            note_id: note.id.0,
        }));

        if note.is_syncable() {
            self.submit_push(note.id, RemoteOp::Update).await;
        }
        Ok(note)
    }

    /// Flip one checklist entry and push the change.
    pub async fn toggle_task(&self, note_id: NoteId, task_index: usize) -> Result<Note> {
        let Some(mut note) = self.notes.find_by_id(note_id).await? else {
            return Err(SyncError::Notes(core_notes::NotesError::NotFound {
                entity_type: "Note".to_string(),
                id: note_id.to_string(),
            }));
        };

        let Some(task) = note.tasks.0.get_mut(task_index) else {
            return Err(SyncError::Configuration(format!(
                "note {note_id} has no task at index {task_index}"
            )));
        };
        task.done = !task.done;

        self.update_note(note).await
    }

    /// Flip the pinned flag. Not content-affecting, so the modification
    /// timestamp stays put and conflict resolution is unaffected.
    pub async fn toggle_pinned(&self, note_id: NoteId) -> Result<Note> {
        self.toggle_flag(note_id, |note| note.is_pinned = !note.is_pinned)
            .await
    }

    /// Flip the archived flag.
    pub async fn toggle_archived(&self, note_id: NoteId) -> Result<Note> {
        self.toggle_flag(note_id, |note| note.is_archived = !note.is_archived)
            .await
    }

    /// Flip the hidden flag.
    pub async fn toggle_hidden(&self, note_id: NoteId) -> Result<Note> {
        self.toggle_flag(note_id, |note| note.is_hidden = !note.is_hidden)
            .await
    }

    async fn toggle_flag(
        &self,
        note_id: NoteId,
        mutate: impl FnOnce(&mut Note),
    ) -> Result<Note> {
        let Some(mut note) = self.notes.find_by_id(note_id).await? else {
            return Err(SyncError::Notes(core_notes::NotesError::NotFound {
                entity_type: "Note".to_string(),
                id: note_id.to_string(),
            }));
        };

        mutate(&mut note);
        self.notes.update(&note).await?;

        let _ = self.events.emit(CoreEvent::Note(NoteEvent::Updated {
            note_id: note.id.0,
        }));
        Ok(note)
    }

    pub async fn get_note(&self, note_id: NoteId) -> Result<Option<Note>> {
        Ok(self.notes.find_by_id(note_id).await?)
    }

    /// Every note including trashed ones, most recently modified first.
    pub async fn list_notes(&self) -> Result<Vec<Note>> {
        Ok(self.notes.list_all().await?)
    }

    /// Trashed notes, most recently deleted first.
    pub async fn list_trash(&self) -> Result<Vec<Note>> {
        Ok(self.notes.list_trashed().await?)
    }

    /// Hard-delete trashed notes older than the cutoff (epoch seconds).
    ///
    /// Mappings were already flagged for remote deletion when the notes were
    /// trashed, so the remote copies are removed independently.
    pub async fn purge_trash(&self, cutoff: i64) -> Result<u64> {
        let purged = self.notes.purge_trashed_before(cutoff).await?;
        if purged > 0 {
            debug!(purged, cutoff, "Purged trashed notes");
        }
        Ok(purged)
    }

    /// Move a note to the trash and remove its remote copies.
    ///
    /// The note's mappings are flagged for remote deletion, so the removal
    /// survives a restart even when the push below never runs.
    pub async fn trash_note(&self, note_id: NoteId) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        self.notes.trash(note_id, now).await?;
        self.mappings.set_notes_to_be_deleted(&[note_id]).await?;

        let _ = self.events.emit(CoreEvent::Note(NoteEvent::Trashed {
            note_id: note_id.0,
        }));

        self.submit_push(note_id, RemoteOp::Delete).await;
        Ok(())
    }

    /// Bring a note back from the trash.
    ///
    /// If the remote copy was already deleted, the next reconciliation cycle
    /// recreates it.
    pub async fn restore_note(&self, note_id: NoteId) -> Result<()> {
        self.notes.restore(note_id).await?;

        let provider = self.selector.active_provider().await?;
        if provider != Provider::Disabled {
            if let Some(mut mapping) = self
                .mappings
                .get_by_local_id_and_provider(note_id, provider)
                .await?
            {
                mapping.is_deleted_locally = false;
                self.mappings.update(&mapping).await?;
            }
        }

        let _ = self.events.emit(CoreEvent::Note(NoteEvent::Restored {
            note_id: note_id.0,
        }));

        self.submit_push(note_id, RemoteOp::Update).await;
        Ok(())
    }

    /// Permanently delete a note, locally and remotely.
    pub async fn delete_note(&self, note_id: NoteId) -> Result<()> {
        if self.selector.active_provider().await? == Provider::Disabled {
            // No push will ever consume these rows, drop them outright.
            self.mappings.delete_by_local_ids(&[note_id]).await?;
        } else {
            self.mappings.set_notes_to_be_deleted(&[note_id]).await?;
        }
        self.notes.delete(&[note_id]).await?;

        let _ = self.events.emit(CoreEvent::Note(NoteEvent::Deleted {
            note_id: note_id.0,
        }));

        self.submit_push(note_id, RemoteOp::Delete).await;
        Ok(())
    }

    /// Run a full reconciliation cycle immediately.
    pub async fn sync_now(&self) -> Result<SyncSummary> {
        let Some(active) = self.ensure_active().await? else {
            return Err(SyncError::Configuration(
                "no sync provider configured".to_string(),
            ));
        };

        if !self.selector.sync_allowed().await? {
            return Err(SyncError::Unavailable {
                reason: "sync blocked by network constraints".to_string(),
            });
        }

        active.coordinator.run_cycle().await
    }

    /// Switch the active provider, wiping the outgoing provider's mappings.
    pub async fn set_provider(&self, provider: Provider) -> Result<()> {
        self.selector
            .set_active_provider(provider, self.mappings.as_ref())
            .await?;

        let mut active = self.active.lock().await;
        *active = None;
        Ok(())
    }

    /// Check the configured backend's reachability and compatibility.
    pub async fn validate_provider(&self) -> Result<BackendValidation> {
        let Some(backend) = self.selector.active_backend().await? else {
            return Err(SyncError::Configuration(
                "no sync provider configured".to_string(),
            ));
        };
        backend.validate().await
    }

    /// Periodically run sync cycles until the returned handle is aborted.
    ///
    /// Each tick re-reads the background-sync preference, so turning the
    /// setting off takes effect without restarting the service.
    pub fn spawn_background_sync(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        info!(interval_secs = interval.as_secs(), "Background sync started");
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick fires immediately; skip it so a freshly started
            // service does not sync before the app finishes wiring up.
            ticker.tick().await;

            loop {
                ticker.tick().await;

                let enabled = match self.background_enabled().await {
                    Ok(enabled) => enabled,
                    Err(e) => {
                        error!(error = %e, "Failed to read background sync setting");
                        continue;
                    }
                };
                if !enabled {
                    debug!("Background sync disabled, skipping tick");
                    continue;
                }

                match self.sync_now().await {
                    Ok(summary) => debug!(?summary, "Background sync cycle finished"),
                    Err(SyncError::Configuration(_)) => {
                        debug!("Background sync skipped, no provider configured")
                    }
                    Err(e) => warn!(error = %e, "Background sync cycle failed"),
                }
            }
        })
    }

    async fn background_enabled(&self) -> Result<bool> {
        Ok(self
            .selector
            .settings()
            .get_bool(keys::SYNC_BACKGROUND_ENABLED)
            .await?
            .unwrap_or(false))
    }

    /// Dispatcher idleness, for orderly shutdown.
    pub async fn pushes_idle(&self) -> bool {
        let active = self.active.lock().await;
        active
            .as_ref()
            .map(|a| a.dispatcher.is_idle())
            .unwrap_or(true)
    }

    async fn submit_push(&self, note_id: NoteId, op: RemoteOp) {
        match self.ensure_active().await {
            Ok(Some(active)) => active.dispatcher.submit(note_id, op),
            Ok(None) => debug!(note_id = %note_id, "Sync disabled, push skipped"),
            Err(e) => warn!(note_id = %note_id, error = %e, "Could not resolve sync backend"),
        }
    }

    /// Resolve (and cache) the dispatcher and coordinator for the active
    /// backend. `None` when sync is disabled.
    async fn ensure_active(&self) -> Result<Option<ActiveSync>> {
        let provider = self.selector.active_provider().await?;

        let mut guard = self.active.lock().await;
        if provider == Provider::Disabled {
            *guard = None;
            return Ok(None);
        }

        if let Some(active) = guard.as_ref() {
            if active.provider == provider {
                return Ok(Some(active.clone()));
            }
        }

        let Some(backend) = self.selector.active_backend().await? else {
            *guard = None;
            return Ok(None);
        };

        let availability = Arc::new(AvailabilityChecker::new(self.tuning.availability_ttl));
        let dispatcher = Arc::new(RemoteActionDispatcher::new(
            backend.clone(),
            self.notes.clone(),
            self.mappings.clone(),
            availability.clone(),
            self.events.clone(),
            self.tuning.dispatch_debounce,
        ));
        let coordinator = Arc::new(SyncCoordinator::new(
            backend,
            dispatcher.clone(),
            self.notes.clone(),
            self.mappings.clone(),
            availability,
            self.events.clone(),
        ));

        let active = ActiveSync {
            provider,
            dispatcher,
            coordinator,
        };
        *guard = Some(active.clone());
        Ok(Some(active))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockSyncBackend, RemoteHandle, SyncBackend};
    use bridge_desktop::SqliteSettingsStore;
    use bridge_traits::storage::SettingsStore;
    use core_notes::db::create_test_pool;
    use core_notes::repositories::{SqliteIdMappingRepository, SqliteNoteRepository};
    use core_notes::IdMapping;

    struct Fixture {
        notes: Arc<SqliteNoteRepository>,
        mappings: Arc<SqliteIdMappingRepository>,
        settings: Arc<dyn SettingsStore>,
        events: EventBus,
    }

    async fn fixture() -> Fixture {
        let pool = create_test_pool().await.unwrap();
        Fixture {
            notes: Arc::new(SqliteNoteRepository::new(pool.clone())),
            mappings: Arc::new(SqliteIdMappingRepository::new(pool)),
            settings: Arc::new(SqliteSettingsStore::in_memory().await.unwrap()),
            events: EventBus::default(),
        }
    }

    fn tuning() -> SyncTuning {
        SyncTuning {
            dispatch_debounce: Duration::from_millis(20),
            availability_ttl: Duration::from_secs(30),
        }
    }

    fn service(fx: &Fixture, backend: Option<MockSyncBackend>) -> NoteService {
        let selector = Arc::new(BackendSelector::new(fx.settings.clone(), None));
        if let Some(backend) = backend {
            selector.register(Arc::new(backend) as Arc<dyn SyncBackend>);
        }
        NoteService::new(
            fx.notes.clone(),
            fx.mappings.clone(),
            selector,
            fx.events.clone(),
            tuning(),
        )
    }

    fn reachable_backend() -> MockSyncBackend {
        let mut backend = MockSyncBackend::new();
        backend.expect_kind().return_const(Provider::Nextcloud);
        backend.expect_check_connection().returning(|| Ok(()));
        backend
    }

    async fn wait_idle(service: &NoteService) {
        for _ in 0..500 {
            tokio::time::sleep(Duration::from_millis(5)).await;
            if service.pushes_idle().await {
                return;
            }
        }
        panic!("pushes did not finish in time");
    }

    #[tokio::test]
    async fn test_create_note_pushes_and_maps() {
        let fx = fixture().await;
        fx.settings
            .set_string(keys::SYNC_PROVIDER, "nextcloud")
            .await
            .unwrap();

        let mut backend = reachable_backend();
        backend.expect_create_note().times(1).returning(|_| {
            Ok(RemoteHandle {
                remote_note_id: Some(11),
                storage_uri: None,
                extras: None,
                last_modified: 600,
            })
        });

        let service = service(&fx, Some(backend));
        let mut receiver = fx.events.subscribe();

        let note = service.create_note(Note::new("todo", "body")).await.unwrap();
        assert!(note.id.is_assigned());
        assert!(matches!(
            receiver.recv().await.unwrap(),
            CoreEvent::Note(NoteEvent::Created { title, .. }) if title == "todo"
        ));

        wait_idle(&service).await;
        let mapping = fx
            .mappings
            .get_by_local_id_and_provider(note.id, Provider::Nextcloud)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(mapping.remote_note_id, Some(11));
    }

    #[tokio::test]
    async fn test_update_bumps_modified_date() {
        let fx = fixture().await;
        let service = service(&fx, None);

        let mut note = service.create_note(Note::new("a", "b")).await.unwrap();
        note.modified_date = 0;
        note.content = "edited".to_string();

        let updated = service.update_note(note).await.unwrap();
        assert!(updated.modified_date > 0);

        let stored = fx.notes.find_by_id(updated.id).await.unwrap().unwrap();
        assert_eq!(stored.content, "edited");
        assert_eq!(stored.modified_date, updated.modified_date);
    }

    #[tokio::test]
    async fn test_trash_flags_mapping_and_deletes_remotely() {
        let fx = fixture().await;
        fx.settings
            .set_string(keys::SYNC_PROVIDER, "nextcloud")
            .await
            .unwrap();

        let mut backend = reachable_backend();
        backend
            .expect_delete_note()
            .times(1)
            .returning(|_| Ok(true));

        let service = service(&fx, Some(backend));
        let mut note = Note::new("old", "body");
        note.id = fx.notes.insert(&note).await.unwrap();
        fx.mappings
            .insert(&IdMapping::new_nextcloud(note.id, 42, None))
            .await
            .unwrap();

        service.trash_note(note.id).await.unwrap();
        wait_idle(&service).await;

        let stored = fx.notes.find_by_id(note.id).await.unwrap().unwrap();
        assert!(stored.is_deleted);
        assert!(stored.deletion_date.is_some());

        // The mapping row is gone once the backend confirmed the delete.
        assert!(fx
            .mappings
            .get_by_local_id_and_provider(note.id, Provider::Nextcloud)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_mutations_work_with_sync_disabled() {
        let fx = fixture().await;
        let service = service(&fx, None);

        let note = service.create_note(Note::new("offline", "b")).await.unwrap();
        service.trash_note(note.id).await.unwrap();
        service.restore_note(note.id).await.unwrap();
        service.delete_note(note.id).await.unwrap();

        assert!(fx.notes.find_by_id(note.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_accessors_see_live_and_trashed_notes() {
        let fx = fixture().await;
        let service = service(&fx, None);

        let kept = service.create_note(Note::new("kept", "x")).await.unwrap();
        let trashed = service.create_note(Note::new("gone", "y")).await.unwrap();
        service.trash_note(trashed.id).await.unwrap();

        assert_eq!(service.get_note(kept.id).await.unwrap().unwrap().title, "kept");
        assert_eq!(service.list_notes().await.unwrap().len(), 2);

        let trash = service.list_trash().await.unwrap();
        assert_eq!(trash.len(), 1);
        assert_eq!(trash[0].id, trashed.id);
    }

    #[tokio::test]
    async fn test_toggle_task_flips_and_bumps_modified_date() {
        let fx = fixture().await;
        let service = service(&fx, None);

        let mut note = Note::new("Groceries", "run");
        note.tasks = core_notes::Json(vec![core_notes::NoteTask::new("milk")]);
        let mut note = service.create_note(note).await.unwrap();
        note.modified_date = 0;
        fx.notes.update(&note).await.unwrap();

        let toggled = service.toggle_task(note.id, 0).await.unwrap();
        assert!(toggled.tasks.0[0].done);
        assert!(toggled.modified_date > 0);

        assert!(service.toggle_task(note.id, 5).await.is_err());
    }

    #[tokio::test]
    async fn test_flag_toggles_do_not_touch_modified_date() {
        let fx = fixture().await;
        let service = service(&fx, None);

        let mut note = service.create_note(Note::new("a", "b")).await.unwrap();
        note.modified_date = 1000;
        fx.notes.update(&note).await.unwrap();

        let pinned = service.toggle_pinned(note.id).await.unwrap();
        assert!(pinned.is_pinned);
        assert_eq!(pinned.modified_date, 1000);

        let archived = service.toggle_archived(note.id).await.unwrap();
        assert!(archived.is_archived);
        assert_eq!(archived.modified_date, 1000);
    }

    #[tokio::test]
    async fn test_purge_trash_removes_only_old_entries() {
        let fx = fixture().await;
        let service = service(&fx, None);

        let old = service.create_note(Note::new("old", "x")).await.unwrap();
        let recent = service.create_note(Note::new("recent", "y")).await.unwrap();
        fx.notes.trash(old.id, 100).await.unwrap();
        fx.notes.trash(recent.id, 900).await.unwrap();

        let purged = service.purge_trash(500).await.unwrap();
        assert_eq!(purged, 1);
        assert!(fx.notes.find_by_id(old.id).await.unwrap().is_none());
        assert!(fx.notes.find_by_id(recent.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sync_now_without_provider_is_a_configuration_error() {
        let fx = fixture().await;
        let service = service(&fx, None);
        assert!(matches!(
            service.sync_now().await,
            Err(SyncError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_switching_provider_rebuilds_the_push_pipeline() {
        let fx = fixture().await;
        fx.settings
            .set_string(keys::SYNC_PROVIDER, "nextcloud")
            .await
            .unwrap();

        let service = service(&fx, Some(reachable_backend()));
        assert!(service.ensure_active().await.unwrap().is_some());

        service.set_provider(Provider::Disabled).await.unwrap();
        assert!(service.ensure_active().await.unwrap().is_none());
    }
}
