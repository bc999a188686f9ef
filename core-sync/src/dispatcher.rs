//! # Remote Action Dispatcher
//!
//! Pushes individual note mutations to the active backend without blocking
//! the caller. Submissions are debounced and coalesced per note: rapid edits
//! collapse into the single most recent operation, and only one worker per
//! note talks to the backend at a time.
//!
//! ## Coalescing
//!
//! The pending map keeps at most one operation per note, last submission
//! wins. A worker drains its note's pending slot in a loop; the drain-exit
//! check and the pending lookup happen under one lock, so a submission that
//! races with worker shutdown either lands before the worker exits or spawns
//! a fresh worker after it has left the in-flight set. No operation can
//! strand in the pending map.
//!
//! ## Failure policy
//!
//! Per-action failures are logged and surfaced as events; they never stop
//! the drain and are not retried. The next local edit resubmits naturally.

use crate::availability::{Availability, AvailabilityChecker};
use crate::backend::SyncBackend;
use crate::error::Result;
use core_notes::repositories::{IdMappingRepository, NoteRepository};
use core_notes::NoteId;
use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// A push operation against the active backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOp {
    Create,
    Update,
    Delete,
}

#[derive(Default)]
struct DispatcherState {
    /// Latest submitted operation per note.
    pending: HashMap<NoteId, RemoteOp>,
    /// Notes that currently have a worker draining them.
    in_flight: HashSet<NoteId>,
}

/// Debounced, coalescing push queue for one backend.
pub struct RemoteActionDispatcher {
    backend: Arc<dyn SyncBackend>,
    notes: Arc<dyn NoteRepository>,
    mappings: Arc<dyn IdMappingRepository>,
    availability: Arc<AvailabilityChecker>,
    events: EventBus,
    debounce: Duration,
    state: Mutex<DispatcherState>,
}

impl RemoteActionDispatcher {
    pub fn new(
        backend: Arc<dyn SyncBackend>,
        notes: Arc<dyn NoteRepository>,
        mappings: Arc<dyn IdMappingRepository>,
        availability: Arc<AvailabilityChecker>,
        events: EventBus,
        debounce: Duration,
    ) -> Self {
        Self {
            backend,
            notes,
            mappings,
            availability,
            events,
            debounce,
            state: Mutex::new(DispatcherState::default()),
        }
    }

    /// Queue an operation for a note. Returns immediately.
    ///
    /// A later submission for the same note replaces an earlier one that has
    /// not started executing yet.
    pub fn submit(self: &Arc<Self>, note_id: NoteId, op: RemoteOp) {
        let spawn_worker = {
            let mut state = self.lock_state();
            state.pending.insert(note_id, op);
            state.in_flight.insert(note_id)
        };

        debug!(note_id = %note_id, ?op, spawn_worker, "Remote action submitted");

        if spawn_worker {
            let dispatcher = Arc::clone(self);
            tokio::spawn(async move {
                dispatcher.run_worker(note_id).await;
            });
        }
    }

    /// Whether nothing is queued or executing. Mainly useful for shutdown
    /// and tests.
    pub fn is_idle(&self) -> bool {
        let state = self.lock_state();
        state.pending.is_empty() && state.in_flight.is_empty()
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, DispatcherState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn run_worker(&self, note_id: NoteId) {
        tokio::time::sleep(self.debounce).await;

        if let Availability::Unavailable { reason } =
            self.availability.check(self.backend.as_ref()).await
        {
            warn!(note_id = %note_id, %reason, "Backend unavailable, abandoning push");
            let _ = self.events.emit(CoreEvent::Sync(SyncEvent::BackendUnavailable {
                provider: self.backend.kind().to_string(),
                reason,
            }));

            let mut state = self.lock_state();
            state.pending.remove(&note_id);
            state.in_flight.remove(&note_id);
            return;
        }

        loop {
            let op = {
                let mut state = self.lock_state();
                match state.pending.remove(&note_id) {
                    Some(op) => op,
                    None => {
                        state.in_flight.remove(&note_id);
                        return;
                    }
                }
            };

            if let Err(e) = self.execute(note_id, op).await {
                warn!(note_id = %note_id, ?op, error = %e, "Remote action failed");
                let _ = self.events.emit(CoreEvent::Sync(SyncEvent::PushFailed {
                    note_id: note_id.0,
                    message: e.to_string(),
                }));
            }
        }
    }

    async fn execute(&self, note_id: NoteId, op: RemoteOp) -> Result<()> {
        let provider = self.backend.kind();

        match op {
            RemoteOp::Create => {
                let Some(mut note) = self.notes.find_by_id(note_id).await? else {
                    debug!(note_id = %note_id, "Note vanished before create, dropping");
                    return Ok(());
                };

                let handle = self.backend.create_note(&note).await?;

                // Adopt the backend's timestamp so the next reconciliation
                // sees both sides as equal.
                note.modified_date = handle.last_modified;
                let mapping = handle.into_mapping(note_id, provider);
                self.mappings.insert(&mapping).await?;
                self.notes.update(&note).await?;
            }
            RemoteOp::Update => {
                let Some(mapping) = self
                    .mappings
                    .get_by_local_id_and_provider(note_id, provider)
                    .await?
                else {
                    debug!(note_id = %note_id, "No mapping for update, dropping");
                    return Ok(());
                };
                let Some(note) = self.notes.find_by_id(note_id).await? else {
                    debug!(note_id = %note_id, "Note vanished before update, dropping");
                    return Ok(());
                };

                self.mappings
                    .set_being_updated(note_id, provider, true)
                    .await?;

                match self.backend.update_note(&note, &mapping).await {
                    Ok(mut updated) => {
                        updated.is_being_updated = false;
                        self.mappings.update(&updated).await?;
                    }
                    Err(e) => {
                        let _ = self
                            .mappings
                            .set_being_updated(note_id, provider, false)
                            .await;
                        return Err(e);
                    }
                }
            }
            RemoteOp::Delete => {
                let Some(mapping) = self
                    .mappings
                    .get_by_local_id_and_provider(note_id, provider)
                    .await?
                else {
                    debug!(note_id = %note_id, "No mapping for delete, dropping");
                    return Ok(());
                };

                let existed = self.backend.delete_note(&mapping).await?;
                if !existed {
                    debug!(note_id = %note_id, "Remote note was already gone");
                }
                self.mappings.delete_by_id(mapping.id).await?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockSyncBackend, RemoteHandle};
    use crate::error::SyncError;
    use core_notes::db::create_test_pool;
    use core_notes::repositories::{SqliteIdMappingRepository, SqliteNoteRepository};
    use core_notes::{IdMapping, Note, Provider};

    const TEST_DEBOUNCE: Duration = Duration::from_millis(100);

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

    fn reachable_backend() -> MockSyncBackend {
        let mut backend = MockSyncBackend::new();
        backend.expect_kind().return_const(Provider::Nextcloud);
        backend.expect_check_connection().returning(|| Ok(()));
        backend
    }

    fn dispatcher(fx: &Fixture, backend: MockSyncBackend) -> Arc<RemoteActionDispatcher> {
        Arc::new(RemoteActionDispatcher::new(
            Arc::new(backend),
            fx.notes.clone(),
            fx.mappings.clone(),
            Arc::new(AvailabilityChecker::new(Duration::from_secs(30))),
            fx.events.clone(),
            TEST_DEBOUNCE,
        ))
    }

    async fn wait_idle(dispatcher: &Arc<RemoteActionDispatcher>) {
        for _ in 0..500 {
            tokio::time::sleep(Duration::from_millis(5)).await;
            if dispatcher.is_idle() {
                return;
            }
        }
        panic!("dispatcher did not drain in time");
    }

    async fn insert_note(fx: &Fixture, title: &str, content: &str) -> Note {
        let mut note = Note::new(title, content);
        note.id = fx.notes.insert(&note).await.unwrap();
        note
    }

    #[tokio::test]
    async fn test_rapid_updates_coalesce_into_one_push() {
        let fx = fixture().await;
        let mut note = insert_note(&fx, "draft", "v1").await;
        let mut mapping = IdMapping::new_nextcloud(note.id, 42, None);
        mapping.id = fx.mappings.insert(&mapping).await.unwrap();

        let mut backend = reachable_backend();
        backend
            .expect_update_note()
            .times(1)
            .withf(|note, _| note.content == "v3")
            .returning(|_, mapping| Ok(mapping.clone()));

        let dispatcher = dispatcher(&fx, backend);
        for content in ["v1", "v2", "v3"] {
            note.content = content.to_string();
            fx.notes.update(&note).await.unwrap();
            dispatcher.submit(note.id, RemoteOp::Update);
        }

        wait_idle(&dispatcher).await;
    }

    #[tokio::test]
    async fn test_update_without_mapping_is_silently_dropped() {
        let fx = fixture().await;
        let note = insert_note(&fx, "unmapped", "body").await;

        let mut backend = reachable_backend();
        backend.expect_update_note().never();

        let dispatcher = dispatcher(&fx, backend);
        dispatcher.submit(note.id, RemoteOp::Update);
        wait_idle(&dispatcher).await;
    }

    #[tokio::test]
    async fn test_create_inserts_mapping_and_adopts_server_timestamp() {
        let fx = fixture().await;
        let note = insert_note(&fx, "fresh", "body").await;

        let mut backend = reachable_backend();
        backend.expect_create_note().times(1).returning(|_| {
            Ok(RemoteHandle {
                remote_note_id: Some(99),
                storage_uri: None,
                extras: Some("\"etag-created\"".to_string()),
                last_modified: 12345,
            })
        });

        let dispatcher = dispatcher(&fx, backend);
        dispatcher.submit(note.id, RemoteOp::Create);
        wait_idle(&dispatcher).await;

        let mapping = fx
            .mappings
            .get_by_local_id_and_provider(note.id, Provider::Nextcloud)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(mapping.remote_note_id, Some(99));

        let stored = fx.notes.find_by_id(note.id).await.unwrap().unwrap();
        assert_eq!(stored.modified_date, 12345);
    }

    #[tokio::test]
    async fn test_delete_removes_mapping_row() {
        let fx = fixture().await;
        let note = insert_note(&fx, "doomed", "body").await;
        fx.mappings
            .insert(&IdMapping::new_nextcloud(note.id, 42, None))
            .await
            .unwrap();

        let mut backend = reachable_backend();
        backend
            .expect_delete_note()
            .times(1)
            .returning(|_| Ok(true));

        let dispatcher = dispatcher(&fx, backend);
        dispatcher.submit(note.id, RemoteOp::Delete);
        wait_idle(&dispatcher).await;

        assert!(fx
            .mappings
            .get_by_local_id_and_provider(note.id, Provider::Nextcloud)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_unreachable_backend_abandons_push_and_emits_event() {
        let fx = fixture().await;
        let note = insert_note(&fx, "offline", "body").await;
        fx.mappings
            .insert(&IdMapping::new_nextcloud(note.id, 42, None))
            .await
            .unwrap();

        let mut backend = MockSyncBackend::new();
        backend.expect_kind().return_const(Provider::Nextcloud);
        backend.expect_check_connection().returning(|| {
            Err(SyncError::Unavailable {
                reason: "dns failure".to_string(),
            })
        });
        backend.expect_update_note().never();

        let mut receiver = fx.events.subscribe();
        let dispatcher = dispatcher(&fx, backend);
        dispatcher.submit(note.id, RemoteOp::Update);
        wait_idle(&dispatcher).await;

        let event = receiver.recv().await.unwrap();
        assert!(matches!(
            event,
            CoreEvent::Sync(SyncEvent::BackendUnavailable { ref reason, .. })
                if reason.contains("dns failure")
        ));
    }

    #[tokio::test]
    async fn test_failed_push_emits_event_and_does_not_retry() {
        let fx = fixture().await;
        let note = insert_note(&fx, "flaky", "body").await;
        let mut mapping = IdMapping::new_nextcloud(note.id, 42, None);
        mapping.id = fx.mappings.insert(&mapping).await.unwrap();

        let mut backend = reachable_backend();
        backend.expect_update_note().times(1).returning(|_, _| {
            Err(SyncError::Backend {
                message: "412 precondition failed".to_string(),
            })
        });

        let mut receiver = fx.events.subscribe();
        let dispatcher = dispatcher(&fx, backend);
        dispatcher.submit(note.id, RemoteOp::Update);
        wait_idle(&dispatcher).await;

        let event = receiver.recv().await.unwrap();
        assert!(matches!(
            event,
            CoreEvent::Sync(SyncEvent::PushFailed { note_id, .. }) if note_id == note.id.0
        ));

        // The in-flight flag must not stay stuck after a failure.
        let stored = fx
            .mappings
            .get_by_local_id_and_provider(note.id, Provider::Nextcloud)
            .await
            .unwrap()
            .unwrap();
        assert!(!stored.is_being_updated);
    }
}
