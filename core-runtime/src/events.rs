//! # Event Bus
//!
//! Typed change notifications over `tokio::sync::broadcast`. The sync
//! subsystem and the note service publish [`CoreEvent`]s here; UI layers
//! subscribe to drive toasts, list refreshes, and sync status indicators
//! without holding references into the core.
//!
//! ```rust
//! use core_runtime::events::{EventBus, CoreEvent, NoteEvent};
//!
//! # let event_bus = EventBus::new(100);
//! let event = CoreEvent::Note(NoteEvent::Created {
//!     note_id: 42,
//!     title: "Shopping list".to_string(),
//! });
//!
//! event_bus.emit(event).ok();
//! ```
//!
//! Receiving follows broadcast-channel rules: `RecvError::Lagged(n)` means
//! a slow subscriber skipped `n` events and may keep reading, while
//! `RecvError::Closed` means every sender is gone and the loop should end.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Buffer size used by [`EventBus::default`]. Subscribers further behind
/// than this see `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Every event the core can publish, split by domain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Sync-related events
    Sync(SyncEvent),
    /// Note content events
    Note(NoteEvent),
}

impl CoreEvent {
    /// Short human-readable label, suitable for a toast or a log line.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Sync(e) => e.description(),
            CoreEvent::Note(e) => e.description(),
        }
    }

    /// How loudly a UI should surface this event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Sync(SyncEvent::CycleFailed { .. }) => EventSeverity::Error,
            CoreEvent::Sync(SyncEvent::PushFailed { .. }) => EventSeverity::Error,
            CoreEvent::Sync(SyncEvent::BackendUnavailable { .. }) => EventSeverity::Warning,
            CoreEvent::Sync(SyncEvent::CycleCompleted { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Coarse severity, ordered so subscribers can threshold-filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Sync Events
// ============================================================================

/// Events related to synchronization with note backends.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SyncEvent {
    /// A full reconciliation cycle started.
    CycleStarted {
        /// The provider being synced (e.g., "Nextcloud", "FileStorage").
        provider: String,
    },
    /// A full reconciliation cycle finished successfully.
    CycleCompleted {
        /// The provider that was synced.
        provider: String,
        /// Number of notes pulled from the backend (created locally).
        pulled_created: u64,
        /// Number of local notes updated from the backend.
        pulled_updated: u64,
        /// Number of local notes deleted because the backend removed them.
        pulled_deleted: u64,
        /// Number of local changes pushed to the backend.
        pushed: u64,
        /// Number of pulled changes that could not be applied locally.
        failures: u64,
        /// Duration of the cycle in milliseconds.
        duration_ms: u64,
    },
    /// A reconciliation cycle stopped on an error.
    CycleFailed {
        /// The provider being synced.
        provider: String,
        /// Human-readable error message.
        message: String,
        /// Whether the cycle can be retried.
        recoverable: bool,
    },
    /// Backend availability probe failed; sync is paused until it recovers.
    BackendUnavailable {
        /// The provider whose backend is unreachable.
        provider: String,
        /// Why the backend was judged unavailable.
        reason: String,
    },
    /// Pushing a single note to the backend failed.
    PushFailed {
        /// The local note whose push failed.
        note_id: i64,
        /// Human-readable error message.
        message: String,
    },
}

impl SyncEvent {
    fn description(&self) -> &str {
        match self {
            SyncEvent::CycleStarted { .. } => "Sync cycle started",
            SyncEvent::CycleCompleted { .. } => "Sync cycle completed",
            SyncEvent::CycleFailed { .. } => "Sync cycle failed",
            SyncEvent::BackendUnavailable { .. } => "Sync backend unavailable",
            SyncEvent::PushFailed { .. } => "Note push failed",
        }
    }
}

// ============================================================================
// Note Events
// ============================================================================

/// Events related to note content changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum NoteEvent {
    /// New note created.
    Created {
        /// The local note id.
        note_id: i64,
        /// Note title.
        title: String,
    },
    /// Note content or metadata updated.
    Updated {
        /// The local note id.
        note_id: i64,
    },
    /// Note moved to trash.
    Trashed {
        /// The local note id.
        note_id: i64,
    },
    /// Note restored from trash.
    Restored {
        /// The local note id.
        note_id: i64,
    },
    /// Note permanently deleted.
    Deleted {
        /// The local note id that was deleted.
        note_id: i64,
    },
}

impl NoteEvent {
    fn description(&self) -> &str {
        match self {
            NoteEvent::Created { .. } => "Note created",
            NoteEvent::Updated { .. } => "Note updated",
            NoteEvent::Trashed { .. } => "Note moved to trash",
            NoteEvent::Restored { .. } => "Note restored from trash",
            NoteEvent::Deleted { .. } => "Note deleted",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Shared publish/subscribe handle. Cloning is cheap; every clone feeds the
/// same channel, and every `subscribe()` call gets an independent receiver.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Bus with room for `capacity` unconsumed events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Bus with [`DEFAULT_EVENT_BUFFER_SIZE`] capacity.
    #[allow(clippy::should_implement_trait)]
    pub fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }

    /// Publishes to all current subscribers. Errs only when nobody is
    /// listening, which callers on the sync path deliberately ignore.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// New receiver seeing every event emitted from this point on. Past
    /// events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// Receiver with an optional predicate, so a subscriber interested only in
/// sync outcomes (or only note changes) does not see the rest.
///
/// ```rust
/// use core_runtime::events::{EventBus, EventStream, CoreEvent};
///
/// # #[tokio::main]
/// # async fn main() {
/// let event_bus = EventBus::new(100);
/// let mut sync_only = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Sync(_)));
/// # }
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Restricts `recv`/`try_recv` to events matching `predicate`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Next matching event. Non-matching events are consumed and skipped.
    /// Lag and closure errors pass through unchanged.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;

            let Some(filter) = &self.filter else {
                return Ok(event);
            };

            if filter(&event) {
                return Ok(event);
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv). `None` means nothing
    /// matching is buffered right now.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    let Some(filter) = &self.filter else {
                        return Some(Ok(event));
                    };

                    if filter(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
