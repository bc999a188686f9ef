//! # Note Synchronization Module
//!
//! Keeps the local note store and a remote backend in agreement.
//!
//! ## Components
//!
//! - **Backend**: the [`backend::SyncBackend`] trait every provider
//!   implements, plus the remote note and handle types crossing that seam
//! - **Reconciler**: pure diff between the local and remote listings,
//!   last-writer-wins on modification timestamps
//! - **Dispatcher**: debounced, per-note coalescing push queue
//! - **Availability**: cached backend reachability probing
//! - **Selector**: resolves the active backend from settings and gates sync
//!   on connectivity
//! - **Coordinator**: runs full reconciliation cycles
//! - **Service**: the mutation facade the embedding application uses

pub mod availability;
pub mod backend;
pub mod coordinator;
pub mod dispatcher;
pub mod error;
pub mod reconciler;
pub mod selector;
pub mod service;

pub use availability::{Availability, AvailabilityChecker};
pub use backend::{
    BackendValidation, RemoteHandle, RemoteNote, RemoteNoteMetaData, SyncBackend,
    UnimplementedBackend,
};
pub use coordinator::{SyncCoordinator, SyncSummary};
pub use dispatcher::{RemoteActionDispatcher, RemoteOp};
pub use error::{Result, SyncError};
pub use reconciler::{reconcile, NoteAction, ReconcileOutcome, MODIFIED_TOLERANCE_SECS};
pub use selector::BackendSelector;
pub use service::NoteService;
