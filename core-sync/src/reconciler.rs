//! # Reconciliation Engine
//!
//! Pure diff between the local note listing and a backend's remote listing.
//! Takes snapshots of both sides plus the id mappings that tie them together
//! and produces two action lists: what to change locally and what to push
//! remotely. No IO happens here; the coordinator applies the local list and
//! hands the remote list to the dispatcher.
//!
//! Conflict resolution is last-writer-wins on `modified_date`, with a small
//! tolerance so clock skew between the store and the backend does not cause
//! update ping-pong.

use crate::backend::RemoteNoteMetaData;
use core_notes::{IdMapping, Note, NoteId, Provider};
use std::collections::{HashMap, HashSet};

/// Timestamps closer than this are treated as equal (seconds).
pub const MODIFIED_TOLERANCE_SECS: i64 = 1;

/// One reconciliation decision about a single note.
#[derive(Debug, Clone, PartialEq)]
pub enum NoteAction {
    /// The note exists on one side only and must be created on the other.
    Create {
        note: Note,
        meta: RemoteNoteMetaData,
    },
    /// Both sides exist; the listed side must be overwritten.
    Update {
        note: Note,
        meta: RemoteNoteMetaData,
    },
    /// The counterpart disappeared; the listed side must be removed.
    Delete {
        note: Note,
        meta: RemoteNoteMetaData,
    },
}

impl NoteAction {
    /// The local note this action concerns.
    pub fn note(&self) -> &Note {
        match self {
            NoteAction::Create { note, .. }
            | NoteAction::Update { note, .. }
            | NoteAction::Delete { note, .. } => note,
        }
    }

    /// The remote metadata this action concerns.
    pub fn meta(&self) -> &RemoteNoteMetaData {
        match self {
            NoteAction::Create { meta, .. }
            | NoteAction::Update { meta, .. }
            | NoteAction::Delete { meta, .. } => meta,
        }
    }
}

/// The two action lists a reconciliation pass produces.
#[derive(Debug, Default, PartialEq)]
pub struct ReconcileOutcome {
    /// Changes to apply to the local store (pull direction).
    pub local_updates: Vec<NoteAction>,

    /// Changes to push to the backend (push direction).
    pub remote_updates: Vec<NoteAction>,
}

impl ReconcileOutcome {
    /// Whether the two sides were already in agreement.
    pub fn is_settled(&self) -> bool {
        self.local_updates.is_empty() && self.remote_updates.is_empty()
    }
}

/// Shell note standing in for a remote-only note during a pull create.
fn shell_from_remote(meta: &RemoteNoteMetaData) -> Note {
    let mut note = Note::new(meta.title.clone(), "");
    note.created_date = meta.last_modified;
    note.modified_date = meta.last_modified;
    note
}

/// Shell note carrying only the local id, for pushes whose note no longer
/// exists in the local listing.
fn shell_from_id(local_note_id: NoteId) -> Note {
    let mut note = Note::new("", "");
    note.id = local_note_id;
    note
}

/// Diff local and remote listings under one provider's mappings.
///
/// Only mappings belonging to `provider` participate; rows for other
/// providers are invisible to this pass. The remote identity key is
/// provider-dependent: stringified numeric id for server backends, storage
/// URI for the filesystem backend (see [`IdMapping::remote_identity`]).
///
/// Decision table per note:
/// - mapped, both sides present: last-writer-wins on `modified_date` within
///   [`MODIFIED_TOLERANCE_SECS`]; ties produce no action
/// - mapped, remote side gone: delete the local note
/// - local without mapping: create remotely
/// - remote without mapping: create locally
/// - remote mapped to a local note that is gone or flagged for deletion:
///   delete remotely
pub fn reconcile(
    local_notes: &[Note],
    remote_notes: &[RemoteNoteMetaData],
    mappings: &[IdMapping],
    provider: Provider,
) -> ReconcileOutcome {
    let mut outcome = ReconcileOutcome::default();

    let remote_by_id: HashMap<&str, &RemoteNoteMetaData> =
        remote_notes.iter().map(|r| (r.id.as_str(), r)).collect();

    let provider_mappings: Vec<&IdMapping> =
        mappings.iter().filter(|m| m.provider == provider).collect();

    let mapping_by_local: HashMap<NoteId, &IdMapping> = provider_mappings
        .iter()
        .map(|m| (m.local_note_id, *m))
        .collect();

    let mapping_by_remote: HashMap<String, &IdMapping> = provider_mappings
        .iter()
        .filter_map(|m| m.remote_identity().map(|key| (key, *m)))
        .collect();

    let local_ids: HashSet<NoteId> = local_notes.iter().map(|n| n.id).collect();

    // Remote ids already matched against a local note in the first pass.
    let mut matched_remote: HashSet<&str> = HashSet::new();

    for note in local_notes {
        match mapping_by_local.get(&note.id) {
            Some(mapping) => {
                let remote = mapping
                    .remote_identity()
                    .and_then(|key| remote_by_id.get(key.as_str()).copied());

                match remote {
                    Some(remote) => {
                        matched_remote.insert(remote.id.as_str());

                        let skew = note.modified_date - remote.last_modified;
                        if skew > MODIFIED_TOLERANCE_SECS {
                            outcome.remote_updates.push(NoteAction::Update {
                                note: note.clone(),
                                meta: remote.clone(),
                            });
                        } else if -skew > MODIFIED_TOLERANCE_SECS {
                            outcome.local_updates.push(NoteAction::Update {
                                note: note.clone(),
                                meta: remote.clone(),
                            });
                        }
                    }
                    None => {
                        // The mapped remote note is gone; mirror the
                        // deletion locally.
                        outcome.local_updates.push(NoteAction::Delete {
                            note: note.clone(),
                            meta: RemoteNoteMetaData::absent(),
                        });
                    }
                }
            }
            None => {
                outcome.remote_updates.push(NoteAction::Create {
                    note: note.clone(),
                    meta: RemoteNoteMetaData {
                        id: String::new(),
                        title: note.title.clone(),
                        last_modified: note.modified_date,
                    },
                });
            }
        }
    }

    for remote in remote_notes {
        if matched_remote.contains(remote.id.as_str()) {
            continue;
        }

        match mapping_by_remote.get(&remote.id) {
            Some(mapping) => {
                if mapping.is_deleted_locally || !local_ids.contains(&mapping.local_note_id) {
                    outcome.remote_updates.push(NoteAction::Delete {
                        note: shell_from_id(mapping.local_note_id),
                        meta: remote.clone(),
                    });
                }
            }
            None => {
                outcome.local_updates.push(NoteAction::Create {
                    note: shell_from_remote(remote),
                    meta: remote.clone(),
                });
            }
        }
    }

    outcome
}
