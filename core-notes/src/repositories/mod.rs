//! Repository traits and SQLite implementations for data access

pub mod id_mapping;
pub mod note;

pub use id_mapping::{IdMappingRepository, SqliteIdMappingRepository};
pub use note::{NoteRepository, SqliteNoteRepository};
