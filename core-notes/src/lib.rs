//! # Note Storage Module
//!
//! Owns the canonical local note database and provides repository patterns
//! for data access.
//!
//! ## Overview
//!
//! This module manages:
//! - SQLite database schema and migrations
//! - Repository patterns for notes and sync id mappings
//! - Rich domain models with validation
//! - Checklist task rendering to and from markdown task-list syntax

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;
pub mod tasks;

pub use error::{NotesError, Result};
pub use models::{IdMapping, MappingId, Note, NoteId, NoteTask, Provider};

// Downstream crates build `Note` values without depending on sqlx directly.
pub use sqlx::types::Json;
