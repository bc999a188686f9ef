//! # Core Runtime
//!
//! Shared runtime plumbing for the note platform: the host-facing
//! configuration builder, the broadcast event bus, and logging setup. Every
//! other core crate builds on the conventions established here.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
