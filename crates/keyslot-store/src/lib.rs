//! # keyslot store
//!
//! Persistent backends for keyslot. Provides a trait-based interface for
//! string key-value storage with SQLite and in-memory implementations.
//!
//! ## Overview
//!
//! The persistence layer of a registry talks to its storage through the
//! [`Backend`] trait, so the registry stays storage-agnostic. The primary
//! implementation is [`SqliteBackend`], with [`MemoryBackend`] for testing.
//!
//! ## Key Types
//!
//! - [`Backend`] - get/set text by key
//! - [`SqliteBackend`] - SQLite-based persistent storage
//! - [`MemoryBackend`] - In-memory storage for tests
//! - [`Namespaced`] - Key-prefixing view over another backend
//!
//! ## Usage
//!
//! ```rust,no_run
//! use keyslot_store::{Backend, SqliteBackend};
//!
//! let backend = SqliteBackend::open("slots.db").unwrap();
//! backend.set_string("prefs", "{}").unwrap();
//! assert_eq!(backend.get_string("prefs").unwrap().as_deref(), Some("{}"));
//! ```
//!
//! ## Design Notes
//!
//! - **Opaque text**: backends never parse what they store
//! - **Last write wins**: `set_string` replaces any previous text

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;
pub use traits::{Backend, Namespaced};

/// Get current time in milliseconds.
pub(crate) fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
