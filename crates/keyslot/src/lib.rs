//! # keyslot
//!
//! Keyed shared state for a single process: named slots holding dynamically
//! typed values, change-aware writes, subscriptions and optional best-effort
//! persistence.
//!
//! ## Overview
//!
//! A [`Registry`] maps string keys to values. Writers go through
//! [`Registry::update`], which only commits a *meaningful, compatible*
//! change: writing an equal value does nothing, changing a value's shape is
//! refused, and record updates are merged onto the current record. Every
//! committed write notifies the key's listeners synchronously. Persistent
//! slots are seeded from a [`Backend`](keyslot_store::Backend) when created
//! and saved in the background after each write.
//!
//! ## Key Concepts
//!
//! - **Slot**: one key and its current value
//! - **Snapshot**: an `Arc<Value>` that never changes after it is handed out
//! - **Durability**: whether a slot's writes are saved
//! - **Reconciliation**: adopting a persisted value only when it still fits
//!   the shape of the caller's default
//!
//! ## Usage
//!
//! ```rust
//! use keyslot::{Durability, Registry, Value, WriteOutcome};
//!
//! let registry = Registry::default();
//! let prefs = registry.slot(
//!     "prefs",
//!     Value::record([("theme", Value::from("dark")), ("volume", Value::from(10))]),
//!     Durability::Volatile,
//! );
//!
//! let outcome = prefs.set(Value::record([("volume", Value::from(20))]));
//! assert_eq!(outcome, WriteOutcome::Committed);
//! assert_eq!(prefs.get().get("theme"), Some(&Value::from("dark")));
//!
//! // Same value again: nothing to do.
//! let outcome = prefs.set(Value::record([("volume", Value::from(20))]));
//! assert_eq!(outcome, WriteOutcome::Unchanged);
//! ```
//!
//! ## Re-exports
//!
//! - `keyslot::core` - value model, codec, oracle and merge
//! - `keyslot::store` - backends (SQLite, in-memory)

pub mod config;
pub mod debug;
pub mod error;
pub mod listener;
pub mod persist;
pub mod registry;
pub mod slot;

// Re-export component crates
pub use keyslot_core as core;
pub use keyslot_store as store;

// Re-export main types for convenience
pub use config::{Durability, PersistenceConfig, RegistryConfig, SaveDispatch};
pub use debug::{render, DebugOptions, EntryReport};
pub use error::{Result, SlotError};
pub use listener::{ChannelListener, Listener, ListenerId};
pub use persist::PersistenceAdapter;
pub use registry::{Registry, Subscription, Update, WriteOutcome};
pub use slot::Slot;

// Re-export commonly used core types
pub use keyslot_core::{Callable, Record, Tag, Value};
