//! Error types for keyslot.

use keyslot_core::CodecError;
use keyslot_store::StoreError;
use thiserror::Error;

/// Errors surfaced by the persistence layer.
///
/// The registry itself never returns these: a failed load falls back to the
/// caller's default and a failed save is logged and dropped.
#[derive(Debug, Error)]
pub enum SlotError {
    /// Persisted text could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Backend error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// The background save worker could not be started.
    #[error("save worker error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for keyslot operations.
pub type Result<T> = std::result::Result<T, SlotError>;
