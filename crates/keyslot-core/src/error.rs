//! Error types for keyslot-core.

use thiserror::Error;

use crate::value::Tag;

/// A value whose shape is outside the supported vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported value: {kind}")]
pub struct UnsupportedValue {
    /// Host-side description of the rejected object.
    pub kind: String,
}

/// Errors raised while encoding or decoding persisted text.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("cannot encode {0}")]
    Unsupported(#[from] UnsupportedValue),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed {kind} envelope: {reason}")]
    Malformed { kind: Tag, reason: String },
}

impl CodecError {
    pub(crate) fn malformed(kind: Tag, reason: impl Into<String>) -> Self {
        CodecError::Malformed {
            kind,
            reason: reason.into(),
        }
    }
}
