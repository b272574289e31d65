//! # keyslot core
//!
//! Pure primitives for keyslot: the value model, classification, deep clone,
//! the text codec, the change-detection oracle and deep merge.
//!
//! This crate contains no I/O and no shared state. It is pure computation
//! over [`Value`]s.
//!
//! ## Key Types
//!
//! - [`Value`] - Closed sum type over every supported shape
//! - [`Tag`] - Classification of a value's shape
//! - [`Comparison`] - Three-valued verdict of the oracle
//! - [`CallablePolicy`] - How a merge treats callables in its target
//!
//! ## How the pieces fit
//!
//! A candidate write goes through [`is_valid_change`]. When it is accepted
//! and both sides are keyed-records, the candidate is laid over a clone of the
//! current value with [`deep_merge`]; other shapes replace the current value
//! outright. Persisted values are written with [`serialize`] and read back
//! with [`deserialize`].

pub mod clone;
pub mod codec;
pub mod error;
pub mod merge;
pub mod oracle;
pub mod value;

pub use codec::{deserialize, serialize};
pub use error::{CodecError, UnsupportedValue};
pub use merge::{deep_merge, merge_records, CallablePolicy};
pub use oracle::{compare, compare_full, is_valid_change, is_valid_change_with, ChangeMode, Comparison};
pub use value::{classify, Callable, Foreign, Record, RegexPattern, Tag, Value};
