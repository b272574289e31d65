//! Deep merge of keyed-records.
//!
//! A merge overlays a partial `source` onto an existing `target`: members
//! present in both are updated (recursively for nested records), members only
//! in the target are kept, and members only in the source are ignored. A
//! merge never adds new members.

use crate::value::{Record, Value};

/// What a merge does with callables already present in the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallablePolicy {
    /// Callables are overwritten like any other member.
    #[default]
    Overwrite,
    /// Existing callables are kept. Used when a persisted snapshot, whose
    /// callables are placeholders, is laid over a live default.
    Preserve,
}

/// Merge `source` into `target` in place and return `target`.
pub fn merge_records<'a>(
    target: &'a mut Record,
    source: &Record,
    policy: CallablePolicy,
) -> &'a mut Record {
    for (name, incoming) in source {
        let Some(existing) = target.get_mut(name) else {
            continue;
        };

        match (existing, incoming) {
            (Value::Record(existing), Value::Record(incoming)) => {
                merge_records(existing, incoming, policy);
            }
            (Value::Callable(_), _) if policy == CallablePolicy::Preserve => {}
            (existing, incoming) => *existing = incoming.clone(),
        }
    }
    target
}

/// [`merge_records`] over values. Does nothing unless both are keyed-records.
pub fn deep_merge<'a>(target: &'a mut Value, source: &Value, policy: CallablePolicy) -> &'a mut Value {
    if let (Value::Record(t), Value::Record(s)) = (&mut *target, source) {
        merge_records(t, s, policy);
    }
    target
}
