//! Deep clone.
//!
//! The returned value shares no composite member with the original, so it can
//! be mutated (merged into, patched) without affecting the source. Callables
//! are the exception: the clone points at the same behaviour.

use crate::value::{Callable, Value};

impl Clone for Value {
    fn clone(&self) -> Self {
        match self {
            Value::Number(n) => Value::Number(*n),
            Value::String(s) => Value::String(s.clone()),
            Value::Boolean(b) => Value::Boolean(*b),
            Value::BigInt(i) => Value::BigInt(i.clone()),
            Value::Null => Value::Null,
            Value::Absent => Value::Absent,
            Value::Date(d) => Value::Date(*d),
            Value::Regexp(re) => Value::Regexp(re.clone()),
            Value::Set(items) => Value::Set(items.iter().map(Value::clone).collect()),
            Value::Map(entries) => Value::Map(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            ),
            Value::Sequence(items) => Value::Sequence(items.iter().map(Value::clone).collect()),
            Value::Record(record) => Value::Record(
                record
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            ),
            Value::Callable(callable) => Value::Callable(Callable::clone(callable)),
            Value::Foreign(foreign) => Value::Foreign(foreign.clone()),
        }
    }
}
