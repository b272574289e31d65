//! The closed value model and its classifier.
//!
//! Every datum that flows through a registry is a [`Value`]. The classifier
//! maps a value onto exactly one [`Tag`] from a fixed vocabulary; the only
//! variant without a tag is [`Value::Foreign`], which stands for host objects
//! (live errors, pending futures, ...) that the system refuses to store.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

use crate::error::UnsupportedValue;

/// Named members of a keyed-record, in insertion order.
pub type Record = IndexMap<String, Value>;

/// Classification of a value's shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tag {
    Number,
    String,
    Boolean,
    #[serde(rename = "bigint")]
    BigInt,
    Null,
    Absent,
    Date,
    Regexp,
    Set,
    Map,
    Sequence,
    Record,
    Callable,
}

impl Tag {
    /// Every tag, in classification priority order.
    pub const ALL: [Tag; 13] = [
        Tag::Null,
        Tag::Absent,
        Tag::Number,
        Tag::String,
        Tag::Boolean,
        Tag::BigInt,
        Tag::Date,
        Tag::Regexp,
        Tag::Set,
        Tag::Map,
        Tag::Sequence,
        Tag::Callable,
        Tag::Record,
    ];

    /// Stable lowercase name, shared by the codec and debug output.
    pub const fn as_str(self) -> &'static str {
        match self {
            Tag::Number => "number",
            Tag::String => "string",
            Tag::Boolean => "boolean",
            Tag::BigInt => "bigint",
            Tag::Null => "null",
            Tag::Absent => "absent",
            Tag::Date => "date",
            Tag::Regexp => "regexp",
            Tag::Set => "set",
            Tag::Map => "map",
            Tag::Sequence => "sequence",
            Tag::Record => "record",
            Tag::Callable => "callable",
        }
    }

    /// Parse a tag from its stable name.
    pub fn from_name(name: &str) -> Option<Tag> {
        Tag::ALL.into_iter().find(|tag| tag.as_str() == name)
    }

    /// Null and absent: the two "cleared" states any slot may move to or from.
    pub const fn is_nullish(self) -> bool {
        matches!(self, Tag::Null | Tag::Absent)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A regular expression, kept as source text plus flags.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegexPattern {
    pub pattern: String,
    pub flags: String,
}

impl RegexPattern {
    pub fn new(pattern: impl Into<String>, flags: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            flags: flags.into(),
        }
    }
}

impl fmt::Display for RegexPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.pattern, self.flags)
    }
}

type CallableFn = dyn Fn(&[Value]) -> Value + Send + Sync;

/// Shared behaviour stored inside a value.
///
/// Cloning a callable shares the underlying function; two callables are
/// equal only when they point at the same function. Behaviour is never
/// persisted: decoding a stored callable yields a placeholder that ignores
/// its arguments and returns [`Value::Null`].
#[derive(Clone)]
pub struct Callable {
    func: Arc<CallableFn>,
    placeholder: bool,
}

impl Callable {
    /// Wrap a function.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(func),
            placeholder: false,
        }
    }

    /// The no-op stand-in produced when a callable is decoded.
    pub fn placeholder() -> Self {
        Self {
            func: Arc::new(|_| Value::Null),
            placeholder: true,
        }
    }

    /// Invoke the function.
    pub fn call(&self, args: &[Value]) -> Value {
        (self.func)(args)
    }

    /// Whether this callable was restored from storage rather than supplied live.
    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Callable) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("placeholder", &self.placeholder)
            .finish_non_exhaustive()
    }
}

/// A host object with no supported shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Foreign {
    pub kind: String,
}

/// A dynamic value.
///
/// `Clone` is the deep-clone routine (see [`crate::clone`]).
#[derive(Debug, Default)]
pub enum Value {
    Number(f64),
    String(String),
    Boolean(bool),
    BigInt(BigInt),
    Null,
    /// No value at all.
    #[default]
    Absent,
    Date(DateTime<Utc>),
    Regexp(RegexPattern),
    /// Unique members in insertion order.
    Set(Vec<Value>),
    /// Unique keys in insertion order.
    Map(Vec<(Value, Value)>),
    Sequence(Vec<Value>),
    Record(Record),
    Callable(Callable),
    /// Unsupported host object. Never classifiable.
    Foreign(Foreign),
}

/// Classify a value.
///
/// Total over the supported space; only [`Value::Foreign`] is rejected.
pub fn classify(value: &Value) -> Result<Tag, UnsupportedValue> {
    let tag = match value {
        Value::Null => Tag::Null,
        Value::Absent => Tag::Absent,
        Value::Number(_) => Tag::Number,
        Value::String(_) => Tag::String,
        Value::Boolean(_) => Tag::Boolean,
        Value::BigInt(_) => Tag::BigInt,
        Value::Date(_) => Tag::Date,
        Value::Regexp(_) => Tag::Regexp,
        Value::Set(_) => Tag::Set,
        Value::Map(_) => Tag::Map,
        Value::Sequence(_) => Tag::Sequence,
        Value::Callable(_) => Tag::Callable,
        Value::Record(_) => Tag::Record,
        Value::Foreign(foreign) => {
            return Err(UnsupportedValue {
                kind: foreign.kind.clone(),
            })
        }
    };
    Ok(tag)
}

/// Same-value number equality: `NaN` equals itself, `0.0` and `-0.0` differ.
pub(crate) fn same_number(a: f64, b: f64) -> bool {
    if a.is_nan() && b.is_nan() {
        return true;
    }
    a == b && a.is_sign_negative() == b.is_sign_negative()
}

impl Value {
    /// The value's tag, or `None` when it is unsupported.
    pub fn tag(&self) -> Option<Tag> {
        classify(self).ok()
    }

    /// Whether the value itself is classifiable.
    pub fn is_supported(&self) -> bool {
        self.tag().is_some()
    }

    /// Whether the value and everything reachable from it is classifiable.
    pub fn is_fully_supported(&self) -> bool {
        match self {
            Value::Foreign(_) => false,
            Value::Set(items) | Value::Sequence(items) => {
                items.iter().all(Value::is_fully_supported)
            }
            Value::Map(entries) => entries
                .iter()
                .all(|(k, v)| k.is_fully_supported() && v.is_fully_supported()),
            Value::Record(record) => record.values().all(Value::is_fully_supported),
            _ => true,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }

    pub fn is_record(&self) -> bool {
        matches!(self, Value::Record(_))
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_record_mut(&mut self) -> Option<&mut Record> {
        match self {
            Value::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_callable(&self) -> Option<&Callable> {
        match self {
            Value::Callable(callable) => Some(callable),
            _ => None,
        }
    }

    /// Look up a member of a keyed-record.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_record().and_then(|record| record.get(key))
    }

    /// Build a keyed-record from `(name, value)` pairs.
    pub fn record<I, K>(members: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Value::Record(members.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Build a sequence.
    pub fn sequence<I: IntoIterator<Item = Value>>(items: I) -> Self {
        Value::Sequence(items.into_iter().collect())
    }

    /// Build a set. Members equal to an earlier member are dropped.
    pub fn set<I: IntoIterator<Item = Value>>(items: I) -> Self {
        let mut members: Vec<Value> = Vec::new();
        for item in items {
            if !members.contains(&item) {
                members.push(item);
            }
        }
        Value::Set(members)
    }

    /// Build a map. A repeated key replaces the earlier entry's value in place.
    pub fn map<I: IntoIterator<Item = (Value, Value)>>(entries: I) -> Self {
        let mut pairs: Vec<(Value, Value)> = Vec::new();
        for (key, value) in entries {
            match pairs.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = value,
                None => pairs.push((key, value)),
            }
        }
        Value::Map(pairs)
    }

    pub fn regexp(pattern: impl Into<String>, flags: impl Into<String>) -> Self {
        Value::Regexp(RegexPattern::new(pattern, flags))
    }

    pub fn callable<F>(func: F) -> Self
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        Value::Callable(Callable::new(func))
    }

    pub fn foreign(kind: impl Into<String>) -> Self {
        Value::Foreign(Foreign { kind: kind.into() })
    }
}

impl PartialEq for Value {
    /// Structural equality. Collections compare positionally, numbers use
    /// same-value semantics, callables compare by identity.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => same_number(*a, *b),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::BigInt(a), Value::BigInt(b)) => a == b,
            (Value::Null, Value::Null) | (Value::Absent, Value::Absent) => true,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Regexp(a), Value::Regexp(b)) => a == b,
            (Value::Set(a), Value::Set(b)) | (Value::Sequence(a), Value::Sequence(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Record(a), Value::Record(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(k, v)| b.get(k).is_some_and(|other| v == other))
            }
            (Value::Callable(a), Value::Callable(b)) => a.ptr_eq(b),
            (Value::Foreign(a), Value::Foreign(b)) => a == b,
            _ => false,
        }
    }
}

fn write_joined<T>(
    f: &mut fmt::Formatter<'_>,
    items: impl IntoIterator<Item = T>,
    mut each: impl FnMut(&mut fmt::Formatter<'_>, T) -> fmt::Result,
) -> fmt::Result {
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        each(f, item)?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::BigInt(i) => write!(f, "{}n", i),
            Value::Null => write!(f, "null"),
            Value::Absent => write!(f, "absent"),
            Value::Date(d) => write!(f, "{}", d.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Value::Regexp(re) => write!(f, "{}", re),
            Value::Set(items) => {
                write!(f, "Set {{")?;
                write_joined(f, items, |f, v| write!(f, "{}", v))?;
                write!(f, "}}")
            }
            Value::Map(entries) => {
                write!(f, "Map {{")?;
                write_joined(f, entries, |f, (k, v)| write!(f, "{} => {}", k, v))?;
                write!(f, "}}")
            }
            Value::Sequence(items) => {
                write!(f, "[")?;
                write_joined(f, items, |f, v| write!(f, "{}", v))?;
                write!(f, "]")
            }
            Value::Record(record) => {
                write!(f, "{{")?;
                write_joined(f, record, |f, (k, v)| write!(f, "{}: {}", k, v))?;
                write!(f, "}}")
            }
            Value::Callable(_) => write!(f, "<callable>"),
            Value::Foreign(foreign) => write!(f, "<foreign {}>", foreign.kind),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<f32> for Value {
    fn from(n: f32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(n as f64)
    }
}

/// Numbers are doubles: integers beyond 2^53 lose precision. Use
/// [`Value::BigInt`] for exact large integers.
impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<BigInt> for Value {
    fn from(i: BigInt) -> Self {
        Value::BigInt(i)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Value::Date(d)
    }
}

impl From<RegexPattern> for Value {
    fn from(re: RegexPattern) -> Self {
        Value::Regexp(re)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Record(record)
    }
}

impl From<Callable> for Value {
    fn from(callable: Callable) -> Self {
        Value::Callable(callable)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Sequence(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Null, Into::into)
    }
}
