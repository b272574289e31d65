//! Proptest generators for property-based testing.
//!
//! Every strategy here yields fully supported values without callables, so
//! the output survives an encode/decode trip unchanged.

use chrono::{DateTime, Utc};
use num_bigint::BigInt;
use proptest::collection::vec;
use proptest::prelude::*;

use keyslot_core::Value;

/// Generate any `f64`, including NaN, infinities and negative zero.
pub fn number() -> impl Strategy<Value = f64> {
    prop_oneof![
        4 => any::<f64>(),
        1 => Just(f64::NAN),
        1 => Just(f64::INFINITY),
        1 => Just(f64::NEG_INFINITY),
        1 => Just(-0.0),
    ]
}

/// Generate a date between 1970 and 2100 at millisecond precision.
pub fn date() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..4_102_444_800_000).prop_filter_map("timestamp out of range", DateTime::from_timestamp_millis)
}

/// Generate a record member name. Occasionally collides with the codec's
/// envelope field names.
pub fn member_name() -> impl Strategy<Value = String> {
    prop_oneof![
        8 => "[a-z][a-z0-9_]{0,7}".prop_map(String::from),
        1 => Just("__kind".to_string()),
        1 => Just("__payload".to_string()),
    ]
}

/// Generate a non-collection value.
pub fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        number().prop_map(Value::Number),
        "\\PC{0,16}".prop_map(Value::from),
        any::<bool>().prop_map(Value::Boolean),
        any::<i64>().prop_map(|i| Value::BigInt(BigInt::from(i))),
        Just(Value::Null),
        Just(Value::Absent),
        date().prop_map(Value::Date),
        ("[a-z.+*]{1,8}", "[gimsuy]{0,3}").prop_map(|(p, f)| Value::regexp(p, f)),
    ]
}

/// Generate a value, nesting collections up to a few levels deep.
pub fn value() -> impl Strategy<Value = Value> {
    scalar().prop_recursive(3, 48, 4, |inner| {
        prop_oneof![
            vec(inner.clone(), 0..4).prop_map(Value::Sequence),
            vec(inner.clone(), 0..4).prop_map(Value::set),
            vec((inner.clone(), inner.clone()), 0..4).prop_map(Value::map),
            vec((member_name(), inner), 0..4).prop_map(Value::record),
        ]
    })
}

/// Generate a keyed-record whose members are arbitrary values.
pub fn record() -> impl Strategy<Value = Value> {
    vec((member_name(), value()), 0..6).prop_map(Value::record)
}
