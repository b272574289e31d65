//! Golden codec vectors.
//!
//! Each vector pairs a value with the JSON document the codec must produce
//! for it. Documents are compared structurally, so the expected text below
//! is compact while the codec itself pretty-prints.

use chrono::DateTime;
use num_bigint::BigInt;
use serde::Serialize;
use serde_json::Value as Json;

use keyslot_core::codec::{decode, encode};
use keyslot_core::Value;

/// A golden codec vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// What the vector covers.
    pub description: &'static str,
    /// Builds the input value.
    pub build: fn() -> Value,
    /// Expected encoding.
    pub expected: &'static str,
}

/// Outcome of checking one vector.
#[derive(Debug, Clone, Serialize)]
pub struct VectorReport {
    pub name: String,
    /// Encoding matched `expected`.
    pub encodes: bool,
    /// Decoding `expected` gave back the input value.
    pub decodes: bool,
    /// What the codec actually produced.
    pub actual: Json,
}

impl VectorReport {
    pub fn passed(&self) -> bool {
        self.encodes && self.decodes
    }
}

/// Get all golden vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "plain_record",
            description: "Records without special members are plain objects",
            build: || Value::record([("theme", Value::from("dark")), ("volume", Value::from(10))]),
            expected: r#"{"theme":"dark","volume":10.0}"#,
        },
        GoldenVector {
            name: "date",
            description: "Dates are RFC 3339 strings in UTC",
            build: || DateTime::from_timestamp(1_709_296_200, 0).map_or(Value::Null, Value::Date),
            expected: r#"{"__kind":"date","__payload":"2024-03-01T12:30:00Z"}"#,
        },
        GoldenVector {
            name: "bigint",
            description: "Big integers are decimal strings",
            build: || Value::BigInt(BigInt::from(123_456_789_012_345_678_901_234_567_890u128)),
            expected: r#"{"__kind":"bigint","__payload":"123456789012345678901234567890"}"#,
        },
        GoldenVector {
            name: "absent",
            description: "Absent has no payload",
            build: || Value::Absent,
            expected: r#"{"__kind":"absent"}"#,
        },
        GoldenVector {
            name: "map",
            description: "Maps are [key, value] pairs in insertion order",
            build: || {
                Value::map([
                    (Value::from("a"), Value::from(1)),
                    (Value::from(2), Value::from(vec!["x"])),
                ])
            },
            expected: r#"{"__kind":"map","__payload":[["a",1.0],[2.0,["x"]]]}"#,
        },
        GoldenVector {
            name: "set",
            description: "Sets are member arrays",
            build: || Value::set([Value::from(1), Value::from("two")]),
            expected: r#"{"__kind":"set","__payload":[1.0,"two"]}"#,
        },
        GoldenVector {
            name: "regexp",
            description: "Regular expressions keep pattern and flags",
            build: || Value::regexp("^a+$", "gi"),
            expected: r#"{"__kind":"regexp","__payload":{"pattern":"^a+$","flags":"gi"}}"#,
        },
        GoldenVector {
            name: "nan",
            description: "Non-finite numbers are named",
            build: || Value::Number(f64::NAN),
            expected: r#"{"__kind":"number","__payload":"NaN"}"#,
        },
        GoldenVector {
            name: "negative_infinity",
            description: "Non-finite numbers are named",
            build: || Value::Number(f64::NEG_INFINITY),
            expected: r#"{"__kind":"number","__payload":"-Infinity"}"#,
        },
        GoldenVector {
            name: "escaped_record",
            description: "Records with a __kind member are wrapped",
            build: || {
                Value::record([
                    ("__kind", Value::from("date")),
                    ("__payload", Value::from("x")),
                ])
            },
            expected: r#"{"__kind":"record","__payload":{"__kind":"date","__payload":"x"}}"#,
        },
        GoldenVector {
            name: "nested_sequence",
            description: "Sequences are arrays; nulls stay null",
            build: || Value::sequence([Value::Null, Value::from(true), Value::Absent]),
            expected: r#"[null,true,{"__kind":"absent"}]"#,
        },
    ]
}

/// Check one vector in both directions.
pub fn verify_vector(vector: &GoldenVector) -> VectorReport {
    let value = (vector.build)();
    let expected: Json = serde_json::from_str(vector.expected).unwrap_or(Json::Null);

    let actual = encode(&value).unwrap_or(Json::Null);
    let decodes = decode(expected.clone()).map_or(false, |decoded| decoded == value);

    VectorReport {
        name: vector.name.to_string(),
        encodes: actual == expected,
        decodes,
        actual,
    }
}

/// Verify all golden vectors.
///
/// Call this to verify your codec matches the reference documents.
pub fn verify_all_vectors() -> Vec<VectorReport> {
    all_vectors().iter().map(verify_vector).collect()
}
