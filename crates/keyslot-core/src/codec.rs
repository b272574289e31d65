//! Type-preserving text encoding.
//!
//! Values are written as pretty-printed JSON. Shapes JSON cannot express
//! natively are wrapped in an envelope:
//!
//! ```text
//! { "__kind": "<tag>", "__payload": <representation> }
//! ```
//!
//! | kind       | payload                               |
//! |------------|---------------------------------------|
//! | `date`     | RFC 3339 string, UTC                  |
//! | `bigint`   | decimal string                        |
//! | `absent`   | none                                  |
//! | `map`      | array of `[key, value]` pairs         |
//! | `set`      | array of members                      |
//! | `regexp`   | `{ "pattern", "flags" }`              |
//! | `callable` | none (decodes to a placeholder)       |
//! | `number`   | `"NaN"`, `"Infinity"` or `"-Infinity"`|
//! | `record`   | the record, when it has a `__kind` member |
//!
//! Objects whose `__kind` is not one of the kinds above decode as plain
//! keyed-records.

use chrono::{DateTime, SecondsFormat, Utc};
use num_bigint::BigInt;
use serde_json::{Map, Number, Value as Json};

use crate::error::{CodecError, UnsupportedValue};
use crate::value::{Callable, Record, RegexPattern, Tag, Value};

/// Envelope member names.
mod keys {
    pub const KIND: &str = "__kind";
    pub const PAYLOAD: &str = "__payload";
}

/// Encode a value to text.
pub fn serialize(value: &Value) -> Result<String, CodecError> {
    let json = encode(value)?;
    Ok(serde_json::to_string_pretty(&json)?)
}

/// Decode text produced by [`serialize`].
pub fn deserialize(text: &str) -> Result<Value, CodecError> {
    let json: Json = serde_json::from_str(text)?;
    decode(json)
}

/// Encode a value to a JSON tree.
pub fn encode(value: &Value) -> Result<Json, CodecError> {
    let json = match value {
        Value::Number(n) => match Number::from_f64(*n) {
            Some(number) => Json::Number(number),
            None => envelope(Tag::Number, Some(Json::String(non_finite_name(*n).into()))),
        },
        Value::String(s) => Json::String(s.clone()),
        Value::Boolean(b) => Json::Bool(*b),
        Value::Null => Json::Null,
        Value::BigInt(i) => envelope(Tag::BigInt, Some(Json::String(i.to_string()))),
        Value::Absent => envelope(Tag::Absent, None),
        Value::Date(d) => envelope(
            Tag::Date,
            Some(Json::String(d.to_rfc3339_opts(SecondsFormat::AutoSi, true))),
        ),
        Value::Regexp(re) => envelope(Tag::Regexp, Some(serde_json::to_value(re)?)),
        Value::Set(items) => envelope(Tag::Set, Some(encode_all(items)?)),
        Value::Map(entries) => {
            let pairs = entries
                .iter()
                .map(|(k, v)| Ok(Json::Array(vec![encode(k)?, encode(v)?])))
                .collect::<Result<Vec<_>, CodecError>>()?;
            envelope(Tag::Map, Some(Json::Array(pairs)))
        }
        Value::Sequence(items) => encode_all(items)?,
        Value::Record(record) => {
            let mut object = Map::with_capacity(record.len());
            for (name, member) in record {
                object.insert(name.clone(), encode(member)?);
            }
            if record.contains_key(keys::KIND) {
                envelope(Tag::Record, Some(Json::Object(object)))
            } else {
                Json::Object(object)
            }
        }
        Value::Callable(_) => envelope(Tag::Callable, None),
        Value::Foreign(foreign) => {
            return Err(UnsupportedValue {
                kind: foreign.kind.clone(),
            }
            .into())
        }
    };
    Ok(json)
}

/// Decode a JSON tree.
pub fn decode(json: Json) -> Result<Value, CodecError> {
    match json {
        Json::Null => Ok(Value::Null),
        Json::Bool(b) => Ok(Value::Boolean(b)),
        Json::Number(n) => n
            .as_f64()
            .map(Value::Number)
            .ok_or_else(|| CodecError::malformed(Tag::Number, format!("{} is not a double", n))),
        Json::String(s) => Ok(Value::String(s)),
        Json::Array(items) => Ok(Value::Sequence(decode_all(items)?)),
        Json::Object(object) => match envelope_kind(&object) {
            Some(kind) => decode_envelope(kind, object),
            None => Ok(Value::Record(decode_record(object)?)),
        },
    }
}

fn envelope(kind: Tag, payload: Option<Json>) -> Json {
    let mut object = Map::with_capacity(2);
    object.insert(keys::KIND.into(), Json::String(kind.as_str().into()));
    if let Some(payload) = payload {
        object.insert(keys::PAYLOAD.into(), payload);
    }
    Json::Object(object)
}

/// The envelope kind of an object, if it is a recognized envelope.
fn envelope_kind(object: &Map<String, Json>) -> Option<Tag> {
    let kind = match object.get(keys::KIND) {
        Some(Json::String(kind)) => Tag::from_name(kind)?,
        _ => return None,
    };
    match kind {
        Tag::Date
        | Tag::BigInt
        | Tag::Absent
        | Tag::Map
        | Tag::Set
        | Tag::Regexp
        | Tag::Callable
        | Tag::Number
        | Tag::Record => Some(kind),
        _ => None,
    }
}

fn decode_envelope(kind: Tag, mut object: Map<String, Json>) -> Result<Value, CodecError> {
    let payload = object.remove(keys::PAYLOAD);

    match (kind, payload) {
        (Tag::Absent, _) => Ok(Value::Absent),
        (Tag::Callable, _) => Ok(Value::Callable(Callable::placeholder())),
        (Tag::BigInt, Some(Json::String(digits))) => digits
            .parse::<BigInt>()
            .map(Value::BigInt)
            .map_err(|e| CodecError::malformed(kind, e.to_string())),
        (Tag::Date, Some(Json::String(iso))) => DateTime::parse_from_rfc3339(&iso)
            .map(|d| Value::Date(d.with_timezone(&Utc)))
            .map_err(|e| CodecError::malformed(kind, e.to_string())),
        (Tag::Number, Some(Json::String(name))) => parse_non_finite(&name)
            .map(Value::Number)
            .ok_or_else(|| CodecError::malformed(kind, format!("unknown number {:?}", name))),
        (Tag::Regexp, Some(payload)) => serde_json::from_value::<RegexPattern>(payload)
            .map(Value::Regexp)
            .map_err(|e| CodecError::malformed(kind, e.to_string())),
        (Tag::Set, Some(Json::Array(items))) => Ok(Value::set(decode_all(items)?)),
        (Tag::Map, Some(Json::Array(pairs))) => {
            let mut entries = Vec::with_capacity(pairs.len());
            for pair in pairs {
                match pair {
                    Json::Array(kv) if kv.len() == 2 => {
                        let mut kv = kv.into_iter();
                        let (Some(k), Some(v)) = (kv.next(), kv.next()) else {
                            return Err(CodecError::malformed(kind, "entry is not a pair"));
                        };
                        entries.push((decode(k)?, decode(v)?));
                    }
                    _ => return Err(CodecError::malformed(kind, "entry is not a pair")),
                }
            }
            Ok(Value::map(entries))
        }
        (Tag::Record, Some(Json::Object(members))) => Ok(Value::Record(decode_record(members)?)),
        (_, None) => Err(CodecError::malformed(kind, "missing payload")),
        (_, Some(_)) => Err(CodecError::malformed(kind, "unexpected payload shape")),
    }
}

fn encode_all(items: &[Value]) -> Result<Json, CodecError> {
    Ok(Json::Array(
        items.iter().map(encode).collect::<Result<Vec<_>, _>>()?,
    ))
}

fn decode_all(items: Vec<Json>) -> Result<Vec<Value>, CodecError> {
    items.into_iter().map(decode).collect()
}

fn decode_record(object: Map<String, Json>) -> Result<Record, CodecError> {
    let mut record = Record::with_capacity(object.len());
    for (name, member) in object {
        record.insert(name, decode(member)?);
    }
    Ok(record)
}

fn non_finite_name(n: f64) -> &'static str {
    if n.is_nan() {
        "NaN"
    } else if n.is_sign_positive() {
        "Infinity"
    } else {
        "-Infinity"
    }
}

fn parse_non_finite(name: &str) -> Option<f64> {
    match name {
        "NaN" => Some(f64::NAN),
        "Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{compare_full, Comparison};
    use chrono::TimeZone;

    fn roundtrip(value: &Value) -> Value {
        let text = serialize(value).unwrap();
        deserialize(&text).unwrap()
    }

    #[test]
    fn test_plain_record_text() {
        let value = Value::record([("theme", Value::from("dark"))]);
        assert_eq!(serialize(&value).unwrap(), "{\n  \"theme\": \"dark\"\n}");
    }

    #[test]
    fn test_envelope_shapes_roundtrip() {
        let date = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        let values = vec![
            Value::from(date),
            Value::from("123456789012345678901234567890".parse::<BigInt>().unwrap()),
            Value::Absent,
            Value::map([
                (Value::from("a"), Value::from(1)),
                (Value::from(2), Value::from(vec!["x"])),
            ]),
            Value::set([Value::from(1), Value::from("two")]),
            Value::regexp("^a+$", "gi"),
            Value::from(f64::NAN),
            Value::from(f64::INFINITY),
            Value::from(f64::NEG_INFINITY),
            Value::from(-0.0),
        ];

        for value in values {
            let decoded = roundtrip(&value);
            assert_eq!(decoded, value, "roundtrip of {}", value);
            assert_eq!(compare_full(&value, &decoded), Comparison::Equal);
        }
    }

    #[test]
    fn test_date_is_iso_8601() {
        let date = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        let json = encode(&Value::from(date)).unwrap();
        assert_eq!(json[keys::PAYLOAD], Json::String("2024-03-01T12:30:00Z".into()));
    }

    #[test]
    fn test_nested_values_roundtrip() {
        let value = Value::record([
            ("name", Value::from("prefs")),
            ("volume", Value::from(10)),
            ("missing", Value::Absent),
            ("cleared", Value::Null),
            (
                "history",
                Value::sequence([
                    Value::record([("at", Value::from(Utc.timestamp_millis_opt(0).unwrap()))]),
                    Value::set([Value::from(true)]),
                ]),
            ),
        ]);
        assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn test_callable_decodes_to_placeholder() {
        let value = Value::record([("on_save", Value::callable(|_| Value::from(1)))]);
        let decoded = roundtrip(&value);
        let callable = decoded.get("on_save").and_then(Value::as_callable).unwrap();
        assert!(callable.is_placeholder());
        assert_eq!(callable.call(&[]), Value::Null);

        // Re-encoding the placeholder yields the same document.
        assert_eq!(serialize(&decoded).unwrap(), serialize(&value).unwrap());
    }

    #[test]
    fn test_decoded_collections_drop_duplicates() {
        let set = deserialize(r#"{ "__kind": "set", "__payload": [1, 1, 2] }"#).unwrap();
        assert_eq!(set, Value::set([Value::from(1), Value::from(2)]));
        assert_eq!(
            compare_full(&Value::set([Value::from(1)]), &deserialize(r#"{ "__kind": "set", "__payload": [1, 1] }"#).unwrap()),
            Comparison::Equal
        );

        let map = deserialize(r#"{ "__kind": "map", "__payload": [["a", 1], ["a", 2]] }"#).unwrap();
        assert_eq!(map, Value::map([(Value::from("a"), Value::from(2))]));
    }

    #[test]
    fn test_record_with_kind_member_is_escaped() {
        let value = Value::record([
            ("__kind", Value::from("date")),
            ("__payload", Value::from("not a date")),
        ]);
        let text = serialize(&value).unwrap();
        assert_eq!(deserialize(&text).unwrap(), value);
    }

    #[test]
    fn test_unknown_envelope_passes_through() {
        let text = r#"{ "__kind": "promise", "__payload": 3 }"#;
        let decoded = deserialize(text).unwrap();
        assert_eq!(
            decoded,
            Value::record([
                ("__kind", Value::from("promise")),
                ("__payload", Value::from(3)),
            ])
        );
    }

    #[test]
    fn test_malformed_envelope_is_an_error() {
        let text = r#"{ "__kind": "date", "__payload": "yesterday" }"#;
        assert!(matches!(
            deserialize(text),
            Err(CodecError::Malformed { kind: Tag::Date, .. })
        ));

        let text = r#"{ "__kind": "bigint" }"#;
        assert!(matches!(
            deserialize(text),
            Err(CodecError::Malformed { kind: Tag::BigInt, .. })
        ));
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(matches!(deserialize("{ nope"), Err(CodecError::Json(_))));
    }

    #[test]
    fn test_foreign_cannot_be_encoded() {
        let value = Value::sequence([Value::foreign("error")]);
        assert!(matches!(serialize(&value), Err(CodecError::Unsupported(_))));
    }

    #[test]
    fn test_record_order_preserved() {
        let value = Value::record([
            ("z", Value::from(1)),
            ("a", Value::from(2)),
            ("m", Value::from(3)),
        ]);
        let decoded = roundtrip(&value);
        let names: Vec<&str> = decoded.as_record().unwrap().keys().map(String::as_str).collect();
        assert_eq!(names, vec!["z", "a", "m"]);
    }
}
