//! Change detection.
//!
//! [`is_valid_change`] decides whether a candidate value is a meaningful,
//! type-compatible update of the current one. Underneath it sits a
//! three-valued comparison:
//!
//! - `Equal`: nothing observable would change.
//! - `Different`: the candidate is a genuine update.
//! - `Incompatible`: the candidate cannot be reconciled with the current
//!   shape and must be dropped, not merged.
//!
//! Keyed-records compare in one of two modes. A top-level write is a patch,
//! so only the members both sides share are compared (partial mode). A record
//! nested inside a sequence, set or map element must match member for member
//! to count as the same record (full mode).

use crate::value::{same_number, Record, Tag, Value};

/// Result of comparing a current value with a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Equal,
    Different,
    Incompatible,
}

/// Which gate a candidate goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChangeMode {
    /// A live write: top-level records compare partially.
    #[default]
    Patch,
    /// A persisted value being reconciled against a live default:
    /// top-level records compare fully.
    Reconcile,
}

/// Record comparison mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordMode {
    Partial,
    Full,
}

/// Write gate: whether `next` is a meaningful, compatible change of `current`.
pub fn is_valid_change(current: &Value, next: &Value) -> bool {
    is_valid_change_with(current, next, ChangeMode::Patch)
}

/// [`is_valid_change`] with an explicit gate mode.
pub fn is_valid_change_with(current: &Value, next: &Value, mode: ChangeMode) -> bool {
    let Some(next_tag) = next.tag() else {
        return false;
    };
    let Some(current_tag) = current.tag() else {
        return next_tag.is_nullish();
    };

    if current_tag != next_tag {
        return is_nullish_transition(current_tag, next_tag);
    }

    let verdict = match mode {
        ChangeMode::Patch => compare(current, next),
        ChangeMode::Reconcile => compare_full(current, next),
    };
    verdict == Comparison::Different
}

/// Compare two values, with top-level records in partial mode.
pub fn compare(current: &Value, next: &Value) -> Comparison {
    compare_in(current, next, RecordMode::Partial)
}

/// Compare two values, with records in full mode throughout.
pub fn compare_full(current: &Value, next: &Value) -> Comparison {
    compare_in(current, next, RecordMode::Full)
}

/// A typed value may always be cleared to null/absent, and vice versa.
fn is_nullish_transition(current: Tag, next: Tag) -> bool {
    current != next && (current.is_nullish() || next.is_nullish())
}

fn same_tag(a: &Value, b: &Value) -> bool {
    a.tag().is_some() && a.tag() == b.tag()
}

fn compare_in(current: &Value, next: &Value, mode: RecordMode) -> Comparison {
    let equal = match (current, next) {
        (Value::Number(a), Value::Number(b)) => same_number(*a, *b),
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Boolean(a), Value::Boolean(b)) => a == b,
        (Value::BigInt(a), Value::BigInt(b)) => a == b,
        (Value::Null, Value::Null) | (Value::Absent, Value::Absent) => true,
        (Value::Date(a), Value::Date(b)) => a == b,
        (Value::Regexp(a), Value::Regexp(b)) => a == b,
        (Value::Callable(a), Value::Callable(b)) => a.ptr_eq(b),
        (Value::Sequence(a), Value::Sequence(b)) => return compare_sequences(a, b),
        (Value::Set(a), Value::Set(b)) => return compare_sets(a, b),
        (Value::Map(a), Value::Map(b)) => return compare_maps(a, b),
        (Value::Record(a), Value::Record(b)) => return compare_records(a, b, mode),
        _ => false,
    };

    if equal {
        Comparison::Equal
    } else {
        Comparison::Different
    }
}

/// Element comparison inside collections: records in full mode.
fn compare_element(current: &Value, next: &Value) -> Comparison {
    compare_full(current, next)
}

/// Shared prelude for collections. `None` means "keep comparing".
fn collection_prelude<'a>(
    current_len: usize,
    next_len: usize,
    mut next_values: impl Iterator<Item = &'a Value>,
) -> Option<Comparison> {
    if current_len == 0 && next_len == 0 {
        return Some(Comparison::Equal);
    }
    if next_len == 0 {
        return Some(Comparison::Different);
    }
    if !next_values.all(Value::is_supported) {
        return Some(Comparison::Incompatible);
    }
    if current_len != next_len {
        return Some(Comparison::Different);
    }
    None
}

fn compare_sequences(current: &[Value], next: &[Value]) -> Comparison {
    if let Some(verdict) = collection_prelude(current.len(), next.len(), next.iter()) {
        return verdict;
    }

    for (a, b) in current.iter().zip(next) {
        if !same_tag(a, b) {
            return Comparison::Different;
        }
        match compare_element(a, b) {
            Comparison::Equal => continue,
            other => return other,
        }
    }
    Comparison::Equal
}

fn compare_sets(current: &[Value], next: &[Value]) -> Comparison {
    if let Some(verdict) = collection_prelude(current.len(), next.len(), next.iter()) {
        return verdict;
    }

    for a in current {
        let mut found = false;
        for b in next.iter().filter(|b| same_tag(a, b)) {
            match compare_element(a, b) {
                Comparison::Incompatible => return Comparison::Incompatible,
                Comparison::Equal => {
                    found = true;
                    break;
                }
                Comparison::Different => {}
            }
        }
        if !found {
            return Comparison::Different;
        }
    }
    Comparison::Equal
}

fn compare_maps(current: &[(Value, Value)], next: &[(Value, Value)]) -> Comparison {
    let next_values = next.iter().flat_map(|(k, v)| [k, v]);
    if let Some(verdict) = collection_prelude(current.len(), next.len(), next_values) {
        return verdict;
    }

    for (current_key, current_value) in current {
        let mut matched = None;
        for (next_key, next_value) in next.iter().filter(|(k, _)| same_tag(current_key, k)) {
            match compare_element(current_key, next_key) {
                Comparison::Incompatible => return Comparison::Incompatible,
                Comparison::Equal => {
                    matched = Some(next_value);
                    break;
                }
                Comparison::Different => {}
            }
        }

        let Some(next_value) = matched else {
            return Comparison::Different;
        };
        if !same_tag(current_value, next_value) {
            return Comparison::Different;
        }
        match compare_element(current_value, next_value) {
            Comparison::Equal => {}
            other => return other,
        }
    }
    Comparison::Equal
}

/// `Different` when every value in `next` is supported, else `Incompatible`.
fn verdict_for_reshape(next: &Record) -> Comparison {
    if next.values().all(Value::is_fully_supported) {
        Comparison::Different
    } else {
        Comparison::Incompatible
    }
}

fn compare_records(current: &Record, next: &Record, mode: RecordMode) -> Comparison {
    if current.is_empty() && next.is_empty() {
        return Comparison::Equal;
    }
    if next.is_empty() {
        return Comparison::Different;
    }
    if current.is_empty() {
        return verdict_for_reshape(next);
    }
    if mode == RecordMode::Full && current.len() != next.len() {
        return verdict_for_reshape(next);
    }

    let common: Vec<(&Value, &Value)> = current
        .iter()
        .filter_map(|(name, a)| next.get(name).map(|b| (a, b)))
        .collect();

    if common.is_empty() {
        return match mode {
            RecordMode::Partial => Comparison::Incompatible,
            RecordMode::Full => Comparison::Different,
        };
    }

    let mut all_equal = true;
    for (a, b) in common {
        let Some(next_tag) = b.tag() else {
            return Comparison::Incompatible;
        };

        let verdict = match (mode, a.tag()) {
            (_, Some(current_tag)) if current_tag == next_tag => compare_in(a, b, mode),
            (RecordMode::Full, _) => Comparison::Different,
            (RecordMode::Partial, current_tag) => {
                let clearing = match current_tag {
                    Some(current_tag) => is_nullish_transition(current_tag, next_tag),
                    None => next_tag.is_nullish(),
                };
                if clearing {
                    Comparison::Different
                } else {
                    Comparison::Incompatible
                }
            }
        };

        match verdict {
            Comparison::Incompatible => return Comparison::Incompatible,
            Comparison::Different => all_equal = false,
            Comparison::Equal => {}
        }
    }

    if all_equal {
        Comparison::Equal
    } else {
        Comparison::Different
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn rec(members: Vec<(&str, Value)>) -> Value {
        Value::record(members)
    }

    #[test]
    fn test_nullish_transitions() {
        assert!(is_valid_change(&Value::Null, &Value::from(5)));
        assert!(is_valid_change(&Value::from(5), &Value::Null));
        assert!(is_valid_change(&Value::Absent, &Value::from("x")));
        assert!(is_valid_change(&Value::from("x"), &Value::Absent));
        assert!(is_valid_change(&Value::Null, &Value::Absent));
        assert!(!is_valid_change(&Value::from(5), &Value::from("5")));
        assert!(!is_valid_change(&Value::Null, &Value::Null));
    }

    #[test]
    fn test_unsupported_next_is_rejected() {
        assert!(!is_valid_change(&Value::Null, &Value::foreign("promise")));
        assert!(is_valid_change(&Value::foreign("promise"), &Value::Null));
        assert!(!is_valid_change(&Value::foreign("promise"), &Value::from(1)));
    }

    #[test]
    fn test_primitives() {
        assert_eq!(compare(&Value::from(1), &Value::from(1)), Comparison::Equal);
        assert_eq!(compare(&Value::from(1), &Value::from(2)), Comparison::Different);
        assert_eq!(compare(&Value::from(f64::NAN), &Value::from(f64::NAN)), Comparison::Equal);
        assert!(!is_valid_change(&Value::from("a"), &Value::from("a")));
        assert!(is_valid_change(&Value::from(true), &Value::from(false)));
    }

    #[test]
    fn test_dates_by_instant_and_regex_by_source() {
        let a = Utc.timestamp_millis_opt(1_000).unwrap();
        let b = Utc.timestamp_millis_opt(2_000).unwrap();
        assert_eq!(compare(&Value::from(a), &Value::from(a)), Comparison::Equal);
        assert_eq!(compare(&Value::from(a), &Value::from(b)), Comparison::Different);

        assert_eq!(
            compare(&Value::regexp("a+", "g"), &Value::regexp("a+", "g")),
            Comparison::Equal
        );
        assert_eq!(
            compare(&Value::regexp("a+", "g"), &Value::regexp("a+", "i")),
            Comparison::Different
        );
    }

    #[test]
    fn test_callables_by_identity() {
        let f = Value::callable(|_| Value::Null);
        assert_eq!(compare(&f, &f.clone()), Comparison::Equal);
        assert_eq!(
            compare(&f, &Value::callable(|_| Value::Null)),
            Comparison::Different
        );
    }

    #[test]
    fn test_sequences() {
        let s = |xs: Vec<i32>| Value::from(xs);
        assert_eq!(compare(&s(vec![1, 2, 3]), &s(vec![1, 2, 3])), Comparison::Equal);
        assert_eq!(compare(&s(vec![1, 2]), &s(vec![1, 2, 3])), Comparison::Different);
        assert_eq!(compare(&s(vec![1, 2]), &s(vec![])), Comparison::Different);
        assert_eq!(compare(&s(vec![]), &s(vec![])), Comparison::Equal);
        assert_eq!(
            compare(&s(vec![1]), &Value::sequence([Value::foreign("error")])),
            Comparison::Incompatible
        );
        assert_eq!(
            compare(&s(vec![1]), &Value::from(vec!["1"])),
            Comparison::Different
        );
    }

    #[test]
    fn test_sequence_elements_use_full_mode() {
        let current = Value::sequence([rec(vec![("a", 1.into()), ("b", 2.into())])]);
        let next = Value::sequence([rec(vec![("a", 1.into())])]);
        assert_eq!(compare(&current, &next), Comparison::Different);
    }

    #[test]
    fn test_sets() {
        let current = Value::set([Value::from(1), Value::from("a")]);
        let reordered = Value::set([Value::from("a"), Value::from(1)]);
        assert_eq!(compare(&current, &reordered), Comparison::Equal);

        let changed = Value::set([Value::from("a"), Value::from(2)]);
        assert_eq!(compare(&current, &changed), Comparison::Different);

        let bigger = Value::set([Value::from(1), Value::from("a"), Value::from(3)]);
        assert_eq!(compare(&current, &bigger), Comparison::Different);

        let bad = Value::set([Value::from(1), Value::foreign("error")]);
        assert_eq!(compare(&current, &bad), Comparison::Incompatible);

        let records = Value::set([rec(vec![("id", 1.into())])]);
        assert_eq!(
            compare(&records, &Value::set([rec(vec![("id", 1.into())])])),
            Comparison::Equal
        );
    }

    #[test]
    fn test_maps() {
        let current = Value::map([(Value::from("a"), Value::from(1))]);
        assert_eq!(
            compare(&current, &Value::map([(Value::from("a"), Value::from(1))])),
            Comparison::Equal
        );
        assert_eq!(
            compare(&current, &Value::map([(Value::from("a"), Value::from(2))])),
            Comparison::Different
        );
        assert_eq!(
            compare(&current, &Value::map([(Value::from("b"), Value::from(1))])),
            Comparison::Different
        );
        assert_eq!(
            compare(&current, &Value::map([(Value::from("a"), Value::foreign("error"))])),
            Comparison::Incompatible
        );
    }

    #[test]
    fn test_partial_records() {
        let current = rec(vec![("a", 1.into()), ("b", 2.into())]);
        assert_eq!(compare(&current, &rec(vec![("a", 1.into())])), Comparison::Equal);
        assert_eq!(compare(&current, &rec(vec![("a", 5.into())])), Comparison::Different);
        assert_eq!(
            compare(&current, &rec(vec![("c", 3.into())])),
            Comparison::Incompatible
        );
        assert_eq!(
            compare(&current, &rec(vec![("a", "one".into())])),
            Comparison::Incompatible
        );
        assert_eq!(
            compare(&current, &rec(vec![("a", Value::Null)])),
            Comparison::Different
        );
        assert_eq!(
            compare(&current, &rec(vec![("a", Value::foreign("error"))])),
            Comparison::Incompatible
        );
    }

    #[test]
    fn test_partial_mode_nested_records_stay_partial() {
        let current = rec(vec![(
            "audio",
            rec(vec![("volume", 10.into()), ("muted", false.into())]),
        )]);
        let patch = rec(vec![("audio", rec(vec![("volume", 10.into())]))]);
        assert_eq!(compare(&current, &patch), Comparison::Equal);

        let patch = rec(vec![("audio", rec(vec![("volume", 20.into())]))]);
        assert_eq!(compare(&current, &patch), Comparison::Different);
    }

    #[test]
    fn test_full_records() {
        let current = rec(vec![("a", 1.into())]);
        assert_eq!(
            compare_full(&current, &rec(vec![("a", 1.into()), ("b", 2.into())])),
            Comparison::Different
        );
        assert_eq!(
            compare_full(&current, &rec(vec![("a", 1.into()), ("b", Value::foreign("e"))])),
            Comparison::Incompatible
        );
        assert_eq!(compare_full(&current, &rec(vec![("c", 1.into())])), Comparison::Different);
        assert_eq!(compare_full(&current, &rec(vec![("a", 1.into())])), Comparison::Equal);
        assert_eq!(
            compare_full(&current, &rec(vec![("a", "1".into())])),
            Comparison::Different
        );
    }

    #[test]
    fn test_empty_records() {
        let empty = rec(vec![]);
        assert_eq!(compare(&empty, &empty), Comparison::Equal);
        assert_eq!(compare(&rec(vec![("a", 1.into())]), &empty), Comparison::Different);
        assert_eq!(compare(&empty, &rec(vec![("a", 1.into())])), Comparison::Different);
    }

    #[test]
    fn test_reconcile_mode_uses_full_compare() {
        let default = rec(vec![("a", 1.into()), ("b", 2.into())]);
        let persisted = rec(vec![("a", 1.into())]);

        assert!(!is_valid_change_with(&default, &persisted, ChangeMode::Patch));
        assert!(is_valid_change_with(&default, &persisted, ChangeMode::Reconcile));
        assert!(!is_valid_change_with(&default, &default.clone(), ChangeMode::Reconcile));
    }
}
