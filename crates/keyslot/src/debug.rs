//! Read-only introspection of a registry.
//!
//! [`Registry::inspect`] collects one [`EntryReport`] per key, [`render`]
//! turns reports into text and [`Registry::debug_dump`] does both and emits
//! the result through `tracing`. None of this touches entry state.

use std::fmt::Write as _;
use std::sync::Arc;

use keyslot_core::codec::encode;
use keyslot_core::{Tag, Value};
use serde::{Serialize, Serializer};

use crate::config::Durability;
use crate::registry::Registry;

/// What to include in a dump and how to lay it out.
#[derive(Debug, Clone, Default)]
pub struct DebugOptions {
    /// Only report this key.
    pub filter_key: Option<String>,
    /// Render each entry as a two-column table instead of one line.
    pub table: bool,
}

impl DebugOptions {
    pub fn key(key: impl Into<String>) -> Self {
        Self {
            filter_key: Some(key.into()),
            ..Default::default()
        }
    }

    pub fn table(mut self) -> Self {
        self.table = true;
        self
    }
}

/// Snapshot of one entry.
#[derive(Debug, Clone, Serialize)]
pub struct EntryReport {
    pub key: String,
    pub tag: Option<Tag>,
    pub durability: Durability,
    pub listeners: usize,
    #[serde(serialize_with = "serialize_value")]
    pub value: Arc<Value>,
}

fn serialize_value<S: Serializer>(value: &Arc<Value>, serializer: S) -> Result<S::Ok, S::Error> {
    encode(value)
        .map_err(serde::ser::Error::custom)?
        .serialize(serializer)
}

impl EntryReport {
    fn tag_name(&self) -> &'static str {
        self.tag.map_or("unsupported", Tag::as_str)
    }
}

impl Registry {
    /// Reports for every entry (or only `options.filter_key`), sorted by key.
    pub fn inspect(&self, options: &DebugOptions) -> Vec<EntryReport> {
        let mut reports: Vec<EntryReport> = self.with_entries(|entries| {
            entries
                .iter()
                .filter(|(key, _)| {
                    options
                        .filter_key
                        .as_deref()
                        .map_or(true, |wanted| wanted == key.as_str())
                })
                .map(|(key, entry)| EntryReport {
                    key: key.clone(),
                    tag: entry.value.tag(),
                    durability: entry.durability,
                    listeners: entry.listeners.len(),
                    value: entry.value.clone(),
                })
                .collect()
        });
        reports.sort_by(|a, b| a.key.cmp(&b.key));
        reports
    }

    /// Render the registry and emit it at `info` level. Returns the text.
    pub fn debug_dump(&self, options: &DebugOptions) -> String {
        let reports = self.inspect(options);
        let text = render(&reports, options.table);
        if reports.is_empty() {
            tracing::info!(target: "keyslot::debug", filter = ?options.filter_key, "no slots to dump");
        }
        for line in text.lines() {
            tracing::info!(target: "keyslot::debug", "{}", line);
        }
        text
    }
}

/// Render reports as text.
///
/// Plain mode writes `key (tag): value` per entry. Table mode writes a
/// heading per entry followed by a two-column table: maps by key, sets and
/// sequences by index, records by field and anything else as one `value` row.
pub fn render(reports: &[EntryReport], table: bool) -> String {
    let mut out = String::new();
    for report in reports {
        if table {
            let _ = writeln!(out, "{} ({})", report.key, report.tag_name());
            out.push_str(&render_table(&rows(&report.value)));
        } else {
            let _ = writeln!(out, "{} ({}): {}", report.key, report.tag_name(), report.value);
        }
    }
    out
}

fn rows(value: &Value) -> Vec<(String, String)> {
    match value {
        Value::Map(entries) => entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        Value::Set(items) | Value::Sequence(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v.to_string()))
            .collect(),
        Value::Record(record) => record
            .iter()
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect(),
        other => vec![("value".to_string(), other.to_string())],
    }
}

fn render_table(rows: &[(String, String)]) -> String {
    let header = ("key", "value");
    let left = rows
        .iter()
        .map(|(k, _)| k.chars().count())
        .fold(header.0.len(), usize::max);
    let right = rows
        .iter()
        .map(|(_, v)| v.chars().count())
        .fold(header.1.len(), usize::max);

    let rule = format!("+-{}-+-{}-+\n", "-".repeat(left), "-".repeat(right));
    let mut out = String::new();
    out.push_str(&rule);
    let _ = writeln!(out, "| {:<left$} | {:<right$} |", header.0, header.1);
    out.push_str(&rule);
    for (k, v) in rows {
        let _ = writeln!(out, "| {:<left$} | {:<right$} |", k, v);
    }
    out.push_str(&rule);
    out
}
