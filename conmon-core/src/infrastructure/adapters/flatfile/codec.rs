// conmon-core/src/infrastructure/adapters/flatfile/codec.rs

//! Row <-> CSV cell conversion.
//!
//! Nested maps are flattened to dot-keyed columns. Leaves are written as
//! text: null is an empty cell, booleans and numbers are written bare,
//! sequences and maps as JSON. A string is written raw unless reading it
//! back would give something else, in which case it is JSON-quoted.
//!
//! A nested map is kept whole, as one JSON cell, when splitting it would
//! lose information: one of its keys contains `.`, or one of its values is
//! an explicit null that padding could not be told apart from.

use serde_json::{Number, Value};

use crate::domain::check::definition::CHECKS_TABLE;
use crate::domain::query::Row;

/// Column names whose string leaves are known to hold encoded JSON.
const NESTED_FIELDS: &[&str] = &[
    "metadata",
    "output_statements",
    "fix_details",
    "tags",
    "exclusions",
    "resource_json",
    "success_resources",
    "failed_resources",
    "config",
    "configuration",
    "policy",
    "settings",
];

pub fn likely_nested(column: &str) -> bool {
    let leaf = column.rsplit('.').next().unwrap_or(column);
    NESTED_FIELDS.contains(&leaf) || leaf.ends_with("_json")
}

// --- FLATTEN ---

pub fn flatten(row: &Row) -> Row {
    let mut out = Row::new();
    for (key, value) in row {
        flatten_into(&mut out, key.clone(), value);
    }
    out
}

fn flatten_into(out: &mut Row, key: String, value: &Value) {
    match value {
        Value::Object(map) if !map.is_empty() && !keep_whole(map) => {
            for (child, v) in map {
                flatten_into(out, format!("{}.{}", key, child), v);
            }
        }
        other => {
            out.insert(key, other.clone());
        }
    }
}

fn keep_whole(map: &Row) -> bool {
    map.iter().any(|(k, v)| k.contains('.') || v.is_null())
}

// --- UNFLATTEN ---

/// Rebuilds nested maps from dot-keyed columns.
///
/// Columns padded with null do not shadow real data: a null child is dropped
/// when its parent column exists, and a null parent is dropped when one of
/// its children holds a value.
pub fn unflatten(flat: &Row) -> Row {
    let mut out = Row::new();
    for (key, value) in flat {
        if value.is_null() && (has_parent_column(flat, key) || has_live_child(flat, key)) {
            continue;
        }
        insert_path(&mut out, key, value.clone());
    }
    out
}

fn has_parent_column(flat: &Row, key: &str) -> bool {
    key.match_indices('.')
        .any(|(i, _)| flat.contains_key(&key[..i]))
}

fn has_live_child(flat: &Row, key: &str) -> bool {
    let prefix = format!("{}.", key);
    flat.iter()
        .any(|(k, v)| k.starts_with(&prefix) && !v.is_null())
}

fn insert_path(out: &mut Row, key: &str, value: Value) {
    let mut segments = key.split('.').peekable();
    let mut current = out;
    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            // Des enfants ont déjà été posés: on ne les écrase pas.
            let has_children = matches!(
                current.get(segment),
                Some(Value::Object(existing)) if !existing.is_empty()
            );
            if !has_children {
                current.insert(segment.to_string(), value);
            }
            return;
        }
        let slot = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Row::new()));
        if !slot.is_object() {
            *slot = Value::Object(Row::new());
        }
        current = match slot {
            Value::Object(map) => map,
            _ => return,
        };
    }
}

// --- CELLS ---

pub fn encode_cell(table: &str, column: &str, value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => {
            if decode_cell(table, column, s) == *value {
                s.clone()
            } else {
                Value::String(s.clone()).to_string()
            }
        }
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

pub fn decode_cell(table: &str, column: &str, raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    // Compatibilité: les ids de `checks` restent du texte.
    if column == "id" && table == CHECKS_TABLE {
        return Value::String(raw.to_string());
    }

    let value = decode(raw);
    if likely_nested(column) {
        if let Value::String(inner) = &value {
            if let Some(nested) = parse_json(inner) {
                return nested;
            }
        }
    }
    value
}

fn decode(raw: &str) -> Value {
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(u) = raw.parse::<u64>() {
        return Value::from(u);
    }
    if let Some(n) = raw.parse::<f64>().ok().and_then(Number::from_f64) {
        return Value::Number(n);
    }
    parse_json(raw).unwrap_or_else(|| Value::String(raw.to_string()))
}

fn parse_json(raw: &str) -> Option<Value> {
    match raw.as_bytes().first() {
        Some(b'{' | b'[' | b'"') => serde_json::from_str(raw).ok(),
        _ => None,
    }
}
