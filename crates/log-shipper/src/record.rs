// Copyright 2025-Present New Relic, Inc. https://newrelic.com/
// SPDX-License-Identifier: Apache-2.0

//! Record normalization: canonical string-keyed JSON plus a millisecond
//! timestamp inferred from an untagged raw value.
//!
//! The host hands over records in a dynamically-typed representation where
//! keys may be non-strings and values may be raw byte sequences. The
//! serialization layer downstream only accepts string keys, so everything is
//! rewritten here, once, before it enters the batch.

use serde_json::{json, Map, Number, Value};

/// A normalized record: string keys, JSON values. Immutable once it enters
/// the batch.
pub type Record = Map<String, Value>;

/// Static metadata identifying the shipping component, attached to every
/// outgoing record under `nr.reportingSource`.
#[derive(Debug, Clone)]
pub struct ReportingSource {
    pub source_type: String,
    pub version: String,
}

impl ReportingSource {
    fn as_value(&self) -> Value {
        json!({ "type": self.source_type, "version": self.version })
    }
}

/// Dynamically-typed value as received from the host, before normalization.
/// Map keys are themselves `RawValue`s because the host's encoding does not
/// guarantee string keys.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bytes(Vec<u8>),
    Str(String),
    Array(Vec<RawValue>),
    Map(Vec<(RawValue, RawValue)>),
}

impl From<Value> for RawValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => RawValue::Null,
            Value::Bool(b) => RawValue::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    RawValue::Int(i)
                } else if let Some(u) = n.as_u64() {
                    RawValue::UInt(u)
                } else {
                    RawValue::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            Value::String(s) => RawValue::Str(s),
            Value::Array(items) => RawValue::Array(items.into_iter().map(RawValue::from).collect()),
            Value::Object(map) => RawValue::Map(
                map.into_iter()
                    .map(|(k, v)| (RawValue::Str(k), RawValue::from(v)))
                    .collect(),
            ),
        }
    }
}

// Unit-disambiguation boundaries for untagged epoch timestamps. A value just
// under the first boundary is seconds in 2033; the same instant expressed in
// ms/us/ns lands in the next bracket up, so inference by magnitude is safe
// for any plausible "now".
const MAX_SECONDS: i64 = 2_000_000_000;
const MAX_MILLISECONDS: i64 = MAX_SECONDS * 1000;
const MAX_MICROSECONDS: i64 = MAX_MILLISECONDS * 1000;

/// Converts an epoch timestamp of unknown unit (seconds, milliseconds,
/// microseconds or nanoseconds) to milliseconds.
pub fn time_to_millis(time: i64) -> i64 {
    if time < MAX_SECONDS {
        time * 1000
    } else if time < MAX_MILLISECONDS {
        time
    } else if time < MAX_MICROSECONDS {
        time / 1000
    } else {
        // Assume nanoseconds
        time / 1_000_000
    }
}

/// Normalizes one raw record into its canonical shape:
///
/// 1. every key rewritten to a string, byte values rewritten to text,
///    nested maps normalized recursively;
/// 2. a `timestamp` field in milliseconds, when the raw timestamp is an
///    integer; anything else is silently dropped rather than failing the
///    ingestion path (not logged either, since this runs per record);
/// 3. a `log` field renamed to `message`;
/// 4. the fixed reporting source stamped last, overwriting any prior value.
pub fn normalize(
    record: &[(RawValue, RawValue)],
    timestamp: &RawValue,
    source: &ReportingSource,
) -> Record {
    let mut out = remap_entries(record);

    match timestamp {
        RawValue::Int(n) => {
            out.insert("timestamp".to_string(), Value::from(time_to_millis(*n)));
        }
        RawValue::UInt(n) => {
            if let Ok(n) = i64::try_from(*n) {
                out.insert("timestamp".to_string(), Value::from(time_to_millis(n)));
            }
        }
        _ => {}
    }

    if let Some(log) = out.remove("log") {
        out.insert("message".to_string(), log);
    }

    out.insert("nr.reportingSource".to_string(), source.as_value());
    out
}

fn remap_entries(entries: &[(RawValue, RawValue)]) -> Record {
    let mut out = Map::with_capacity(entries.len());
    for (key, value) in entries {
        out.insert(key_to_string(key), normalize_value(value));
    }
    out
}

fn key_to_string(key: &RawValue) -> String {
    match key {
        RawValue::Str(s) => s.clone(),
        RawValue::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
        RawValue::Int(n) => n.to_string(),
        RawValue::UInt(n) => n.to_string(),
        RawValue::Float(n) => n.to_string(),
        RawValue::Bool(b) => b.to_string(),
        RawValue::Null => "null".to_string(),
        // Composite keys have no natural text form; fall back to their JSON
        // encoding so the record stays representable.
        RawValue::Array(_) | RawValue::Map(_) => {
            serde_json::to_string(&normalize_value(key)).unwrap_or_default()
        }
    }
}

fn normalize_value(value: &RawValue) -> Value {
    match value {
        RawValue::Null => Value::Null,
        RawValue::Bool(b) => Value::Bool(*b),
        RawValue::Int(n) => Value::from(*n),
        RawValue::UInt(n) => Value::from(*n),
        RawValue::Float(n) => Number::from_f64(*n).map_or(Value::Null, Value::Number),
        RawValue::Bytes(b) => Value::String(String::from_utf8_lossy(b).into_owned()),
        RawValue::Str(s) => Value::String(s.clone()),
        RawValue::Array(items) => Value::Array(items.iter().map(normalize_value).collect()),
        RawValue::Map(entries) => Value::Object(remap_entries(entries)),
    }
}
