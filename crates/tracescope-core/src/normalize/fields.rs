//! Lenient field decoding
//!
//! Every function here is total: malformed input resolves to a documented
//! default and is logged at debug level.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use tracing::debug;

use crate::models::{CostBreakdown, NetworkCall, Quantity, TokenUsage};

/// Naive timestamp layouts accepted in addition to RFC 3339; read as UTC
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Epoch values above this are taken to be milliseconds
const EPOCH_MILLIS_THRESHOLD: f64 = 100_000_000_000.0;

/// Stringify a row id; numbers and non-empty strings are accepted
pub fn raw_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(
            n.as_i64()
                .map(|i| i.to_string())
                .or_else(|| n.as_u64().map(|u| u.to_string()))
                .unwrap_or_else(|| n.to_string()),
        ),
        _ => None,
    }
}

/// Decode a field that may hold JSON text or already-decoded JSON.
///
/// Unparseable text resolves to `Value::Null`.
pub fn embedded_json(value: &Value, field: &str) -> Value {
    match value {
        Value::String(text) => {
            let text = text.trim();
            if text.is_empty() {
                return Value::Null;
            }
            serde_json::from_str(text).unwrap_or_else(|e| {
                debug!(field, error = %e, "Malformed JSON field, using default");
                Value::Null
            })
        }
        other => other.clone(),
    }
}

/// Decode a JSON object field, defaulting to an empty object
pub fn json_object(value: &Value, field: &str) -> Map<String, Value> {
    match embedded_json(value, field) {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            debug!(field, found = %other, "Expected a JSON object, using default");
            Map::new()
        }
    }
}

/// Decode a list of ids, defaulting to an empty list.
///
/// A bare scalar is read as a one-element list.
pub fn id_list(value: &Value, field: &str) -> Vec<String> {
    match embedded_json(value, field) {
        Value::Array(items) => items.iter().filter_map(raw_id).collect(),
        scalar @ (Value::Number(_) | Value::String(_)) => raw_id(&scalar).into_iter().collect(),
        _ => Vec::new(),
    }
}

/// Decode a timestamp
pub fn timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_f64().and_then(from_epoch),
        Value::String(s) => parse_timestamp(s.trim()),
        _ => None,
    }
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if text.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(secs) = text.parse::<f64>() {
        return from_epoch(secs);
    }
    debug!(value = text, "Unparseable timestamp");
    None
}

fn from_epoch(raw: f64) -> Option<DateTime<Utc>> {
    if !raw.is_finite() {
        return None;
    }
    let secs = if raw.abs() > EPOCH_MILLIS_THRESHOLD {
        raw / 1_000.0
    } else {
        raw
    };
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1_000_000_000.0).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
}

/// Render a free-text field; non-string JSON is kept as its JSON text
pub fn text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Duration in seconds: timestamps first, then the reported value
pub fn duration(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    reported: &Quantity,
) -> Option<f64> {
    match (start, end) {
        (Some(start), Some(end)) => Some(crate::models::seconds_between(start, end)),
        _ => reported.value(),
    }
}

fn first_quantity(map: &Map<String, Value>, keys: &[&str]) -> Quantity {
    keys.iter()
        .find_map(|key| map.get(*key).filter(|v| !v.is_null()))
        .map_or(Quantity::Missing, Quantity::from_json)
}

fn count(quantity: &Quantity) -> u64 {
    quantity.sum_value().max(0.0).round() as u64
}

/// Decode a token usage object
pub fn token_usage(value: &Value) -> TokenUsage {
    let map = json_object(value, "token_usage");
    let input = count(&first_quantity(&map, &["input", "prompt_tokens", "input_tokens"]));
    let completion = count(&first_quantity(
        &map,
        &["completion", "output", "completion_tokens", "output_tokens"],
    ));
    let reasoning = count(&first_quantity(&map, &["reasoning", "reasoning_tokens"]));
    let total = match first_quantity(&map, &["total", "total_tokens"]) {
        Quantity::Value(v) => v.max(0.0).round() as u64,
        _ => input + completion + reasoning,
    };

    TokenUsage {
        input,
        completion,
        reasoning,
        total,
    }
}

/// Decode a cost object
pub fn cost(value: &Value) -> CostBreakdown {
    let map = json_object(value, "cost");
    let input = first_quantity(&map, &["input", "input_cost"]).sum_value();
    let output = first_quantity(&map, &["output", "completion", "output_cost"]).sum_value();
    let reasoning = first_quantity(&map, &["reasoning", "reasoning_cost"]).sum_value();
    let total = first_quantity(&map, &["total", "total_cost"])
        .value()
        .unwrap_or(input + output + reasoning);

    CostBreakdown {
        input,
        output,
        reasoning,
        total,
    }
}

/// Decode a network call list; non-object entries are skipped
pub fn network_calls(value: &Value) -> Vec<NetworkCall> {
    let items = match embedded_json(value, "network_calls") {
        Value::Array(items) => items,
        _ => return Vec::new(),
    };

    items
        .iter()
        .filter_map(Value::as_object)
        .map(|entry| NetworkCall {
            url: entry.get("url").and_then(text),
            method: entry.get("method").and_then(text),
            status_code: entry
                .get("status_code")
                .and_then(|v| Quantity::from_json(v).value())
                .and_then(|code| u16::try_from(code as i64).ok()),
            response_time: first_quantity(entry, &["response_time", "duration"]),
            bytes_sent: first_quantity(entry, &["bytes_sent"]),
            bytes_received: first_quantity(entry, &["bytes_received"]),
            error: entry.get("error").and_then(text),
        })
        .collect()
}
