use chrono::{DateTime, Local};
use serde::Serializer;
use serde_json::Value;

pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub(crate) fn serialize_timestamp<S>(ts: &DateTime<Local>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(&ts.format(TIMESTAMP_FORMAT))
}

/// Returns the last `n` items, oldest first.
pub(crate) fn tail<T: Clone>(items: &[T], n: usize) -> Vec<T> {
    items[items.len().saturating_sub(n)..].to_vec()
}

/// Truncates to at most `max_chars` characters without splitting a code point.
pub(crate) fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

pub(crate) fn format_payload(payload: &Value, max_chars: usize) -> String {
    let rendered = payload.to_string();
    let truncated = truncate_chars(&rendered, max_chars);
    if truncated.len() < rendered.len() {
        format!("{}...", truncated)
    } else {
        rendered
    }
}

/// Checks that every expected `(key, value)` pair is present at the top level
/// of an object payload.
pub(crate) fn check_fields(payload: &Value, expected: &[(String, Value)]) -> bool {
    expected
        .iter()
        .all(|(key, value)| payload.get(key).is_some_and(|actual| actual == value))
}

/// Checks `tag` against a `tags` array in an event payload, as the Events API
/// carries them.
pub(crate) fn payload_has_tag(payload: &Value, tag: &str) -> bool {
    payload
        .get("tags")
        .and_then(Value::as_array)
        .is_some_and(|tags| tags.iter().any(|t| t.as_str() == Some(tag)))
}
