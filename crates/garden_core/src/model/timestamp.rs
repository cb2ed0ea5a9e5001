//! Serde helpers for persisted timestamps.
//!
//! Timestamps are written as epoch milliseconds. Payloads saved by the web
//! app carry RFC 3339 strings instead (`2024-01-15T10:30:00.000Z`); both
//! forms decode to epoch milliseconds.

use chrono::DateTime;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Millis(i64),
    Float(f64),
    Text(String),
}

/// Deserializes epoch milliseconds or an RFC 3339 string.
pub fn deserialize<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match RawTimestamp::deserialize(deserializer)? {
        RawTimestamp::Millis(millis) => Ok(millis),
        RawTimestamp::Float(millis) if millis.is_finite() => Ok(millis as i64),
        RawTimestamp::Float(millis) => Err(D::Error::custom(format!(
            "timestamp `{millis}` is not finite"
        ))),
        RawTimestamp::Text(text) => parse_rfc3339_millis(&text).ok_or_else(|| {
            D::Error::custom(format!("timestamp `{text}` is neither epoch ms nor RFC 3339"))
        }),
    }
}

/// Epoch milliseconds of an RFC 3339 string, or of a string of digits.
pub fn parse_rfc3339_millis(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Ok(millis) = text.parse::<i64>() {
        return Some(millis);
    }
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|parsed| parsed.timestamp_millis())
}
