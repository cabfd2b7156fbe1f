//! Tolerant field decoders
//!
//! Used through `#[serde(deserialize_with = "...")]` on the record types.

use serde::de::{self, Deserialize, Deserializer};
use serde_json::Value;

use super::{MAX_RECORD_ID, RecordId};

/// Interpret a JSON value as a positive record id.
///
/// Accepts integers, integral floats and numeric strings up to
/// [`MAX_RECORD_ID`].
pub fn parse_record_id(value: &Value) -> Option<RecordId> {
    let id = match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        _ => None,
    }?;

    (id > 0 && id <= MAX_RECORD_ID).then_some(id)
}

fn integral(f: f64) -> Option<u64> {
    (f.is_finite() && f.fract() == 0.0 && f >= 0.0 && f <= u64::MAX as f64).then_some(f as u64)
}

/// Interpret a JSON value as a boolean flag; empty and null mean `false`
pub fn parse_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Null => Some(false),
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

pub fn record_id<'de, D>(deserializer: D) -> Result<RecordId, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    parse_record_id(&value)
        .ok_or_else(|| de::Error::custom(format!("invalid record id: {}", value)))
}

pub fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    parse_flag(&value).ok_or_else(|| de::Error::custom(format!("invalid boolean: {}", value)))
}

/// Strings, with numbers and booleans stringified (spreadsheet cells)
pub fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Null => Ok(String::new()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(de::Error::custom(format!("expected text, got {}", other))),
    }
}

/// Optional timestamp; blank strings collapse to `None`
pub fn schedule<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => {
            let trimmed = s.trim();
            Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
        }
        other => Err(de::Error::custom(format!("expected schedule text, got {}", other))),
    }
}
