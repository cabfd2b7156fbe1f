//! Record types shared by the store, the sync layer and the scheduler
//!
//! Records are serialized with camelCase keys, the same shape on disk and on
//! the wire. Decoding is tolerant: spreadsheet-backed remotes hand back ids as
//! strings and booleans as empty cells, so every field goes through the
//! helpers in [`lenient`]. A record that still cannot be decoded is dropped
//! by [`decode_records`] with a warning instead of failing the whole batch.

pub mod lenient;
mod project;
mod task;

use chrono::{DateTime, Local, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::error::{Error, Result};

pub use project::{Project, ProjectColor};
pub use task::{NewTask, Priority, Task, TaskUpdate};
pub(crate) use task::normalize_schedule;

/// Identifier of a project or task. Always positive.
pub type RecordId = u64;

/// Largest id accepted from disk or a remote: 2^53, the last integer a
/// spreadsheet cell (an f64) holds exactly
pub const MAX_RECORD_ID: RecordId = 1 << 53;

/// Wall-clock format used for `createdAt` and `scheduledAt`
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Additional layouts accepted when reading a schedule
const ACCEPTED_FORMATS: &[&str] = &[
    TIMESTAMP_FORMAT,
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
];

/// Current local time as a record timestamp
pub fn now_timestamp() -> String {
    format_timestamp(Local::now().naive_local())
}

/// Format a local time as a record timestamp
pub fn format_timestamp(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a record timestamp into local wall-clock time.
///
/// RFC 3339 strings (what a spreadsheet returns for date cells) are converted
/// to local time; everything else is read as local already.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    ACCEPTED_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.with_timezone(&Local).naive_local())
        })
}

/// Decode a batch of raw JSON records, dropping the ones that do not decode
pub fn decode_records<T: DeserializeOwned>(values: Vec<Value>, kind: &str) -> Vec<T> {
    let total = values.len();
    let records: Vec<T> = values
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<T>(value.clone()) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(kind, error = %e, record = %value, "Dropping undecodable record");
                None
            }
        })
        .collect();

    if records.len() < total {
        warn!(
            kind,
            kept = records.len(),
            dropped = total - records.len(),
            "Some records were dropped while decoding"
        );
    }

    records
}

/// Next id for a collection: one past the largest existing id, starting at 1
pub(crate) fn next_id(ids: impl Iterator<Item = RecordId>) -> Result<RecordId> {
    ids.max()
        .unwrap_or(0)
        .checked_add(1)
        .filter(|id| *id <= MAX_RECORD_ID)
        .ok_or_else(|| Error::PersistenceError("id space exhausted".to_string()))
}
