//! Whole-collection JSON snapshots
//!
//! Each collection lives in its own file as a pretty-printed JSON array.
//! Writes go to a sibling `.tmp` file that is then renamed over the target,
//! so readers only ever see a complete snapshot.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::decode_records;

fn persistence_error(action: &str, path: &Path, e: impl std::fmt::Display) -> Error {
    Error::PersistenceError(format!("Failed to {} {}: {}", action, path.display(), e))
}

/// Load a collection; a missing or blank file is an empty collection
pub(crate) fn load_collection<T: DeserializeOwned>(path: &Path, kind: &str) -> Result<Vec<T>> {
    if !path.exists() {
        debug!(path = %path.display(), "No snapshot on disk, starting empty");
        return Ok(Vec::new());
    }

    let contents = fs::read_to_string(path).map_err(|e| persistence_error("read", path, e))?;
    if contents.trim().is_empty() {
        return Ok(Vec::new());
    }

    let values: Vec<Value> =
        serde_json::from_str(&contents).map_err(|e| persistence_error("parse", path, e))?;

    Ok(decode_records(values, kind))
}

/// Replace the snapshot at `path` with `records`
pub(crate) fn write_collection<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    let tmp_path = path.with_extension("json.tmp");

    let file = File::create(&tmp_path).map_err(|e| persistence_error("create", &tmp_path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, records)?;
    writer
        .write_all(b"\n")
        .and_then(|_| writer.flush())
        .map_err(|e| persistence_error("write", &tmp_path, e))?;
    writer
        .get_ref()
        .sync_all()
        .map_err(|e| persistence_error("sync", &tmp_path, e))?;
    drop(writer);

    fs::rename(&tmp_path, path).map_err(|e| persistence_error("replace", path, e))?;

    debug!(path = %path.display(), records = records.len(), "Snapshot written");
    Ok(())
}
