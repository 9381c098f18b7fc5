//! Snapshot file I/O.
//!
//! The backing file is a pretty-printed JSON array of notes. Writes go to a
//! hidden sibling temp file which is fsynced and then renamed over the
//! backing file, so a reader never sees a partially written snapshot.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::Value;

use super::error::{StoreError, StoreResult};
use super::note::{Limits, Note, NoteId};

/// Outcome of reading the backing file.
#[derive(Debug)]
pub enum Loaded {
    /// No backing file exists yet.
    Missing,
    /// The file exists but is not a JSON array.
    Corrupt {
        /// Why the file was rejected.
        reason: String,
    },
    /// The file parsed; invalid records were dropped.
    Snapshot {
        /// Valid notes in file order.
        notes: Vec<Note>,
        /// Number of records that failed validation.
        skipped: usize,
    },
}

/// Returns the temp file path used while writing `path`.
#[must_use]
pub fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map_or_else(|| "notes".into(), |n| n.to_string_lossy().into_owned());
    path.with_file_name(format!(".{name}.tmp"))
}

/// Serialises notes to the on-disk snapshot representation.
///
/// # Errors
///
/// Returns a [`StoreError::Serialise`] if JSON encoding fails.
pub fn encode<'a, I>(notes: I) -> StoreResult<Vec<u8>>
where
    I: IntoIterator<Item = &'a Note>,
{
    let notes: Vec<&Note> = notes.into_iter().collect();
    let mut bytes =
        serde_json::to_vec_pretty(&notes).map_err(|source| StoreError::Serialise { source })?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Atomically replaces the backing file with `bytes`.
///
/// On failure the temp file is removed (best effort) and the backing file
/// keeps its previous content.
///
/// # Errors
///
/// Returns a [`StoreError::Storage`] naming the step that failed.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    let tmp = temp_path(path);

    if let Err(e) = write_temp(&tmp, bytes) {
        discard_temp(&tmp);
        return Err(e);
    }

    if let Err(source) = fs::rename(&tmp, path) {
        discard_temp(&tmp);
        return Err(StoreError::storage("rename snapshot into place", path, source));
    }

    sync_parent_dir(path);
    Ok(())
}

fn write_temp(tmp: &Path, bytes: &[u8]) -> StoreResult<()> {
    let mut file =
        File::create(tmp).map_err(|e| StoreError::storage("create temp snapshot", tmp, e))?;
    file.write_all(bytes)
        .map_err(|e| StoreError::storage("write temp snapshot", tmp, e))?;
    file.sync_all()
        .map_err(|e| StoreError::storage("sync temp snapshot", tmp, e))?;
    Ok(())
}

fn discard_temp(tmp: &Path) {
    match fs::remove_file(tmp) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %tmp.display(), error = %e, "Failed to remove temp snapshot");
        }
    }
}

/// Makes the rename durable. The new snapshot is already visible, so a
/// failure here is only logged.
#[cfg(unix)]
fn sync_parent_dir(path: &Path) {
    let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return;
    };
    if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
        tracing::warn!(dir = %dir.display(), error = %e, "Failed to sync snapshot directory");
    }
}

#[cfg(not(unix))]
const fn sync_parent_dir(_path: &Path) {}

/// Reads and validates the backing file.
///
/// # Errors
///
/// Returns a [`StoreError::Storage`] if the file exists but cannot be read
/// (e.g. permission denied). Unparsable content is not an error; it is
/// reported as [`Loaded::Corrupt`].
pub fn read_snapshot(path: &Path, limits: &Limits) -> StoreResult<Loaded> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Loaded::Missing),
        Err(e) => return Err(StoreError::storage("read snapshot", path, e)),
    };

    let records: Vec<Value> = match serde_json::from_slice(&bytes) {
        Ok(records) => records,
        Err(e) => {
            return Ok(Loaded::Corrupt {
                reason: e.to_string(),
            })
        }
    };

    let mut notes: Vec<Note> = Vec::with_capacity(records.len());
    let mut seen: HashSet<NoteId> = HashSet::with_capacity(records.len());
    let mut skipped = 0;

    for (index, record) in records.into_iter().enumerate() {
        match decode_record(record, limits, &mut seen) {
            Ok(note) => notes.push(note),
            Err(reason) => {
                tracing::warn!(index, reason = %reason, "Skipping invalid note record");
                skipped += 1;
            }
        }
    }

    Ok(Loaded::Snapshot { notes, skipped })
}

fn decode_record(
    record: Value,
    limits: &Limits,
    seen: &mut HashSet<NoteId>,
) -> Result<Note, String> {
    let note: Note = serde_json::from_value(record).map_err(|e| e.to_string())?;
    note.check(limits).map_err(|e| e.to_string())?;
    if !seen.insert(note.id) {
        return Err(format!("duplicate id {}", note.id));
    }
    Ok(note)
}

/// Moves a corrupt backing file aside so the next write cannot destroy it.
///
/// The file goes to `<name>.corrupt-<UTC stamp>`, with a `-N` suffix when
/// an earlier quarantined file already holds that name. Returns the new
/// location.
///
/// # Errors
///
/// Returns a [`StoreError::Storage`] if the target cannot be checked or the
/// rename fails.
pub fn quarantine(path: &Path) -> StoreResult<PathBuf> {
    let stamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ").to_string();
    quarantine_as(path, &stamp)
}

fn quarantine_as(path: &Path, stamp: &str) -> StoreResult<PathBuf> {
    let name = path
        .file_name()
        .map_or_else(|| "notes".into(), |n| n.to_string_lossy().into_owned());

    let mut suffix = 0_u32;
    let target = loop {
        let candidate = if suffix == 0 {
            path.with_file_name(format!("{name}.corrupt-{stamp}"))
        } else {
            path.with_file_name(format!("{name}.corrupt-{stamp}-{suffix}"))
        };
        // rename() replaces an existing file, so only a free name will do.
        match fs::symlink_metadata(&candidate) {
            Ok(_) => suffix += 1,
            Err(e) if e.kind() == io::ErrorKind::NotFound => break candidate,
            Err(e) => {
                return Err(StoreError::storage(
                    "check quarantine target",
                    candidate.as_path(),
                    e,
                ))
            }
        }
    };

    fs::rename(path, &target)
        .map_err(|e| StoreError::storage("quarantine corrupt snapshot", path, e))?;
    Ok(target)
}
