//! Crash-safe cursor persistence.
//!
//! The cursor file is a small JSON document, `{"lastCursor": <n>}`,
//! replaced atomically on every save so a crash mid-write leaves the
//! previous high-water mark intact. External tooling may read it
//! concurrently and must treat a missing or malformed file as "start
//! from zero".

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// On-disk shape of the cursor file. The field name is part of the
/// external contract.
#[derive(Debug, Serialize, Deserialize)]
struct CursorState {
    #[serde(rename = "lastCursor")]
    last_cursor: i64,
}

/// Returns the default cursor file path.
///
/// This is `~/.local/share/ncbridge/state.json` on Unix systems.
#[must_use]
pub fn default_state_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ncbridge")
        .join("state.json")
}

/// Detect a source-side purge.
///
/// A persisted cursor above the store's current maximum means the
/// database was truncated or rotated under us; the only safe resumption
/// point is 0. Invoked once at startup, before the first read.
#[must_use]
pub fn reconcile(persisted: i64, current_max: i64) -> i64 {
    if persisted > current_max {
        tracing::warn!(
            persisted,
            current_max,
            "database purge detected, resetting cursor to 0"
        );
        0
    } else {
        persisted
    }
}

/// Atomic high-water-mark store.
///
/// Saves go to a temp file in the target directory, get flushed and
/// fsynced, then atomically replace the target path.
#[derive(Debug, Clone)]
pub struct CursorStore {
    path: PathBuf,
}

impl CursorStore {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Path of the cursor file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist the cursor. Failures are logged and absorbed: the
    /// in-memory cursor stays ahead of disk until the next successful
    /// save, which at worst re-delivers a batch after a crash.
    pub fn save(&self, cursor: i64) {
        if let Err(err) = self.try_save(cursor) {
            tracing::error!(
                cursor,
                path = %self.path.display(),
                error = %err,
                "failed to save cursor state"
            );
        }
    }

    fn try_save(&self, cursor: i64) -> std::io::Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        // The temp file lives in the target directory so the final
        // rename stays on one filesystem; its guard removes it if any
        // step before persist fails.
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        serde_json::to_writer(&mut tmp, &CursorState { last_cursor: cursor })?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|err| err.error)?;
        Ok(())
    }

    /// Load the persisted cursor.
    ///
    /// Returns 0 when the file is absent (fresh start), unreadable, or
    /// not the expected shape. Never errors.
    #[must_use]
    pub fn load(&self) -> i64 {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(_) => return 0,
        };
        match serde_json::from_str::<CursorState>(&contents) {
            Ok(state) => state.last_cursor,
            Err(err) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %err,
                    "cursor state unreadable, starting from 0"
                );
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> CursorStore {
        CursorStore::new(dir.path().join("state.json"))
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.save(42);
        assert_eq!(store.load(), 42);

        store.save(103);
        assert_eq!(store.load(), 103);
    }

    #[test]
    fn test_load_missing_file_is_zero() {
        let dir = TempDir::new().unwrap();
        assert_eq!(store_in(&dir).load(), 0);
    }

    #[test]
    fn test_load_garbage_is_zero() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "{not json").unwrap();
        assert_eq!(store.load(), 0);
    }

    #[test]
    fn test_load_missing_field_is_zero() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), r#"{"somethingElse": 9}"#).unwrap();
        assert_eq!(store.load(), 0);
    }

    #[test]
    fn test_on_disk_shape_uses_last_cursor_key() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.save(7);

        let contents = std::fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(value["lastCursor"], 7);
    }

    #[test]
    fn test_save_creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let store = CursorStore::new(dir.path().join("nested").join("deep").join("state.json"));
        store.save(5);
        assert_eq!(store.load(), 5);
    }

    #[test]
    fn test_save_leaves_no_temp_files_behind() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.save(1);
        store.save(2);

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_save_failure_is_absorbed() {
        // A directory path cannot be replaced by persist(); save must
        // not panic.
        let dir = TempDir::new().unwrap();
        let blocked = dir.path().join("state.json");
        std::fs::create_dir(&blocked).unwrap();

        let store = CursorStore::new(blocked);
        store.save(9);
        assert_eq!(store.load(), 0);
    }

    #[test]
    fn test_reconcile_purge_resets_to_zero() {
        assert_eq!(reconcile(500, 10), 0);
    }

    #[test]
    fn test_reconcile_normal_keeps_persisted() {
        assert_eq!(reconcile(5, 10), 5);
        assert_eq!(reconcile(10, 10), 10);
        assert_eq!(reconcile(0, 0), 0);
    }
}
