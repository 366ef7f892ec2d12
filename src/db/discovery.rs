//! Notification database path detection.
//!
//! macOS moved the Notification Center store in Sequoia (15); both
//! locations are probed, newest first. Discovery runs once at startup.

use std::path::{Path, PathBuf};
use std::process::Command;

use super::DbError;

/// Resolved locations of the database and its write-ahead log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbPaths {
    pub db: PathBuf,
    pub wal: PathBuf,
}

impl DbPaths {
    /// Derive the WAL path from a database path (`<db>-wal`).
    #[must_use]
    pub fn from_db_path(db: PathBuf) -> Self {
        let mut wal = db.clone().into_os_string();
        wal.push("-wal");
        Self {
            db,
            wal: PathBuf::from(wal),
        }
    }
}

/// Sequoia+ location under the user's home directory.
fn sequoia_path() -> Option<PathBuf> {
    Some(
        dirs::home_dir()?
            .join("Library")
            .join("Group Containers")
            .join("group.com.apple.usernoted")
            .join("db2")
            .join("db"),
    )
}

/// Pre-Sequoia location under `DARWIN_USER_DIR`, resolved via `getconf`.
fn legacy_path() -> Option<PathBuf> {
    let output = Command::new("getconf").arg("DARWIN_USER_DIR").output().ok()?;
    if !output.status.success() {
        return None;
    }
    let dir = String::from_utf8(output.stdout).ok()?;
    let dir = dir.trim();
    if dir.is_empty() {
        return None;
    }
    Some(
        Path::new(dir)
            .join("com.apple.notificationcenter")
            .join("db2")
            .join("db"),
    )
}

/// Locate the notification database.
///
/// An explicit override wins; otherwise the Sequoia+ location is
/// checked first, then the legacy one.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] naming every checked location when no
/// candidate exists on disk.
pub fn detect_db_paths(override_path: Option<&Path>) -> Result<DbPaths, DbError> {
    if let Some(path) = override_path {
        if path.exists() {
            return Ok(DbPaths::from_db_path(path.to_path_buf()));
        }
        return Err(DbError::NotFound {
            checked: path.display().to_string(),
        });
    }

    let mut checked = Vec::new();
    for candidate in [sequoia_path(), legacy_path()].into_iter().flatten() {
        if candidate.exists() {
            return Ok(DbPaths::from_db_path(candidate));
        }
        checked.push(candidate.display().to_string());
    }

    Err(DbError::NotFound {
        checked: checked.join(", "),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_wal_path_appends_suffix() {
        let paths = DbPaths::from_db_path(PathBuf::from("/tmp/db2/db"));
        assert_eq!(paths.db, PathBuf::from("/tmp/db2/db"));
        assert_eq!(paths.wal, PathBuf::from("/tmp/db2/db-wal"));
    }

    #[test]
    fn test_override_path_wins() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("db");
        std::fs::write(&db, b"").unwrap();

        let paths = detect_db_paths(Some(&db)).unwrap();
        assert_eq!(paths.db, db);
    }

    #[test]
    fn test_missing_override_is_not_found() {
        let result = detect_db_paths(Some(Path::new("/nonexistent/db-override")));
        assert!(matches!(result, Err(DbError::NotFound { .. })));
    }
}
