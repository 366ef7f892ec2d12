//! Read-only database open and environment validation.

use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, OpenFlags};

use super::DbError;

/// How long a query waits on the OS writer's lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open the notification database read-only and validate access.
///
/// Runs a probe query so that a missing read grant (Full Disk Access on
/// macOS fails at read time, not open time) surfaces here instead of
/// inside the capture loop, then checks that the expected `record` and
/// `app` tables exist.
///
/// # Errors
///
/// Returns [`DbError::Open`] when the file cannot be opened,
/// [`DbError::ReadDenied`] when the probe read is refused,
/// [`DbError::SchemaMismatch`] when the expected tables are missing.
pub fn open_validated(path: &Path) -> Result<Connection, DbError> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|source| DbError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    conn.busy_timeout(BUSY_TIMEOUT)?;

    // Probe actual read access, not just the file open.
    let count: i64 = match conn.query_row("SELECT COUNT(*) FROM record", [], |row| row.get(0)) {
        Ok(count) => count,
        Err(err) => {
            if err.to_string().contains("unable to open database file") {
                return Err(DbError::ReadDenied {
                    path: path.to_path_buf(),
                });
            }
            // Readable but not the schema we expect; report what is there.
            let tables = list_tables(&conn)?;
            return Err(DbError::SchemaMismatch { tables });
        }
    };

    let tables = list_tables(&conn)?;
    if !tables.iter().any(|t| t == "record") || !tables.iter().any(|t| t == "app") {
        return Err(DbError::SchemaMismatch { tables });
    }

    tracing::info!(
        path = %path.display(),
        records = count,
        "notification database opened read-only"
    );
    Ok(conn)
}

fn list_tables(conn: &Connection) -> Result<Vec<String>, DbError> {
    let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table'")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    Ok(rows.collect::<Result<_, _>>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_fixture_db(path: &Path) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE app (app_id INTEGER PRIMARY KEY, identifier TEXT);
             CREATE TABLE record (
                 rec_id INTEGER PRIMARY KEY,
                 app_id INTEGER,
                 data BLOB,
                 delivered_date REAL
             );",
        )
        .unwrap();
    }

    #[test]
    fn test_open_valid_database() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("db");
        create_fixture_db(&db);

        let conn = open_validated(&db).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM record", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_open_missing_file_fails() {
        let result = open_validated(Path::new("/nonexistent/notification-db"));
        assert!(matches!(result, Err(DbError::Open { .. })));
    }

    #[test]
    fn test_wrong_schema_is_rejected() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("db");
        let conn = Connection::open(&db).unwrap();
        conn.execute_batch("CREATE TABLE other (id INTEGER PRIMARY KEY);")
            .unwrap();
        drop(conn);

        let result = open_validated(&db);
        match result {
            Err(DbError::SchemaMismatch { tables }) => {
                assert!(tables.contains(&"other".to_string()));
            }
            other => panic!("expected schema mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_connection_is_read_only() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("db");
        create_fixture_db(&db);

        let conn = open_validated(&db).unwrap();
        let result = conn.execute("INSERT INTO app (identifier) VALUES ('x')", []);
        assert!(result.is_err());
    }
}
