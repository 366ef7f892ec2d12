//! Database error types.

use std::path::PathBuf;

/// Errors from locating, opening, or querying the notification
/// database. All variants except `Query` surface at startup, before
/// the capture loop begins.
#[derive(thiserror::Error, Debug)]
pub enum DbError {
    /// No database at any known location.
    #[error("Notification database not found (checked {checked})")]
    NotFound { checked: String },

    /// Failed to open the database file.
    #[error("Failed to open database at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// The file opened but reading is not permitted.
    #[error("Cannot read notification database at {path}")]
    ReadDenied { path: PathBuf },

    /// The database does not look like a notification store.
    #[error("Unexpected database schema, tables found: {tables:?}")]
    SchemaMismatch { tables: Vec<String> },

    /// SQL-level failure.
    #[error("Database query failed: {0}")]
    Query(#[from] rusqlite::Error),

    /// Blocking task was cancelled.
    #[error("Blocking task cancelled")]
    TaskCancelled,
}
