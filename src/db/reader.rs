//! Monotonic-cursor record reader.

use std::sync::Arc;

use rusqlite::Connection;
use tokio::sync::Mutex;

use super::DbError;
use crate::decode;

/// One decoded notification, keyed by its source-assigned record id.
///
/// Record ids are assigned in insertion order and never reused; they
/// are the pipeline's resumption watermark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub rec_id: i64,
    /// Bundle identifier resolved through the `app` table join; always
    /// overrides whatever the blob itself claimed.
    pub app: String,
    pub title: String,
    pub subtitle: String,
    pub body: String,
    /// Unix seconds; 0 when the record carried no date.
    pub timestamp: i64,
}

const FETCH_SQL: &str = "SELECT r.rec_id, r.data, a.identifier
     FROM record r
     JOIN app a ON r.app_id = a.app_id
     WHERE r.rec_id > ?1
     ORDER BY r.rec_id ASC";

/// Reads newly inserted records past a cursor, in insertion order.
///
/// Holds the process-wide read-only connection; queries run on the
/// blocking pool so the capture loop is never stalled inside `SQLite`.
#[derive(Debug, Clone)]
pub struct RecordReader {
    conn: Arc<Mutex<Connection>>,
}

impl RecordReader {
    #[must_use]
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Fetch all records with `rec_id` greater than `last_rec_id`,
    /// ascending.
    ///
    /// Rows whose blob fails to decode are logged and skipped; they
    /// still occupy a record id, so gaps in the result are normal. A
    /// query-level failure (the store is briefly locked while the OS
    /// writes) yields an empty batch with a warning; the next wake
    /// retries naturally and the cursor does not move.
    pub async fn fetch_since(&self, last_rec_id: i64) -> Vec<Notification> {
        let conn = self.conn.clone();
        let result = tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            Self::fetch_blocking(&conn, last_rec_id)
        })
        .await;

        match result {
            Ok(Ok(batch)) => batch,
            Ok(Err(err)) => {
                tracing::warn!(
                    last_rec_id,
                    error = %err,
                    "record query failed, yielding empty batch"
                );
                Vec::new()
            }
            Err(_) => {
                tracing::warn!(last_rec_id, "record query task cancelled, yielding empty batch");
                Vec::new()
            }
        }
    }

    fn fetch_blocking(
        conn: &Connection,
        last_rec_id: i64,
    ) -> Result<Vec<Notification>, rusqlite::Error> {
        let mut stmt = conn.prepare_cached(FETCH_SQL)?;
        let rows = stmt.query_map([last_rec_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, Vec<u8>>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut batch = Vec::new();
        for row in rows {
            let (rec_id, blob, identifier) = row?;
            match decode::decode(&blob) {
                Ok(payload) => batch.push(Notification {
                    rec_id,
                    app: identifier,
                    title: payload.title,
                    subtitle: payload.subtitle,
                    body: payload.body,
                    timestamp: payload.timestamp,
                }),
                Err(err) => {
                    tracing::warn!(rec_id, error = %err, "skipping undecodable record");
                }
            }
        }
        Ok(batch)
    }

    /// Highest record id currently in the store, 0 for an empty table.
    ///
    /// # Errors
    ///
    /// Returns an error when the query fails. Used once at startup for
    /// purge detection, where a failure is fatal.
    pub async fn max_rec_id(&self) -> Result<i64, DbError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> Result<i64, DbError> {
            let conn = conn.blocking_lock();
            let max: Option<i64> =
                conn.query_row("SELECT MAX(rec_id) FROM record", [], |row| row.get(0))?;
            Ok(max.unwrap_or(0))
        })
        .await
        .map_err(|_| DbError::TaskCancelled)?
    }
}
