//! Change watcher: WAL-driven wake-ups with fallback polling.

mod wal_watcher;

pub use wal_watcher::{PassOutcome, WalWatcher};
