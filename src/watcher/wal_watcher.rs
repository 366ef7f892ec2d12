//! Capture loop and watch-mode state machine.
//!
//! One cooperative loop: wake on a WAL event or the poll timer, run a
//! single capture pass, go back to waiting. The native watch handle is
//! replaced whole whenever the WAL file churns; while it cannot be
//! (re)registered the loop degrades to fixed-interval polling and keeps
//! trying to upgrade.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify_debouncer_full::{
    new_debouncer,
    notify::{self, RecommendedWatcher, RecursiveMode},
    DebounceEventResult, Debouncer, RecommendedCache,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::db::RecordReader;
use crate::filter::{self, Classified};
use crate::sink::Deliver;
use crate::state::CursorStore;

/// Debounce window for coalescing bursts of WAL writes.
const DEBOUNCE_WINDOW: Duration = Duration::from_millis(100);

/// An owned native watch on the WAL file.
///
/// Dropped and rebuilt whole on every file-churn event, never mutated
/// in place.
struct NativeWatch {
    /// Kept alive for the lifetime of the watch; dropping it unregisters.
    #[allow(dead_code)]
    debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
    events: mpsc::UnboundedReceiver<DebounceEventResult>,
}

impl NativeWatch {
    /// Register a debounced watch on the WAL file itself, so a delete
    /// or rename of the file surfaces as an event rather than silence.
    fn register(wal_path: &Path) -> Result<Self, notify::Error> {
        let (tx, events) = mpsc::unbounded_channel();
        let mut debouncer = new_debouncer(
            DEBOUNCE_WINDOW,
            None,
            move |result: DebounceEventResult| {
                let _ = tx.send(result);
            },
        )?;
        debouncer.watch(wal_path, RecursiveMode::NonRecursive)?;
        Ok(Self { debouncer, events })
    }
}

enum WatchMode {
    Native(NativeWatch),
    Poll,
}

enum Wake {
    /// WAL write activity or the poll heartbeat: run a pass.
    Activity,
    /// WAL deleted/renamed, or the watch backend errored: the handle is
    /// dead and must be replaced.
    Churn,
    Shutdown,
}

/// Result of one capture pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassOutcome {
    pub seen: usize,
    pub admitted: usize,
    pub delivered: usize,
}

/// The capture-and-delivery loop.
///
/// Owns the watcher session: the watch mode, the in-memory cursor, and
/// every downstream stage. Single-threaded by contract; each wake runs
/// at most one read, one filter/deliver pass, and one cursor save.
pub struct WalWatcher<S: Deliver> {
    reader: RecordReader,
    store: CursorStore,
    sink: S,
    allowed_apps: HashSet<String>,
    wal_path: PathBuf,
    poll_interval: Duration,
    last_rec_id: i64,
}

impl<S: Deliver> WalWatcher<S> {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        reader: RecordReader,
        store: CursorStore,
        sink: S,
        allowed_apps: HashSet<String>,
        wal_path: PathBuf,
        poll_interval: Duration,
        last_rec_id: i64,
    ) -> Self {
        Self {
            reader,
            store,
            sink,
            allowed_apps,
            wal_path,
            poll_interval,
            last_rec_id,
        }
    }

    /// Current in-memory high-water mark.
    #[must_use]
    pub fn last_rec_id(&self) -> i64 {
        self.last_rec_id
    }

    /// Run the capture loop until `cancel` fires.
    ///
    /// Shutdown latency is bounded by one poll interval: the wait is
    /// never longer than that, and cancellation is observed at the top
    /// of every iteration. An in-flight pass always finishes; on exit
    /// the in-memory cursor is flushed and all handles released.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut mode = self.acquire();

        loop {
            if cancel.is_cancelled() {
                break;
            }

            match Self::wait(&mut mode, self.poll_interval, &cancel).await {
                Wake::Shutdown => break,
                Wake::Churn => {
                    mode = self.reacquire(mode);
                    self.run_pass().await;
                }
                Wake::Activity => {
                    self.run_pass().await;
                    if matches!(mode, WatchMode::Poll) {
                        mode = self.acquire();
                    }
                }
            }
        }

        self.store.save(self.last_rec_id);
        drop(mode);
        tracing::info!(last_rec_id = self.last_rec_id, "watcher shut down");
    }

    /// One pipeline pass: read past the cursor, filter, classify,
    /// deliver, then persist the new high-water mark.
    ///
    /// The cursor advances to the maximum record id seen whether or not
    /// anything was admitted or delivered; a failed delivery is a
    /// permanent drop, never a redelivery.
    pub async fn run_pass(&mut self) -> PassOutcome {
        let batch = self.reader.fetch_since(self.last_rec_id).await;
        if batch.is_empty() {
            return PassOutcome::default();
        }

        let mut outcome = PassOutcome {
            seen: batch.len(),
            ..PassOutcome::default()
        };
        // The batch is ordered ascending, so the last row is the mark.
        let max_rec_id = batch.last().map_or(self.last_rec_id, |n| n.rec_id);

        for notification in batch {
            if let Some(rejection) = filter::evaluate(&notification, &self.allowed_apps) {
                tracing::debug!(
                    rec_id = notification.rec_id,
                    app = %notification.app,
                    ?rejection,
                    "rejected"
                );
                continue;
            }

            let classified = Classified::new(notification);
            outcome.admitted += 1;
            if self.sink.deliver(&classified).await {
                outcome.delivered += 1;
            }
        }

        if max_rec_id > self.last_rec_id {
            self.last_rec_id = max_rec_id;
            self.store.save(self.last_rec_id);
        }

        tracing::info!(
            seen = outcome.seen,
            admitted = outcome.admitted,
            delivered = outcome.delivered,
            cursor = self.last_rec_id,
            "pass complete"
        );
        outcome
    }

    /// Try to register a native watch, falling back to polling.
    fn acquire(&self) -> WatchMode {
        if self.wal_path.exists() {
            match NativeWatch::register(&self.wal_path) {
                Ok(watch) => {
                    tracing::debug!(wal = %self.wal_path.display(), "native watch registered");
                    return WatchMode::Native(watch);
                }
                Err(err) => {
                    tracing::warn!(
                        wal = %self.wal_path.display(),
                        error = %err,
                        "native watch unavailable, polling instead"
                    );
                }
            }
        } else {
            tracing::debug!(
                wal = %self.wal_path.display(),
                "log file absent, polling until it appears"
            );
        }
        WatchMode::Poll
    }

    /// Release a dead watch handle, then build a fresh one. The old
    /// handle must be gone before re-registration; a watch on a deleted
    /// file is never reused.
    fn reacquire(&self, old: WatchMode) -> WatchMode {
        drop(old);
        self.acquire()
    }

    /// Single bounded wait: native events when available, the poll
    /// interval as both heartbeat and fallback, cancellation always.
    async fn wait(mode: &mut WatchMode, poll_interval: Duration, cancel: &CancellationToken) -> Wake {
        match mode {
            WatchMode::Native(watch) => {
                tokio::select! {
                    () = cancel.cancelled() => Wake::Shutdown,
                    event = watch.events.recv() => match event {
                        Some(result) => Self::interpret(result),
                        // The callback side hung up: the watch is dead.
                        None => Wake::Churn,
                    },
                    () = tokio::time::sleep(poll_interval) => Wake::Activity,
                }
            }
            WatchMode::Poll => {
                tokio::select! {
                    () = cancel.cancelled() => Wake::Shutdown,
                    () = tokio::time::sleep(poll_interval) => Wake::Activity,
                }
            }
        }
    }

    /// Map a debounced notify result onto the state machine's inputs.
    fn interpret(result: DebounceEventResult) -> Wake {
        use notify::event::ModifyKind;
        use notify::EventKind;

        match result {
            Ok(events) => {
                let churn = events.iter().any(|event| {
                    matches!(
                        event.kind,
                        EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(_))
                    )
                });
                if churn {
                    Wake::Churn
                } else {
                    Wake::Activity
                }
            }
            Err(errors) => {
                for error in &errors {
                    tracing::warn!(error = %error, "watch backend error");
                }
                Wake::Churn
            }
        }
    }
}
