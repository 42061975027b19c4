//! Progress events and run results

use std::fmt;

use serde::Serialize;
use tokio::sync::mpsc;

/// Phase events emitted during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum SyncProgress {
    /// Fetching the row set
    Querying,
    /// Comparing rows against local records
    Diffing,
    /// Emitted once per refresh
    Detected { stale: usize, total: usize },
    /// About to write row `current` of `total`
    Importing { current: usize, total: usize },
    Done,
}

impl fmt::Display for SyncProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncProgress::Querying => write!(f, "Querying collection..."),
            SyncProgress::Diffing => write!(f, "Comparing with local records..."),
            SyncProgress::Detected { stale, total } => {
                write!(f, "{} of {} records need updating", stale, total)
            }
            SyncProgress::Importing { current, total } => {
                write!(f, "Importing {}/{}", current, total)
            }
            SyncProgress::Done => write!(f, "Done"),
        }
    }
}

/// Where a run sends its progress events
///
/// Dropping the sink closes the channel, so a receiver loop ends when the
/// run finishes.
#[derive(Debug, Clone, Default)]
pub struct ProgressSink {
    tx: Option<mpsc::UnboundedSender<SyncProgress>>,
}

impl ProgressSink {
    /// Discard all events
    pub fn none() -> Self {
        Self::default()
    }

    /// Sink plus the receiver that gets its events
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SyncProgress>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn emit(&self, event: SyncProgress) {
        if let Some(tx) = &self.tx {
            // Receiver gone means nobody is watching
            let _ = tx.send(event);
        }
    }
}

/// Counts and per-row errors of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    pub created: usize,
    pub updated: usize,
    /// Rows whose local copy was already current
    pub skipped: usize,
    /// Local records newly flagged as deleted
    pub removed: usize,
    pub failed: usize,
    /// `"<row id>: <message>"`, in processing order
    pub errors: Vec<String>,
}

impl SyncResult {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    pub(crate) fn record_failure(&mut self, id: &str, error: impl fmt::Display) {
        self.failed += 1;
        self.errors.push(format!("{}: {}", id, error));
    }
}

impl fmt::Display for SyncResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "created {}, updated {}, unchanged {}, removed {}, failed {}",
            self.created, self.updated, self.skipped, self.removed, self.failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_display() {
        let mut result = SyncResult {
            created: 2,
            updated: 1,
            skipped: 5,
            removed: 1,
            ..SyncResult::default()
        };
        result.record_failure("row-9", "Remote returned 400: bad block");

        assert_eq!(
            result.to_string(),
            "created 2, updated 1, unchanged 5, removed 1, failed 1"
        );
        assert!(result.has_failures());
        assert_eq!(result.errors, vec!["row-9: Remote returned 400: bad block"]);
    }

    #[test]
    fn test_progress_display() {
        assert_eq!(
            SyncProgress::Detected { stale: 3, total: 10 }.to_string(),
            "3 of 10 records need updating"
        );
        assert_eq!(
            SyncProgress::Importing { current: 1, total: 3 }.to_string(),
            "Importing 1/3"
        );
    }

    #[test]
    fn test_progress_serializes_with_phase_tag() {
        let json = serde_json::to_value(SyncProgress::Importing { current: 2, total: 4 }).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"phase": "importing", "current": 2, "total": 4})
        );
    }

    #[tokio::test]
    async fn test_channel_closes_when_sink_dropped() {
        let (sink, mut rx) = ProgressSink::channel();
        sink.emit(SyncProgress::Querying);
        sink.emit(SyncProgress::Done);
        drop(sink);

        assert_eq!(rx.recv().await, Some(SyncProgress::Querying));
        assert_eq!(rx.recv().await, Some(SyncProgress::Done));
        assert_eq!(rx.recv().await, None);
    }

    #[test]
    fn test_none_sink_discards() {
        ProgressSink::none().emit(SyncProgress::Done);
    }
}
