//! Scan progress shared between the scan task and pollers.
//!
//! [`ScanProgress`] is the single owner of scan state. The scan task writes
//! to it; everyone else reads snapshots. Starting a scan is a check-and-set
//! under the same lock, so two concurrent start requests cannot both win.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

/// How many error messages a summary keeps.
pub const MAX_ERROR_MESSAGES: usize = 20;

/// Lifecycle of a library scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanState {
    #[default]
    Idle,
    Scanning,
    Completed,
    Failed,
    Stopped,
}

impl ScanState {
    pub fn is_scanning(self) -> bool {
        self == ScanState::Scanning
    }
}

impl std::fmt::Display for ScanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ScanState::Idle => "idle",
            ScanState::Scanning => "scanning",
            ScanState::Completed => "completed",
            ScanState::Failed => "failed",
            ScanState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Per-scan counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    /// Files found under the scanned roots
    pub total: u64,
    /// New track rows
    pub added: u64,
    /// Re-indexed existing rows
    pub updated: u64,
    /// Rows deleted by a full scan before indexing
    pub purged: u64,
    pub errors: u64,
    /// Files whose tags could not be read and were named from the file name
    pub fallbacks: u64,
    /// First [`MAX_ERROR_MESSAGES`] error messages
    pub error_messages: Vec<String>,
}

/// Point-in-time view of a scan, as returned to pollers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub is_scanning: bool,
    pub state: ScanState,
    /// 0 to 100
    pub progress: u8,
    pub status_text: String,
    pub results_summary: ScanSummary,
    pub start_time: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Shared, lock-protected scan state.
#[derive(Debug, Clone, Default)]
pub struct ScanProgress {
    inner: Arc<Mutex<ProgressSnapshot>>,
}

impl ScanProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move to `Scanning` unless a scan is already running.
    ///
    /// Returns false, leaving the state untouched, if one is.
    pub fn try_begin(&self) -> bool {
        let mut state = self.inner.lock();
        if state.state.is_scanning() {
            return false;
        }
        *state = ProgressSnapshot {
            is_scanning: true,
            state: ScanState::Scanning,
            progress: 0,
            status_text: "Starting scan".to_string(),
            results_summary: ScanSummary::default(),
            start_time: Some(Utc::now()),
            finished_at: None,
        };
        true
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.inner.lock().clone()
    }

    pub fn is_scanning(&self) -> bool {
        self.inner.lock().is_scanning
    }

    pub fn set_status(&self, text: impl Into<String>) {
        self.inner.lock().status_text = text.into();
    }

    pub fn set_total(&self, total: u64) {
        self.inner.lock().results_summary.total = total;
    }

    pub fn add_purged(&self, purged: u64) {
        self.inner.lock().results_summary.purged += purged;
    }

    /// Record one indexed file and advance the percentage.
    pub fn record_indexed(&self, created: bool, fallback: bool, done: u64) {
        let mut state = self.inner.lock();
        let summary = &mut state.results_summary;
        if created {
            summary.added += 1;
        } else {
            summary.updated += 1;
        }
        if fallback {
            summary.fallbacks += 1;
        }
        state.progress = percent(done, state.results_summary.total);
    }

    /// Record one failed file and advance the percentage.
    pub fn record_error(&self, message: impl Into<String>, done: u64) {
        let mut state = self.inner.lock();
        let summary = &mut state.results_summary;
        summary.errors += 1;
        if summary.error_messages.len() < MAX_ERROR_MESSAGES {
            summary.error_messages.push(message.into());
        }
        state.progress = percent(done, state.results_summary.total);
    }

    /// Move to a terminal state.
    pub fn finish(&self, terminal: ScanState, text: impl Into<String>) {
        let mut state = self.inner.lock();
        state.is_scanning = false;
        state.state = terminal;
        state.status_text = text.into();
        state.finished_at = Some(Utc::now());
        if terminal == ScanState::Completed {
            state.progress = 100;
        }
    }
}

fn percent(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    u8::try_from(done.min(total) * 100 / total).unwrap_or(100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_is_single_flight() {
        let progress = ScanProgress::new();
        assert!(progress.try_begin());
        progress.set_status("Indexing");
        let before = progress.snapshot();

        assert!(!progress.try_begin());
        assert_eq!(progress.snapshot(), before);
    }

    #[test]
    fn test_terminal_states_can_restart() {
        let progress = ScanProgress::new();
        for terminal in [ScanState::Completed, ScanState::Failed, ScanState::Stopped] {
            assert!(progress.try_begin());
            progress.finish(terminal, "done");
            assert!(!progress.is_scanning());
            assert_eq!(progress.snapshot().state, terminal);
        }
        assert!(progress.try_begin());
    }

    #[test]
    fn test_counts_and_percentage() {
        let progress = ScanProgress::new();
        progress.try_begin();
        progress.set_total(4);
        progress.record_indexed(true, false, 1);
        progress.record_indexed(false, true, 2);
        progress.record_error("bad file", 3);

        let snap = progress.snapshot();
        assert_eq!(snap.progress, 75);
        assert_eq!(snap.results_summary.added, 1);
        assert_eq!(snap.results_summary.updated, 1);
        assert_eq!(snap.results_summary.fallbacks, 1);
        assert_eq!(snap.results_summary.errors, 1);
        assert_eq!(snap.results_summary.error_messages, vec!["bad file"]);

        progress.finish(ScanState::Completed, "done");
        let snap = progress.snapshot();
        assert_eq!(snap.progress, 100);
        assert!(snap.finished_at.is_some());
    }

    #[test]
    fn test_error_messages_are_capped() {
        let progress = ScanProgress::new();
        progress.try_begin();
        progress.set_total(100);
        for i in 0..50 {
            progress.record_error(format!("error {i}"), i);
        }
        let summary = progress.snapshot().results_summary;
        assert_eq!(summary.errors, 50);
        assert_eq!(summary.error_messages.len(), MAX_ERROR_MESSAGES);
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let json = serde_json::to_value(ScanProgress::new().snapshot()).unwrap();
        assert_eq!(json["isScanning"], false);
        assert_eq!(json["state"], "idle");
        assert!(json["resultsSummary"]["errorMessages"].is_array());
    }
}
