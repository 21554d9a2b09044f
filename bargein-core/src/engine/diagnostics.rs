use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;

/// Counters shared by the engine and its timer tasks.
#[derive(Debug, Default)]
pub struct ArbitrationDiagnostics {
    pub triggers_received: AtomicUsize,
    pub triggers_ignored: AtomicUsize,
    pub validations_started: AtomicUsize,
    pub committed_by_intent: AtomicUsize,
    pub committed_by_timeout: AtomicUsize,
    pub cancelled_backchannel: AtomicUsize,
    pub cancelled_turn_ended: AtomicUsize,
    /// Transcripts dropped because their cycle had already closed.
    pub stale_transcripts: AtomicUsize,
    pub commit_failures: AtomicUsize,
}

impl ArbitrationDiagnostics {
    pub(crate) fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            triggers_received: self.triggers_received.load(Ordering::Relaxed),
            triggers_ignored: self.triggers_ignored.load(Ordering::Relaxed),
            validations_started: self.validations_started.load(Ordering::Relaxed),
            committed_by_intent: self.committed_by_intent.load(Ordering::Relaxed),
            committed_by_timeout: self.committed_by_timeout.load(Ordering::Relaxed),
            cancelled_backchannel: self.cancelled_backchannel.load(Ordering::Relaxed),
            cancelled_turn_ended: self.cancelled_turn_ended.load(Ordering::Relaxed),
            stale_transcripts: self.stale_transcripts.load(Ordering::Relaxed),
            commit_failures: self.commit_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsSnapshot {
    pub triggers_received: usize,
    pub triggers_ignored: usize,
    pub validations_started: usize,
    pub committed_by_intent: usize,
    pub committed_by_timeout: usize,
    pub cancelled_backchannel: usize,
    pub cancelled_turn_ended: usize,
    pub stale_transcripts: usize,
    pub commit_failures: usize,
}

impl DiagnosticsSnapshot {
    pub fn commits(&self) -> usize {
        self.committed_by_intent + self.committed_by_timeout
    }
}
