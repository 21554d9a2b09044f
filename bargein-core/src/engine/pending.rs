//! One debounce cycle and the timer task that closes it.
//!
//! ## Timeline (per cycle)
//!
//! ```text
//! trigger ──── min_delay ─────────────── max_delay
//!    │            │                          │
//!    │       checkpoint: classify the        default commit
//!    │       snapshot if it is recent        (cause = Timeout)
//!    │
//!    └─ transcript handlers may resolve at any point before the timer does
//! ```
//!
//! Every transition goes through `PendingValidation::try_resolve`, a
//! compare-and-set on the shared `resolved` flag, so exactly one of
//! {handler, checkpoint, expiry, turn end} wins.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Weak,
};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::debug;

use super::EngineInner;

/// Debounce bounds for one cycle. `min_delay <= max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationWindow {
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl ValidationWindow {
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            min_delay,
            max_delay: max_delay.max(min_delay),
        }
    }

    /// Earliest instant at which a transcript still counts as evidence for a
    /// cycle started at `started_at`. The recogniser can report an utterance
    /// slightly before the debounced VAD trigger fires.
    pub fn evidence_horizon(&self, started_at: Instant) -> Instant {
        started_at
            .checked_sub(self.min_delay)
            .unwrap_or(started_at)
    }
}

/// A live validation cycle, owned by the engine state.
pub(crate) struct PendingValidation {
    pub id: u64,
    pub started_at: Instant,
    pub window: ValidationWindow,
    pub reason: String,
    resolved: Arc<AtomicBool>,
    timer: Option<JoinHandle<()>>,
}

impl PendingValidation {
    pub fn new(id: u64, reason: &str, window: ValidationWindow) -> Self {
        Self {
            id,
            started_at: Instant::now(),
            window,
            reason: reason.to_string(),
            resolved: Arc::new(AtomicBool::new(false)),
            timer: None,
        }
    }

    pub fn resolved_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.resolved)
    }

    pub fn attach_timer(&mut self, handle: JoinHandle<()>) {
        self.timer = Some(handle);
    }

    /// Claim the single transition for this cycle. Returns `false` if another
    /// path already claimed it.
    pub fn try_resolve(&self) -> bool {
        self.resolved
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.load(Ordering::Acquire)
    }

    /// Abort the timer task. Safe after it has fired and safe to repeat.
    pub fn cancel_timer(&mut self) {
        if let Some(handle) = self.timer.take() {
            handle.abort();
        }
    }

    /// Drop the handle without aborting; used by the timer task on itself.
    pub fn release_timer(&mut self) {
        self.timer = None;
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Whether a transcript observed at `seen_at` belongs to this cycle.
    pub fn accepts_evidence_from(&self, seen_at: Instant) -> bool {
        seen_at >= self.window.evidence_horizon(self.started_at)
    }
}

impl std::fmt::Debug for PendingValidation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingValidation")
            .field("id", &self.id)
            .field("reason", &self.reason)
            .field("window", &self.window)
            .field("resolved", &self.is_resolved())
            .finish_non_exhaustive()
    }
}

/// Body of the timer task spawned for cycle `id`.
///
/// Holds only a `Weak` engine reference: a dropped engine ends the cycle
/// silently.
pub(crate) async fn run_timer(
    engine: Weak<EngineInner>,
    id: u64,
    window: ValidationWindow,
    resolved: Arc<AtomicBool>,
) {
    sleep(window.min_delay).await;
    if resolved.load(Ordering::Acquire) {
        return;
    }
    match engine.upgrade() {
        Some(inner) => {
            if inner.checkpoint(id) {
                return;
            }
        }
        None => return,
    }

    sleep(window.max_delay.saturating_sub(window.min_delay)).await;
    if resolved.load(Ordering::Acquire) {
        debug!("timer woke after resolution");
        return;
    }
    if let Some(inner) = engine.upgrade() {
        inner.expire(id);
    }
}
