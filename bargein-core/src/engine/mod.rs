//! `ArbitrationEngine`: decides whether user activity interrupts the agent.
//!
//! ## Lifecycle of one validation cycle
//!
//! ```text
//! Idle ──request_interrupt_validation──► Pending ──hard intent / timeout──► Committed
//!                                           │
//!                                           └──backchannel / turn end─────► Cancelled
//! ```
//!
//! At most one cycle is live at a time; requests while one is pending are
//! no-ops. Committed and Cancelled are terminal and the engine returns to
//! Idle, ready for the next trigger.
//!
//! ## Threading
//!
//! Handlers may be called from any thread; the timer runs as a Tokio task on
//! the runtime captured at construction. All cycle state sits behind one
//! `parking_lot::Mutex`. The commit action always runs after that lock is
//! released.

pub mod commit;
pub mod diagnostics;
pub mod gate;
pub mod pending;

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, error, info, info_span, Instrument};

use crate::{
    error::{BargeInError, Result},
    ipc::events::{ArbitrationEvent, ResolutionCause, SpeechEvent, ValidationOutcome},
    lexicon::{Classification, WordLexicon, DEFAULT_HARD_INTERRUPT_WORDS, DEFAULT_SOFT_IGNORE_WORDS},
    session::SessionContext,
};

use commit::{CommitInterrupt, InterruptCurrentSpeech};
use diagnostics::{ArbitrationDiagnostics, DiagnosticsSnapshot};
use pending::{PendingValidation, ValidationWindow};

/// Broadcast channel capacity: 256 arbitration events buffered for slow consumers.
const BROADCAST_CAP: usize = 256;

const MAX_MIN_DELAY_MS: u64 = 5_000;
const MAX_MAX_DELAY_MS: u64 = 10_000;

/// Configuration for `ArbitrationEngine`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct ArbitrationConfig {
    /// Filler words that never interrupt on their own.
    pub soft_ignore_words: Vec<String>,
    /// Words that interrupt immediately.
    pub hard_interrupt_words: Vec<String>,
    /// No default commit before this much time after the trigger. Default: 250.
    pub pending_interrupt_min_delay_ms: u64,
    /// Unresolved cycles commit by default at this point. Default: 1200.
    pub pending_interrupt_max_delay_ms: u64,
}

impl Default for ArbitrationConfig {
    fn default() -> Self {
        Self {
            soft_ignore_words: DEFAULT_SOFT_IGNORE_WORDS
                .iter()
                .map(|w| w.to_string())
                .collect(),
            hard_interrupt_words: DEFAULT_HARD_INTERRUPT_WORDS
                .iter()
                .map(|w| w.to_string())
                .collect(),
            pending_interrupt_min_delay_ms: 250,
            pending_interrupt_max_delay_ms: 1_200,
        }
    }
}

impl ArbitrationConfig {
    /// Clamp delays into range and keep `min <= max`.
    pub fn normalize(&mut self) {
        self.pending_interrupt_min_delay_ms =
            self.pending_interrupt_min_delay_ms.min(MAX_MIN_DELAY_MS);
        self.pending_interrupt_max_delay_ms = self
            .pending_interrupt_max_delay_ms
            .clamp(self.pending_interrupt_min_delay_ms, MAX_MAX_DELAY_MS);
    }

    pub fn window(&self) -> ValidationWindow {
        ValidationWindow::new(
            Duration::from_millis(self.pending_interrupt_min_delay_ms),
            Duration::from_millis(self.pending_interrupt_max_delay_ms),
        )
    }

    pub fn lexicon(&self) -> Result<WordLexicon> {
        WordLexicon::new(&self.soft_ignore_words, &self.hard_interrupt_words)
    }
}

/// Whether a validation cycle is currently live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationPhase {
    Idle,
    Pending,
}

/// How a cycle ended, as reported to the handler that ended it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub validation_id: u64,
    pub outcome: ValidationOutcome,
    pub cause: ResolutionCause,
}

/// Latest transcript the engine has seen.
#[derive(Debug, Clone, Default)]
pub struct TranscriptSnapshot {
    pub text: String,
    pub seen_at: Option<Instant>,
    pub is_final: bool,
    /// User-speaking flag reported alongside the transcript.
    pub user_speaking: bool,
}

#[derive(Debug, Default)]
struct ArbiterState {
    pending: Option<PendingValidation>,
    snapshot: TranscriptSnapshot,
    /// The snapshot was already in hand when a cycle resolved.
    snapshot_consumed: bool,
    /// Last resolution or turn end.
    last_closed_at: Option<Instant>,
    next_id: u64,
}

impl ArbiterState {
    /// Claim and remove the live cycle `id` if it is still unresolved.
    ///
    /// A successful claim consumes the current snapshot: it can never be
    /// evidence for a later cycle.
    fn take_unresolved(&mut self, id: u64) -> Option<PendingValidation> {
        let live = self.pending.as_ref()?;
        if live.id != id || !live.try_resolve() {
            return None;
        }
        self.snapshot_consumed = true;
        self.last_closed_at = Some(Instant::now());
        self.pending.take()
    }

    fn record(&mut self, snapshot: TranscriptSnapshot) {
        self.snapshot = snapshot;
        self.snapshot_consumed = false;
    }

    /// Snapshot text usable as evidence for `pending`.
    fn evidence_for(&self, pending: &PendingValidation) -> Option<String> {
        if self.snapshot_consumed {
            return None;
        }
        let seen_at = self.snapshot.seen_at?;
        (pending.accepts_evidence_from(seen_at) && !self.snapshot.text.is_empty())
            .then(|| self.snapshot.text.clone())
    }

    /// A transcript outside any cycle is stale when it trails a recent
    /// resolution or turn end by at most `max_delay`.
    fn trails_closed_cycle(&self, max_delay: Duration) -> bool {
        self.last_closed_at
            .is_some_and(|closed| closed.elapsed() <= max_delay)
    }
}

/// Shared between the engine handle and its timer tasks.
pub(crate) struct EngineInner {
    lexicon: WordLexicon,
    window: ValidationWindow,
    session: Arc<dyn SessionContext>,
    commit: Arc<dyn CommitInterrupt>,
    state: Mutex<ArbiterState>,
    events_tx: broadcast::Sender<ArbitrationEvent>,
    seq: AtomicU64,
    diagnostics: ArbitrationDiagnostics,
}

/// The interrupt arbiter for one agent session.
///
/// `ArbitrationEngine` is `Send + Sync`; wrap it in an `Arc` to share it
/// between the VAD and STT event loops.
pub struct ArbitrationEngine {
    inner: Arc<EngineInner>,
    runtime: Handle,
}

impl ArbitrationEngine {
    /// Create an engine for `session` that commits through `commit`.
    ///
    /// # Errors
    /// - `BargeInError::NoRuntime` outside a Tokio runtime.
    /// - `BargeInError::InvalidConfig` if the word lists overlap.
    pub fn new(
        mut config: ArbitrationConfig,
        session: Arc<dyn SessionContext>,
        commit: Arc<dyn CommitInterrupt>,
    ) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| BargeInError::NoRuntime)?;
        config.normalize();
        let lexicon = config.lexicon()?;
        let window = config.window();
        let (events_tx, _) = broadcast::channel(BROADCAST_CAP);

        info!(
            min_delay_ms = config.pending_interrupt_min_delay_ms,
            max_delay_ms = config.pending_interrupt_max_delay_ms,
            soft_words = lexicon.soft_ignore().len(),
            hard_words = lexicon.hard_interrupt().len(),
            "arbitration engine ready"
        );

        Ok(Self {
            inner: Arc::new(EngineInner {
                lexicon,
                window,
                session,
                commit,
                state: Mutex::new(ArbiterState::default()),
                events_tx,
                seq: AtomicU64::new(0),
                diagnostics: ArbitrationDiagnostics::default(),
            }),
            runtime,
        })
    }

    /// Engine whose commit interrupts the session's current speech.
    pub fn with_default_commit(
        config: ArbitrationConfig,
        session: Arc<dyn SessionContext>,
    ) -> Result<Self> {
        let commit = Arc::new(InterruptCurrentSpeech::new(Arc::clone(&session)));
        Self::new(config, session, commit)
    }

    /// Open a validation cycle for detected user voice activity.
    ///
    /// Returns `true` if a cycle was started. Ineligible triggers (agent not
    /// speaking, no interruptible speech) and triggers while a cycle is
    /// already live are ignored.
    pub fn request_interrupt_validation(&self, reason: &str) -> bool {
        let inner = &self.inner;
        ArbitrationDiagnostics::bump(&inner.diagnostics.triggers_received);

        if !inner.turn_is_interruptible() {
            debug!(reason, "interrupt validation ignored: turn not interruptible");
            ArbitrationDiagnostics::bump(&inner.diagnostics.triggers_ignored);
            return false;
        }

        let mut state = inner.state.lock();
        if let Some(live) = state.pending.as_ref() {
            debug!(reason, id = live.id, "interrupt validation already pending");
            return false;
        }

        state.next_id += 1;
        let id = state.next_id;
        let mut pending = PendingValidation::new(id, reason, inner.window);
        let span = info_span!("validation", id, reason);
        let timer = pending::run_timer(
            Arc::downgrade(inner),
            id,
            inner.window,
            pending.resolved_flag(),
        );
        pending.attach_timer(self.runtime.spawn(timer.instrument(span)));
        state.pending = Some(pending);

        ArbitrationDiagnostics::bump(&inner.diagnostics.validations_started);
        info!(id, reason, "interrupt validation started");
        inner.emit(
            id,
            ValidationOutcome::Started,
            ResolutionCause::Trigger,
            reason,
            None,
            Duration::ZERO,
            None,
        );
        true
    }

    /// Handle a provisional transcript.
    ///
    /// # Errors
    /// Propagates a failed commit action.
    pub fn on_interim_transcript(
        &self,
        event: &SpeechEvent,
        speaking: bool,
    ) -> Result<Option<Resolution>> {
        self.inner.on_transcript(event, speaking, false)
    }

    /// Handle an authoritative transcript.
    ///
    /// # Errors
    /// Propagates a failed commit action.
    pub fn on_final_transcript(
        &self,
        event: &SpeechEvent,
        speaking: bool,
    ) -> Result<Option<Resolution>> {
        self.inner.on_transcript(event, speaking, true)
    }

    /// The agent stopped speaking: close any live cycle without committing
    /// and forget the last transcript.
    pub fn end_turn(&self) -> Option<Resolution> {
        let mut state = self.inner.state.lock();
        state.record(TranscriptSnapshot::default());
        state.last_closed_at = Some(Instant::now());
        let id = state.pending.as_ref()?.id;
        let mut pending = state.take_unresolved(id)?;
        drop(state);

        pending.cancel_timer();
        Some(self.inner.cancel(pending, ResolutionCause::TurnEnded, None))
    }

    pub fn phase(&self) -> ValidationPhase {
        if self.has_pending() {
            ValidationPhase::Pending
        } else {
            ValidationPhase::Idle
        }
    }

    pub fn has_pending(&self) -> bool {
        self.inner.state.lock().pending.is_some()
    }

    pub fn transcript_snapshot(&self) -> TranscriptSnapshot {
        self.inner.state.lock().snapshot.clone()
    }

    pub fn lexicon(&self) -> &WordLexicon {
        &self.inner.lexicon
    }

    pub fn window(&self) -> ValidationWindow {
        self.inner.window
    }

    /// Subscribe to validation starts and resolutions.
    pub fn subscribe(&self) -> broadcast::Receiver<ArbitrationEvent> {
        self.inner.events_tx.subscribe()
    }

    pub fn diagnostics_snapshot(&self) -> DiagnosticsSnapshot {
        self.inner.diagnostics.snapshot()
    }
}

impl Drop for ArbitrationEngine {
    fn drop(&mut self) {
        if let Some(mut pending) = self.inner.state.lock().pending.take() {
            pending.cancel_timer();
        }
    }
}

impl std::fmt::Debug for ArbitrationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArbitrationEngine")
            .field("window", &self.inner.window)
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

impl EngineInner {
    /// Agent speaking with live, interruptible speech.
    fn turn_is_interruptible(&self) -> bool {
        if !self.session.agent_state().is_speaking() {
            return false;
        }
        self.session
            .current_speech()
            .is_some_and(|speech| !speech.done() && speech.allow_interruptions())
    }

    fn turn_is_live(&self) -> bool {
        self.session.agent_state().is_speaking() && self.session.current_speech().is_some()
    }

    fn on_transcript(
        &self,
        event: &SpeechEvent,
        speaking: bool,
        is_final: bool,
    ) -> Result<Option<Resolution>> {
        let kind = if is_final { "final" } else { "interim" };
        let text = event.primary_text().trim();

        let mut state = self.state.lock();
        if !text.is_empty() {
            let final_in_cycle = state.snapshot.is_final
                && !state.snapshot_consumed
                && matches!(
                    (state.pending.as_ref(), state.snapshot.seen_at),
                    (Some(p), Some(seen_at)) if p.accepts_evidence_from(seen_at)
                );
            if is_final || !final_in_cycle {
                state.record(TranscriptSnapshot {
                    text: text.to_string(),
                    seen_at: Some(Instant::now()),
                    is_final,
                    user_speaking: speaking,
                });
            }
        }

        let Some(id) = state.pending.as_ref().map(|p| p.id) else {
            if state.trails_closed_cycle(self.window.max_delay) {
                debug!(kind, text, "stale transcript after the cycle closed");
                ArbitrationDiagnostics::bump(&self.diagnostics.stale_transcripts);
            } else {
                debug!(kind, text, "transcript outside a validation cycle");
            }
            return Ok(None);
        };

        if !self.turn_is_live() {
            let Some(mut pending) = state.take_unresolved(id) else {
                return Ok(None);
            };
            drop(state);
            pending.cancel_timer();
            debug!(kind, id, "transcript arrived after the agent stopped speaking");
            return Ok(Some(self.cancel(
                pending,
                ResolutionCause::TurnEnded,
                Some(text.to_string()),
            )));
        }

        let classification = self.lexicon.classify(text);
        debug!(kind, id, text, speaking, ?classification, "transcript classified");
        if !classification.is_decisive() {
            return Ok(None);
        }

        let Some(mut pending) = state.take_unresolved(id) else {
            return Ok(None);
        };
        drop(state);
        pending.cancel_timer();

        match classification {
            Classification::HardInterrupt => self
                .commit(pending, ResolutionCause::HardIntent, Some(text.to_string()))
                .map(Some),
            _ => Ok(Some(self.cancel(
                pending,
                ResolutionCause::SoftBackchannel,
                Some(text.to_string()),
            ))),
        }
    }

    /// `min_delay` checkpoint. Returns `true` if the cycle is over.
    pub(crate) fn checkpoint(&self, id: u64) -> bool {
        let mut state = self.state.lock();
        let Some(live) = state.pending.as_ref().filter(|p| p.id == id) else {
            return true;
        };
        let Some(text) = state.evidence_for(live) else {
            return false;
        };

        let classification = self.lexicon.classify(&text);
        if !classification.is_decisive() {
            return false;
        }
        let Some(mut pending) = state.take_unresolved(id) else {
            return true;
        };
        drop(state);
        pending.release_timer();
        debug!(id, text, ?classification, "resolved at checkpoint");

        match classification {
            Classification::HardInterrupt => {
                // Failure is already logged and reported on the event channel.
                let _ = self.commit(pending, ResolutionCause::HardIntent, Some(text));
            }
            _ => {
                self.cancel(pending, ResolutionCause::SoftBackchannel, Some(text));
            }
        }
        true
    }

    /// `max_delay` reached without a decisive transcript.
    pub(crate) fn expire(&self, id: u64) {
        let turn_live = self.turn_is_live();
        let mut state = self.state.lock();
        let transcript = state
            .pending
            .as_ref()
            .filter(|p| p.id == id)
            .and_then(|p| state.evidence_for(p));
        let Some(mut pending) = state.take_unresolved(id) else {
            return;
        };
        drop(state);
        pending.release_timer();

        if turn_live {
            let _ = self.commit(pending, ResolutionCause::Timeout, transcript);
        } else {
            self.cancel(pending, ResolutionCause::TurnEnded, transcript);
        }
    }

    fn commit(
        &self,
        pending: PendingValidation,
        cause: ResolutionCause,
        transcript: Option<String>,
    ) -> Result<Resolution> {
        let elapsed = pending.elapsed();
        info!(
            id = pending.id,
            ?cause,
            elapsed_ms = elapsed.as_millis() as u64,
            "committing interruption"
        );

        let counter = match cause {
            ResolutionCause::Timeout => &self.diagnostics.committed_by_timeout,
            _ => &self.diagnostics.committed_by_intent,
        };
        ArbitrationDiagnostics::bump(counter);

        let result = self.commit.commit();
        let detail = result.as_ref().err().map(|e| {
            error!(id = pending.id, "interrupt commit failed: {e}");
            ArbitrationDiagnostics::bump(&self.diagnostics.commit_failures);
            e.to_string()
        });

        self.emit(
            pending.id,
            ValidationOutcome::Committed,
            cause,
            &pending.reason,
            transcript,
            elapsed,
            detail,
        );

        result.map(|()| Resolution {
            validation_id: pending.id,
            outcome: ValidationOutcome::Committed,
            cause,
        })
    }

    fn cancel(
        &self,
        pending: PendingValidation,
        cause: ResolutionCause,
        transcript: Option<String>,
    ) -> Resolution {
        let elapsed = pending.elapsed();
        info!(
            id = pending.id,
            ?cause,
            elapsed_ms = elapsed.as_millis() as u64,
            "interrupt validation cancelled"
        );

        let counter = match cause {
            ResolutionCause::TurnEnded => &self.diagnostics.cancelled_turn_ended,
            _ => &self.diagnostics.cancelled_backchannel,
        };
        ArbitrationDiagnostics::bump(counter);

        self.emit(
            pending.id,
            ValidationOutcome::Cancelled,
            cause,
            &pending.reason,
            transcript,
            elapsed,
            None,
        );

        Resolution {
            validation_id: pending.id,
            outcome: ValidationOutcome::Cancelled,
            cause,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn emit(
        &self,
        validation_id: u64,
        outcome: ValidationOutcome,
        cause: ResolutionCause,
        reason: &str,
        transcript: Option<String>,
        elapsed: Duration,
        detail: Option<String>,
    ) {
        // No subscribers is fine.
        let _ = self.events_tx.send(ArbitrationEvent {
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
            validation_id,
            outcome,
            cause,
            reason: reason.to_string(),
            transcript,
            elapsed_ms: elapsed.as_millis() as u64,
            detail,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::local::{LocalSession, LocalSpeech};
    use std::sync::atomic::AtomicUsize;

    fn fast_config() -> ArbitrationConfig {
        ArbitrationConfig {
            soft_ignore_words: ["yeah", "ok", "hmm", "aha"].map(String::from).to_vec(),
            hard_interrupt_words: ["stop", "wait"].map(String::from).to_vec(),
            pending_interrupt_min_delay_ms: 10,
            pending_interrupt_max_delay_ms: 50,
        }
    }

    fn speaking_session() -> (Arc<LocalSession>, Arc<LocalSpeech>) {
        let session = Arc::new(LocalSession::default());
        let speech = Arc::new(LocalSpeech::new(true));
        session.begin_speech(speech.clone());
        (session, speech)
    }

    fn counting_commit() -> (Arc<dyn CommitInterrupt>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let commit: Arc<dyn CommitInterrupt> = Arc::new(move || -> Result<()> {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        (commit, calls)
    }

    #[test]
    fn normalize_keeps_min_below_max() {
        let mut config = ArbitrationConfig {
            pending_interrupt_min_delay_ms: 9_000,
            pending_interrupt_max_delay_ms: 100,
            ..Default::default()
        };
        config.normalize();
        assert_eq!(config.pending_interrupt_min_delay_ms, MAX_MIN_DELAY_MS);
        assert_eq!(config.pending_interrupt_max_delay_ms, MAX_MIN_DELAY_MS);

        let mut config = ArbitrationConfig {
            pending_interrupt_max_delay_ms: 60_000,
            ..Default::default()
        };
        config.normalize();
        assert_eq!(config.pending_interrupt_max_delay_ms, MAX_MAX_DELAY_MS);
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: ArbitrationConfig =
            serde_json::from_str(r#"{"pendingInterruptMaxDelayMs":900}"#).expect("parse config");
        assert_eq!(config.pending_interrupt_min_delay_ms, 250);
        assert_eq!(config.pending_interrupt_max_delay_ms, 900);
        assert!(config.soft_ignore_words.iter().any(|w| w == "yeah"));
    }

    #[test]
    fn construction_requires_a_runtime() {
        let (session, _) = speaking_session();
        let (commit, _) = counting_commit();
        let err = ArbitrationEngine::new(fast_config(), session, commit)
            .expect_err("no runtime in a plain test");
        assert!(matches!(err, BargeInError::NoRuntime));
    }

    #[tokio::test]
    async fn overlapping_lexicon_is_rejected() {
        let (session, _) = speaking_session();
        let (commit, _) = counting_commit();
        let mut config = fast_config();
        config.hard_interrupt_words.push("yeah".into());
        let err = ArbitrationEngine::new(config, session, commit).expect_err("overlap");
        assert!(matches!(err, BargeInError::InvalidConfig(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn interim_does_not_replace_final_within_cycle() {
        let (session, _) = speaking_session();
        let (commit, _) = counting_commit();
        let engine = ArbitrationEngine::new(fast_config(), session, commit).expect("engine");

        assert!(engine.request_interrupt_validation("vad"));
        engine
            .on_final_transcript(&SpeechEvent::from_text("tell me more"), true)
            .expect("final handled");
        engine
            .on_interim_transcript(&SpeechEvent::from_text("tell"), true)
            .expect("interim handled");

        let snapshot = engine.transcript_snapshot();
        assert_eq!(snapshot.text, "tell me more");
        assert!(snapshot.is_final);
        assert_eq!(engine.phase(), ValidationPhase::Pending);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_transcript_leaves_cycle_and_snapshot_untouched() {
        let (session, _) = speaking_session();
        let (commit, calls) = counting_commit();
        let engine = ArbitrationEngine::new(fast_config(), session, commit).expect("engine");

        engine.request_interrupt_validation("vad");
        let res = engine
            .on_interim_transcript(&SpeechEvent::default(), true)
            .expect("handled");
        assert!(res.is_none());
        assert!(engine.has_pending());
        assert!(engine.transcript_snapshot().seen_at.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn end_turn_cancels_without_commit() {
        let (session, _) = speaking_session();
        let (commit, calls) = counting_commit();
        let engine = ArbitrationEngine::new(fast_config(), session, commit).expect("engine");

        engine.request_interrupt_validation("vad");
        let res = engine.end_turn().expect("live cycle cancelled");
        assert_eq!(res.cause, ResolutionCause::TurnEnded);
        assert_eq!(res.outcome, ValidationOutcome::Cancelled);
        assert!(engine.end_turn().is_none());

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(engine.diagnostics_snapshot().cancelled_turn_ended, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transcript_after_agent_stopped_speaking_cancels() {
        let (session, _) = speaking_session();
        let (commit, calls) = counting_commit();
        let engine =
            ArbitrationEngine::new(fast_config(), session.clone(), commit).expect("engine");

        engine.request_interrupt_validation("vad");
        session.end_speech();
        let res = engine
            .on_final_transcript(&SpeechEvent::from_text("stop"), true)
            .expect("handled")
            .expect("cycle closed");
        assert_eq!(res.cause, ResolutionCause::TurnEnded);

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn new_cycle_may_start_after_resolution() {
        let (session, _) = speaking_session();
        let (commit, _) = counting_commit();
        let engine = ArbitrationEngine::new(fast_config(), session, commit).expect("engine");

        assert!(engine.request_interrupt_validation("vad"));
        engine
            .on_interim_transcript(&SpeechEvent::from_text("hmm"), true)
            .expect("handled");
        assert_eq!(engine.phase(), ValidationPhase::Idle);
        assert!(engine.request_interrupt_validation("vad"));
    }

    #[tokio::test(start_paused = true)]
    async fn uninterruptible_speech_never_opens_a_cycle() {
        let session = Arc::new(LocalSession::default());
        session.begin_speech(Arc::new(LocalSpeech::new(false)));
        let (commit, _) = counting_commit();
        let engine = ArbitrationEngine::new(fast_config(), session, commit).expect("engine");

        assert!(!engine.request_interrupt_validation("vad"));
        assert_eq!(engine.diagnostics_snapshot().triggers_ignored, 1);
    }
}
