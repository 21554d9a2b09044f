//! The action run when a validation cycle commits to an interruption.
//!
//! The arbiter decides *whether* to interrupt; a `CommitInterrupt` decides
//! *how*. Owners inject their own action (e.g. one that also transitions the
//! session to `Listening`), or use `InterruptCurrentSpeech`.

use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::session::SessionContext;

/// Called exactly once per committed validation cycle.
///
/// Errors are not swallowed by the arbiter: on transcript paths they are
/// returned to the caller, on the timer path they are logged and reported
/// on the event channel.
pub trait CommitInterrupt: Send + Sync + 'static {
    fn commit(&self) -> Result<()>;
}

impl<F> CommitInterrupt for F
where
    F: Fn() -> Result<()> + Send + Sync + 'static,
{
    fn commit(&self) -> Result<()> {
        self()
    }
}

/// Interrupts whatever speech the session is currently playing.
pub struct InterruptCurrentSpeech {
    session: Arc<dyn SessionContext>,
}

impl InterruptCurrentSpeech {
    pub fn new(session: Arc<dyn SessionContext>) -> Self {
        Self { session }
    }
}

impl CommitInterrupt for InterruptCurrentSpeech {
    fn commit(&self) -> Result<()> {
        let Some(speech) = self.session.current_speech() else {
            debug!("commit: no current speech");
            return Ok(());
        };
        if speech.done() || !speech.allow_interruptions() {
            debug!("commit: current speech finished or uninterruptible");
            return Ok(());
        }
        speech.interrupt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::local::{LocalSession, LocalSpeech};
    use crate::session::SpeechHandle;

    #[test]
    fn interrupts_live_interruptible_speech() {
        let session = Arc::new(LocalSession::default());
        let speech = Arc::new(LocalSpeech::new(true));
        session.begin_speech(speech.clone());

        InterruptCurrentSpeech::new(session)
            .commit()
            .expect("commit succeeds");
        assert!(speech.interrupted());
    }

    #[test]
    fn leaves_uninterruptible_or_finished_speech_alone() {
        let session = Arc::new(LocalSession::default());
        let locked = Arc::new(LocalSpeech::new(false));
        session.begin_speech(locked.clone());
        let action = InterruptCurrentSpeech::new(session.clone());
        action.commit().expect("commit succeeds");
        assert!(!locked.interrupted());

        let finished = Arc::new(LocalSpeech::new(true));
        finished.finish();
        session.begin_speech(finished.clone());
        action.commit().expect("commit succeeds");
        assert!(!finished.interrupted());
        assert!(finished.done());
    }

    #[test]
    fn closures_are_commit_actions() {
        let action: Arc<dyn CommitInterrupt> = Arc::new(|| -> Result<()> {
            Err(crate::BargeInError::Commit("playout gone".into()))
        });
        assert!(action.commit().is_err());
    }
}
