//! In-memory session and speech handles.
//!
//! Used by the headless host and by tests. All fields use interior
//! mutability so a `LocalSession` can be shared behind an `Arc` between the
//! arbiter and whatever drives the session.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use parking_lot::RwLock;
use tracing::debug;

use super::{AgentState, OutputSink, SessionContext, SessionOptions, SpeechHandle};
use crate::error::Result;

/// A speech whose only effect is flipping flags.
#[derive(Debug)]
pub struct LocalSpeech {
    allow_interruptions: AtomicBool,
    interrupted: AtomicBool,
    done: AtomicBool,
}

impl LocalSpeech {
    pub fn new(allow_interruptions: bool) -> Self {
        Self {
            allow_interruptions: AtomicBool::new(allow_interruptions),
            interrupted: AtomicBool::new(false),
            done: AtomicBool::new(false),
        }
    }

    pub fn interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }

    pub fn set_allow_interruptions(&self, allow: bool) {
        self.allow_interruptions.store(allow, Ordering::SeqCst);
    }

    /// Mark playout as finished.
    pub fn finish(&self) {
        self.done.store(true, Ordering::SeqCst);
    }
}

impl SpeechHandle for LocalSpeech {
    fn allow_interruptions(&self) -> bool {
        self.allow_interruptions.load(Ordering::SeqCst)
    }

    fn interrupt(&self) -> Result<()> {
        debug!("LocalSpeech::interrupt");
        self.interrupted.store(true, Ordering::SeqCst);
        self.done.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn done(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }
}

/// Output that can never pause.
#[derive(Debug, Default)]
pub struct NullOutput;

impl OutputSink for NullOutput {
    fn can_pause(&self) -> bool {
        false
    }

    fn pause(&self) -> Result<()> {
        Ok(())
    }
}

pub struct LocalSession {
    state: RwLock<AgentState>,
    options: RwLock<SessionOptions>,
    speech: RwLock<Option<Arc<dyn SpeechHandle>>>,
    output: Arc<dyn OutputSink>,
}

impl LocalSession {
    pub fn new(options: SessionOptions) -> Self {
        Self {
            state: RwLock::new(AgentState::Listening),
            options: RwLock::new(options),
            speech: RwLock::new(None),
            output: Arc::new(NullOutput),
        }
    }

    pub fn set_agent_state(&self, state: AgentState) {
        *self.state.write() = state;
    }

    pub fn set_current_speech(&self, speech: Option<Arc<dyn SpeechHandle>>) {
        *self.speech.write() = speech;
    }

    /// Install `speech` as current and move the agent to `Speaking`.
    pub fn begin_speech(&self, speech: Arc<dyn SpeechHandle>) {
        self.set_current_speech(Some(speech));
        self.set_agent_state(AgentState::Speaking);
    }

    /// Drop the current speech and return to `Listening`.
    pub fn end_speech(&self) {
        self.set_current_speech(None);
        self.set_agent_state(AgentState::Listening);
    }
}

impl Default for LocalSession {
    fn default() -> Self {
        Self::new(SessionOptions::default())
    }
}

impl SessionContext for LocalSession {
    fn agent_state(&self) -> AgentState {
        *self.state.read()
    }

    fn options(&self) -> SessionOptions {
        self.options.read().clone()
    }

    fn current_speech(&self) -> Option<Arc<dyn SpeechHandle>> {
        self.speech.read().clone()
    }

    fn output(&self) -> Arc<dyn OutputSink> {
        Arc::clone(&self.output)
    }
}

impl std::fmt::Debug for LocalSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalSession")
            .field("state", &*self.state.read())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_and_end_speech_drive_agent_state() {
        let session = LocalSession::default();
        assert_eq!(session.agent_state(), AgentState::Listening);
        assert!(session.current_speech().is_none());

        session.begin_speech(Arc::new(LocalSpeech::new(true)));
        assert_eq!(session.agent_state(), AgentState::Speaking);
        assert!(session.current_speech().is_some());

        session.end_speech();
        assert_eq!(session.agent_state(), AgentState::Listening);
        assert!(session.current_speech().is_none());
    }

    #[test]
    fn interrupt_marks_speech_done() {
        let speech = LocalSpeech::new(true);
        assert!(!speech.done());
        speech.interrupt().expect("local interrupt never fails");
        assert!(speech.interrupted());
        assert!(speech.done());
    }

    #[test]
    fn null_output_cannot_pause() {
        let session = LocalSession::default();
        assert!(!session.output().can_pause());
    }
}
