//! Capability traits for the agent session the arbiter observes.
//!
//! The arbiter depends only on these traits, never on a concrete runtime:
//! the owner's session implements `SessionContext`, its in-flight speech
//! implements `SpeechHandle`. `local` provides in-memory implementations for
//! hosts and tests.

pub mod local;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// What the agent is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    Initializing,
    #[default]
    Listening,
    Thinking,
    Speaking,
}

impl AgentState {
    pub fn is_speaking(self) -> bool {
        self == AgentState::Speaking
    }
}

/// Interruption-related session options.
///
/// `resume_false_interruption` and `false_interruption_timeout` belong to the
/// owner's resume feature and are carried through untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct SessionOptions {
    /// Minimum transcript words before user activity may interrupt. `0` disables.
    pub min_interruption_words: usize,
    /// Minimum voice activity before user activity may interrupt.
    #[serde(with = "duration_ms")]
    pub min_interruption_duration: Duration,
    /// Drop user audio while the agent's speech cannot be interrupted.
    pub discard_audio_if_uninterruptible: bool,
    pub resume_false_interruption: bool,
    #[serde(with = "option_duration_ms")]
    pub false_interruption_timeout: Option<Duration>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            min_interruption_words: 0,
            min_interruption_duration: Duration::from_millis(500),
            discard_audio_if_uninterruptible: true,
            resume_false_interruption: false,
            false_interruption_timeout: None,
        }
    }
}

/// The agent's in-progress output. Shared with the session; the arbiter only
/// reads it or asks it to stop.
pub trait SpeechHandle: Send + Sync {
    fn allow_interruptions(&self) -> bool;

    /// Stop the speech.
    ///
    /// # Errors
    /// Playback-layer failures are returned to the caller unchanged.
    fn interrupt(&self) -> Result<()>;

    fn done(&self) -> bool;
}

/// Audio output the session plays through.
pub trait OutputSink: Send + Sync {
    fn can_pause(&self) -> bool;

    fn pause(&self) -> Result<()>;
}

/// Read-only view of the owning session.
pub trait SessionContext: Send + Sync {
    fn agent_state(&self) -> AgentState;

    fn options(&self) -> SessionOptions;

    /// The speech currently playing, if any.
    fn current_speech(&self) -> Option<Arc<dyn SpeechHandle>>;

    fn output(&self) -> Arc<dyn OutputSink>;
}

/// Serialise a `Duration` as integer milliseconds.
pub(crate) mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

pub(crate) mod option_duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(d).map(|ms| ms.map(Duration::from_millis))
    }
}
