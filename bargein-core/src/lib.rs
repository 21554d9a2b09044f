//! # bargein-core
//!
//! Barge-in arbitration for voice agents.
//!
//! ## Architecture
//!
//! ```text
//! VAD activity ──► ArbitrationEngine::request_interrupt_validation
//!                        │
//!                  PendingValidation (timer task: min_delay checkpoint → max_delay)
//!                        │
//! STT interim/final ──► WordLexicon::classify
//!                        │
//!         hard intent → commit │ backchannel → cancel │ ambiguous → keep waiting
//!                        │
//!              CommitInterrupt::commit (exactly once per validation)
//!                        │
//!              broadcast::Sender<ArbitrationEvent>
//! ```
//!
//! The engine only reads the session through the traits in [`session`]; it
//! never owns the agent's speech.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod engine;
pub mod error;
pub mod ipc;
pub mod lexicon;
pub mod session;

// Convenience re-exports for downstream crates
pub use engine::{
    commit::{CommitInterrupt, InterruptCurrentSpeech},
    ArbitrationConfig, ArbitrationEngine, Resolution, TranscriptSnapshot, ValidationPhase,
};
pub use error::{BargeInError, Result};
pub use ipc::events::{
    ArbitrationEvent, ResolutionCause, SpeechAlternative, SpeechEvent, ValidationOutcome,
};
pub use lexicon::{Classification, WordLexicon};
pub use session::{AgentState, OutputSink, SessionContext, SessionOptions, SpeechHandle};
