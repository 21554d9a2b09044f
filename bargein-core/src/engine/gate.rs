//! Pre-trigger policy applied by the owner before it asks the engine to
//! validate an interruption.
//!
//! The engine's own eligibility check only looks at the agent state and the
//! current speech. Session-level minimums (activity duration, word count)
//! and the discard-audio option are evaluated here, by the caller.

use std::time::Duration;

use crate::lexicon::{word_count, WordLexicon};
use crate::session::{SessionContext, SessionOptions};

/// Whether user activity is substantial enough to be worth validating.
///
/// - Activity shorter than `min_interruption_duration` never qualifies.
/// - With `min_interruption_words > 0`, the transcript must carry at least
///   that many words; no transcript yet means not enough words. A transcript
///   with hard intent skips the word minimum.
pub fn meets_interruption_minimums(
    options: &SessionOptions,
    lexicon: &WordLexicon,
    activity: Duration,
    transcript: Option<&str>,
) -> bool {
    if activity < options.min_interruption_duration {
        return false;
    }
    if options.min_interruption_words == 0 {
        return true;
    }
    match transcript {
        Some(text) if lexicon.contains_hard_interrupt_intent(text) => true,
        Some(text) => word_count(text) >= options.min_interruption_words,
        None => false,
    }
}

/// True when user audio should be dropped because the agent is saying
/// something that must not be interrupted.
pub fn should_discard_audio(session: &dyn SessionContext) -> bool {
    if !session.options().discard_audio_if_uninterruptible
        || !session.agent_state().is_speaking()
    {
        return false;
    }
    session
        .current_speech()
        .is_some_and(|speech| !speech.done() && !speech.allow_interruptions())
}
