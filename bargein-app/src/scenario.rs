//! Scripted session timelines.
//!
//! A scenario is a JSON array of steps, each scheduled at `atMs` after the
//! replay starts:
//!
//! ```json
//! [
//!   { "atMs": 0,   "action": "speechStarted", "allowInterruptions": true },
//!   { "atMs": 400, "action": "vad", "reason": "vad_start", "activityMs": 600 },
//!   { "atMs": 520, "action": "interim", "text": "yeah" }
//! ]
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bargein_core::{
    engine::gate::{meets_interruption_minimums, should_discard_audio},
    session::local::{LocalSession, LocalSpeech},
    AgentState, ArbitrationEngine, CommitInterrupt, InterruptCurrentSpeech, SessionContext,
    SpeechEvent,
};
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::settings::AppSettings;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioStep {
    pub at_ms: u64,
    #[serde(flatten)]
    pub action: StepAction,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum StepAction {
    /// The agent starts a new utterance.
    #[serde(rename_all = "camelCase")]
    SpeechStarted {
        #[serde(default = "default_true")]
        allow_interruptions: bool,
    },
    /// The agent's utterance finished playing.
    SpeechDone,
    AgentState { state: AgentState },
    /// Voice activity from the VAD.
    #[serde(rename_all = "camelCase")]
    Vad {
        reason: String,
        #[serde(default)]
        activity_ms: u64,
    },
    Interim {
        text: String,
        #[serde(default = "default_true")]
        speaking: bool,
    },
    Final {
        text: String,
        #[serde(default = "default_true")]
        speaking: bool,
    },
}

fn default_true() -> bool {
    true
}

pub fn load_scenario(path: &Path) -> anyhow::Result<Vec<ScenarioStep>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading scenario {}", path.display()))?;
    let mut steps: Vec<ScenarioStep> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing scenario {}", path.display()))?;
    steps.sort_by_key(|s| s.at_ms);
    Ok(steps)
}

/// Built-in timeline: a backchannel that is ignored, then an explicit stop.
pub fn demo_scenario() -> Vec<ScenarioStep> {
    let step = |at_ms, action| ScenarioStep { at_ms, action };
    vec![
        step(
            0,
            StepAction::SpeechStarted {
                allow_interruptions: true,
            },
        ),
        step(
            300,
            StepAction::Vad {
                reason: "vad_start".into(),
                activity_ms: 600,
            },
        ),
        step(
            420,
            StepAction::Interim {
                text: "yeah".into(),
                speaking: true,
            },
        ),
        step(
            500,
            StepAction::Final {
                text: "Yeah.".into(),
                speaking: false,
            },
        ),
        step(
            1_400,
            StepAction::Vad {
                reason: "vad_start".into(),
                activity_ms: 700,
            },
        ),
        step(
            1_520,
            StepAction::Interim {
                text: "wait".into(),
                speaking: true,
            },
        ),
        step(
            1_650,
            StepAction::Final {
                text: "wait hold on".into(),
                speaking: true,
            },
        ),
    ]
}

/// Commit action of the host session: stop the speech, then hand the turn
/// back to the user.
struct HostCommit {
    session: Arc<LocalSession>,
    interrupt: InterruptCurrentSpeech,
}

impl CommitInterrupt for HostCommit {
    fn commit(&self) -> bargein_core::Result<()> {
        self.interrupt.commit()?;
        self.session.end_speech();
        Ok(())
    }
}

/// Engine bound to a fresh local session with the host's commit action.
pub fn build_engine(
    settings: &AppSettings,
) -> anyhow::Result<(ArbitrationEngine, Arc<LocalSession>)> {
    let session = Arc::new(LocalSession::new(settings.session.clone()));
    let commit = Arc::new(HostCommit {
        session: Arc::clone(&session),
        interrupt: InterruptCurrentSpeech::new(session.clone()),
    });
    let engine = ArbitrationEngine::new(settings.arbitration.clone(), session.clone(), commit)?;
    Ok((engine, session))
}

/// Replay `steps` against `session`, then wait out any live validation.
pub async fn replay(
    engine: &ArbitrationEngine,
    session: &Arc<LocalSession>,
    steps: &[ScenarioStep],
) -> anyhow::Result<()> {
    let start = Instant::now();
    for step in steps {
        sleep_until(start + Duration::from_millis(step.at_ms)).await;
        debug!(at_ms = step.at_ms, action = ?step.action, "scenario step");
        apply(engine, session, &step.action)?;
    }

    sleep(engine.window().max_delay + Duration::from_millis(50)).await;
    Ok(())
}

fn apply(
    engine: &ArbitrationEngine,
    session: &Arc<LocalSession>,
    action: &StepAction,
) -> anyhow::Result<()> {
    match action {
        StepAction::SpeechStarted {
            allow_interruptions,
        } => {
            session.begin_speech(Arc::new(LocalSpeech::new(*allow_interruptions)));
            info!(allow_interruptions, "agent speech started");
        }
        StepAction::SpeechDone => {
            if let Some(speech) = session.current_speech() {
                debug!(done = speech.done(), "agent speech finished");
            }
            session.end_speech();
            engine.end_turn();
        }
        StepAction::AgentState { state } => {
            session.set_agent_state(*state);
            if !state.is_speaking() {
                engine.end_turn();
            }
        }
        StepAction::Vad {
            reason,
            activity_ms,
        } => {
            if should_discard_audio(session.as_ref()) {
                debug!(reason, "discarding user audio during uninterruptible speech");
                return Ok(());
            }
            let snapshot = engine.transcript_snapshot();
            let transcript = (!snapshot.text.is_empty()).then_some(snapshot.text.as_str());
            let options = session.options();
            if !meets_interruption_minimums(
                &options,
                engine.lexicon(),
                Duration::from_millis(*activity_ms),
                transcript,
            ) {
                debug!(reason, activity_ms, "activity below interruption minimums");
                return Ok(());
            }
            engine.request_interrupt_validation(reason);
        }
        StepAction::Interim { text, speaking } => {
            if let Err(e) = engine.on_interim_transcript(&SpeechEvent::from_text(text), *speaking)
            {
                warn!("interim transcript commit failed: {e}");
            }
        }
        StepAction::Final { text, speaking } => {
            if let Err(e) = engine.on_final_transcript(&SpeechEvent::from_text(text), *speaking) {
                warn!("final transcript commit failed: {e}");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bargein_core::{ResolutionCause, ValidationOutcome};

    fn fast_settings() -> AppSettings {
        let mut settings = AppSettings::default();
        settings.arbitration.pending_interrupt_min_delay_ms = 20;
        settings.arbitration.pending_interrupt_max_delay_ms = 100;
        settings.session.min_interruption_duration = Duration::ZERO;
        settings
    }

    #[test]
    fn steps_parse_from_camel_case_json() {
        let steps: Vec<ScenarioStep> = serde_json::from_str(
            r#"[
                {"atMs":0,"action":"speechStarted"},
                {"atMs":10,"action":"vad","reason":"vad_start","activityMs":300},
                {"atMs":20,"action":"agentState","state":"thinking"},
                {"atMs":30,"action":"final","text":"stop"}
            ]"#,
        )
        .expect("parse scenario");
        assert!(matches!(
            steps[0].action,
            StepAction::SpeechStarted {
                allow_interruptions: true
            }
        ));
        assert!(matches!(
            steps[1].action,
            StepAction::Vad { activity_ms: 300, .. }
        ));
        assert!(matches!(
            steps[2].action,
            StepAction::AgentState {
                state: AgentState::Thinking
            }
        ));
        assert!(matches!(steps[3].action, StepAction::Final { speaking: true, .. }));
    }

    fn opening_steps(activity_ms: u64) -> Vec<ScenarioStep> {
        vec![
            ScenarioStep {
                at_ms: 0,
                action: StepAction::SpeechStarted {
                    allow_interruptions: true,
                },
            },
            ScenarioStep {
                at_ms: 10,
                action: StepAction::Vad {
                    reason: "vad_start".into(),
                    activity_ms,
                },
            },
        ]
    }

    #[tokio::test(start_paused = true)]
    async fn demo_ignores_backchannel_then_stops_on_intent() {
        // The demo's transcripts trail their triggers by up to 250 ms.
        let mut settings = fast_settings();
        settings.arbitration.pending_interrupt_max_delay_ms = 400;
        let (engine, session) = build_engine(&settings).expect("engine");

        replay(&engine, &session, &demo_scenario())
            .await
            .expect("replay");

        let diag = engine.diagnostics_snapshot();
        assert_eq!(diag.validations_started, 2);
        assert_eq!(diag.cancelled_backchannel, 1);
        assert_eq!(diag.committed_by_intent, 1);
        assert_eq!(diag.committed_by_timeout, 0);
        assert_eq!(session.agent_state(), AgentState::Listening);
    }

    #[tokio::test(start_paused = true)]
    async fn short_activity_is_gated_out() {
        let mut settings = fast_settings();
        settings.session.min_interruption_duration = Duration::from_millis(500);
        let (engine, session) = build_engine(&settings).expect("engine");

        replay(&engine, &session, &opening_steps(80))
            .await
            .expect("replay");

        let diag = engine.diagnostics_snapshot();
        assert_eq!(diag.triggers_received, 0);
        assert_eq!(diag.commits(), 0);
        assert_eq!(session.agent_state(), AgentState::Speaking);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_commit_hands_turn_back_to_user() {
        let settings = fast_settings();
        let (engine, session) = build_engine(&settings).expect("engine");
        let mut rx = engine.subscribe();

        replay(&engine, &session, &opening_steps(600))
            .await
            .expect("replay");

        let started = rx.try_recv().expect("start event");
        assert_eq!(started.outcome, ValidationOutcome::Started);
        let committed = rx.try_recv().expect("commit event");
        assert_eq!(committed.outcome, ValidationOutcome::Committed);
        assert_eq!(committed.cause, ResolutionCause::Timeout);
        assert!(committed.detail.is_none());
        assert_eq!(session.agent_state(), AgentState::Listening);
        assert!(session.current_speech().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn uninterruptible_speech_discards_activity() {
        let settings = fast_settings();
        let (engine, session) = build_engine(&settings).expect("engine");
        let mut steps = opening_steps(600);
        steps[0].action = StepAction::SpeechStarted {
            allow_interruptions: false,
        };

        replay(&engine, &session, &steps).await.expect("replay");
        assert_eq!(engine.diagnostics_snapshot().triggers_received, 0);
    }
}
