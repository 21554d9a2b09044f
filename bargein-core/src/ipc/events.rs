//! Inbound recognition events and outbound arbitration events.
//!
//! | Type | Direction |
//! |------|-----------|
//! | `SpeechEvent` | STT → arbiter (interim and final transcripts) |
//! | `ArbitrationEvent` | arbiter → observers (`ArbitrationEngine::subscribe`) |

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Recognition events
// ---------------------------------------------------------------------------

/// One recognition update from the STT engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechEvent {
    /// Hypotheses, best first.
    pub alternatives: Vec<SpeechAlternative>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechAlternative {
    pub text: String,
    pub language: String,
    pub speaker_id: Option<String>,
}

impl SpeechEvent {
    /// Single-alternative event, the common shape for streaming recognisers.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            alternatives: vec![SpeechAlternative {
                text: text.into(),
                language: "en".into(),
                speaker_id: None,
            }],
        }
    }

    /// Text of the best alternative, or `""` when there is none.
    pub fn primary_text(&self) -> &str {
        self.alternatives
            .first()
            .map(|alt| alt.text.as_str())
            .unwrap_or("")
    }
}

// ---------------------------------------------------------------------------
// Arbitration events
// ---------------------------------------------------------------------------

/// Emitted for every validation start and every resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArbitrationEvent {
    /// Monotonically increasing event sequence number.
    pub seq: u64,
    /// Validation cycle this event belongs to.
    pub validation_id: u64,
    pub outcome: ValidationOutcome,
    pub cause: ResolutionCause,
    /// Voice-activity reason that opened the cycle.
    pub reason: String,
    /// Transcript the decision was based on, if any.
    pub transcript: Option<String>,
    /// Time since the cycle started.
    pub elapsed_ms: u64,
    /// Optional human-readable detail (e.g. commit error message).
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationOutcome {
    /// A validation cycle opened.
    Started,
    /// The commit action ran; the agent was interrupted.
    Committed,
    /// The cycle closed without interrupting.
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionCause {
    /// Voice activity opened the cycle.
    Trigger,
    /// A transcript carried explicit stop intent.
    HardIntent,
    /// A transcript was pure filler.
    SoftBackchannel,
    /// `max_delay` elapsed without a decisive transcript.
    Timeout,
    /// The agent stopped speaking while the cycle was live.
    TurnEnded,
}
