//! Types exchanged with the recogniser and with arbitration observers.
//!
//! All types derive `serde::Serialize` + `serde::Deserialize` so hosts can
//! log them as JSON lines or forward them over their own event bus.

pub mod events;
