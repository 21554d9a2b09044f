//! Word-set classifier for user utterances heard while the agent is speaking.
//!
//! ## Algorithm
//!
//! 1. Trim and lowercase the transcript, split on whitespace.
//! 2. Strip leading/trailing punctuation from each token (`"Yeah."` → `yeah`).
//!    Inner apostrophes and hyphens survive (`uh-huh`).
//! 3. Any token in the hard-interrupt set → `HardInterrupt`.
//! 4. Otherwise, every token in the soft-ignore set → `SoftBackchannel`.
//! 5. Otherwise → `Ambiguous` (ordinary speech, no lexicon verdict).
//!
//! Lookups are exact token matches: `"stopwatch"` carries no hard intent.

use std::collections::HashSet;

use crate::error::{BargeInError, Result};

pub const DEFAULT_SOFT_IGNORE_WORDS: &[&str] = &[
    "yeah", "yes", "yep", "ok", "okay", "hmm", "mhm", "mm", "aha", "uh-huh", "right", "sure",
    "cool",
];

pub const DEFAULT_HARD_INTERRUPT_WORDS: &[&str] = &["stop", "wait", "hold", "pause", "no", "cancel"];

/// Verdict for a single transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// At least one token signals explicit intent to stop the agent.
    HardInterrupt,
    /// Every token is filler; the user is only acknowledging.
    SoftBackchannel,
    /// Real content outside both word sets.
    Ambiguous,
    /// No tokens at all, so not evidence of anything.
    Empty,
}

impl Classification {
    pub fn is_decisive(self) -> bool {
        matches!(
            self,
            Classification::HardInterrupt | Classification::SoftBackchannel
        )
    }
}

/// Two disjoint sets of lowercase tokens.
#[derive(Debug, Clone)]
pub struct WordLexicon {
    soft_ignore: HashSet<String>,
    hard_interrupt: HashSet<String>,
}

impl WordLexicon {
    /// Build a lexicon from configured word lists.
    ///
    /// Words are trimmed and lowercased; empty entries are dropped.
    ///
    /// # Errors
    /// `BargeInError::InvalidConfig` if a word appears in both sets.
    pub fn new<S, H>(soft_ignore: S, hard_interrupt: H) -> Result<Self>
    where
        S: IntoIterator,
        S::Item: AsRef<str>,
        H: IntoIterator,
        H::Item: AsRef<str>,
    {
        let soft_ignore = normalize_words(soft_ignore);
        let hard_interrupt = normalize_words(hard_interrupt);

        let mut overlap: Vec<&str> = soft_ignore
            .intersection(&hard_interrupt)
            .map(String::as_str)
            .collect();
        if !overlap.is_empty() {
            overlap.sort_unstable();
            return Err(BargeInError::InvalidConfig(format!(
                "words listed as both soft-ignore and hard-interrupt: {}",
                overlap.join(", ")
            )));
        }

        Ok(Self {
            soft_ignore,
            hard_interrupt,
        })
    }

    /// True iff the text has at least one token and every token is soft filler.
    pub fn is_soft_backchannel(&self, text: &str) -> bool {
        let mut tokens = tokens(text).peekable();
        if tokens.peek().is_none() {
            return false;
        }
        tokens.all(|t| self.soft_ignore.contains(t.as_str()))
    }

    /// True iff any token is a hard-interrupt word.
    pub fn contains_hard_interrupt_intent(&self, text: &str) -> bool {
        tokens(text).any(|t| self.hard_interrupt.contains(t.as_str()))
    }

    pub fn classify(&self, text: &str) -> Classification {
        if word_count(text) == 0 {
            Classification::Empty
        } else if self.contains_hard_interrupt_intent(text) {
            Classification::HardInterrupt
        } else if self.is_soft_backchannel(text) {
            Classification::SoftBackchannel
        } else {
            Classification::Ambiguous
        }
    }

    pub fn soft_ignore(&self) -> &HashSet<String> {
        &self.soft_ignore
    }

    pub fn hard_interrupt(&self) -> &HashSet<String> {
        &self.hard_interrupt
    }
}

impl Default for WordLexicon {
    fn default() -> Self {
        Self {
            soft_ignore: normalize_words(DEFAULT_SOFT_IGNORE_WORDS),
            hard_interrupt: normalize_words(DEFAULT_HARD_INTERRUPT_WORDS),
        }
    }
}

/// Number of normalised tokens in `text`.
pub fn word_count(text: &str) -> usize {
    tokens(text).count()
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split_whitespace().filter_map(|raw| {
        let token = raw
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        (!token.is_empty()).then_some(token)
    })
}

fn normalize_words<I>(words: I) -> HashSet<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    words
        .into_iter()
        .map(|w| w.as_ref().trim().to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}
