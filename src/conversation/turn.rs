//! # Turns and History Logs
//!
//! A `Turn` is one prompt plus the model's reply; a `HistoryLog` is the
//! chronological list of turns belonging to one session.
//!
//! ## Ownership:
//! - Turns are immutable once built: fields are private and only exposed
//!   through borrowing accessors
//! - The log only grows at the end through `push`; nothing in this module
//!   reorders entries
//! - Both types serialize with serde so session backends can persist them

use crate::conversation::error::{ChatError, ChatResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One exchange between the user and the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    prompt: String,
    response_raw: String,
    response_html: String,
    created_at: DateTime<Utc>,
}

impl Turn {
    /// Build a validated turn.
    ///
    /// ## Validation:
    /// - `prompt` must contain something other than whitespace
    /// - `response_raw` must be present; an empty reply counts as missing
    ///
    /// `response_html` is derived data and is accepted as-is.
    pub fn new(
        prompt: impl Into<String>,
        response_raw: impl Into<String>,
        response_html: impl Into<String>,
    ) -> ChatResult<Self> {
        let prompt = prompt.into();
        let response_raw = response_raw.into();

        if prompt.trim().is_empty() {
            return Err(ChatError::InvalidTurn("prompt cannot be empty".to_string()));
        }
        if response_raw.is_empty() {
            return Err(ChatError::InvalidTurn("response text is missing".to_string()));
        }

        Ok(Self {
            prompt,
            response_raw,
            response_html: response_html.into(),
            created_at: Utc::now(),
        })
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn response_raw(&self) -> &str {
        &self.response_raw
    }

    pub fn response_html(&self) -> &str {
        &self.response_html
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Ordered record of a session's turns, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryLog {
    turns: Vec<Turn>,
}

impl HistoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// The suffix holding at most `count` of the newest turns, still in
    /// chronological order.
    pub fn recent(&self, count: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(count);
        &self.turns[start..]
    }

    /// Append an already-validated turn.
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Drop the oldest turns so at most `max_turns` remain.
    ///
    /// Only used when a storage cap is configured; returns how many turns
    /// were discarded.
    pub fn retain_newest(&mut self, max_turns: usize) -> usize {
        let excess = self.turns.len().saturating_sub(max_turns);
        if excess > 0 {
            self.turns.drain(..excess);
        }
        excess
    }
}

impl From<Vec<Turn>> for HistoryLog {
    fn from(turns: Vec<Turn>) -> Self {
        Self { turns }
    }
}
