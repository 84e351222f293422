//! # Context Builder
//!
//! Decides which prior turns are replayed to the generation service and
//! renders them into a single prompt block.
//!
//! ## Rendering Template:
//! ```text
//! Usuario: <prompt of oldest windowed turn>
//! Modelo: <its raw response>
//! ...
//! Usuario: <new prompt>
//! ```
//! The block always ends with the new prompt and no model line, leaving the
//! continuation to the model.
//!
//! ## Window Policy:
//! Only the newest `window_size` turns are rendered. The stored log is not
//! touched here; capping storage is a separate, opt-in concern handled by the
//! chat service.

use crate::conversation::error::ChatResult;
use crate::conversation::turn::{HistoryLog, Turn};
use std::fmt::Write;
use std::num::NonZeroUsize;

pub const DEFAULT_WINDOW_SIZE: usize = 4;
pub const DEFAULT_USER_TAG: &str = "Usuario";
pub const DEFAULT_MODEL_TAG: &str = "Modelo";

/// Windowed renderer with configurable speaker tags.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    window_size: NonZeroUsize,
    user_tag: String,
    model_tag: String,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self {
            window_size: NonZeroUsize::new(DEFAULT_WINDOW_SIZE).unwrap_or(NonZeroUsize::MIN),
            user_tag: DEFAULT_USER_TAG.to_string(),
            model_tag: DEFAULT_MODEL_TAG.to_string(),
        }
    }
}

impl ContextBuilder {
    pub fn new(window_size: NonZeroUsize) -> Self {
        Self {
            window_size,
            ..Self::default()
        }
    }

    pub fn with_tags(mut self, user_tag: impl Into<String>, model_tag: impl Into<String>) -> Self {
        self.user_tag = user_tag.into();
        self.model_tag = model_tag.into();
        self
    }

    pub fn window_size(&self) -> NonZeroUsize {
        self.window_size
    }

    /// Render the windowed history followed by `new_prompt`.
    pub fn render(&self, history: &HistoryLog, new_prompt: &str) -> String {
        let window = history.recent(self.window_size.get());

        let mut context = String::new();
        for turn in window {
            // Writing into a String cannot fail.
            let _ = writeln!(context, "{}: {}", self.user_tag, turn.prompt());
            let _ = writeln!(context, "{}: {}", self.model_tag, turn.response_raw());
        }
        let _ = writeln!(context, "{}: {}", self.user_tag, new_prompt);
        context
    }
}

/// Render with the default `Usuario`/`Modelo` tags.
pub fn render_context(history: &HistoryLog, window_size: NonZeroUsize, new_prompt: &str) -> String {
    ContextBuilder::new(window_size).render(history, new_prompt)
}

/// Validate and append a new turn to the end of `history`.
///
/// All-or-nothing: validation happens before the log is touched, so on
/// `ChatError::InvalidTurn` the log is exactly as it was.
pub fn append_turn(
    history: &mut HistoryLog,
    prompt: &str,
    response_raw: &str,
    response_html: &str,
) -> ChatResult<()> {
    let turn = Turn::new(prompt, response_raw, response_html)?;
    history.push(turn);
    Ok(())
}
