//! # Chat Service
//!
//! Runs one conversational exchange end to end:
//!
//! ```text
//! lock session → get history → render context → generate → to_html
//!              → append turn → (cap) → put history → unlock
//! ```
//!
//! ## Concurrency:
//! With session serialization on, the session lock is held across the whole
//! sequence, so two requests for the same user can never overwrite each
//! other's turns. With it off, the store's last-writer-wins rule applies.
//!
//! ## Failure Atomicity:
//! The history is only written after a turn was successfully appended. If
//! generation fails, nothing is stored.

use crate::adapters::{AudioUpload, Generator, ResponseFormatter, Transcriber};
use crate::conversation::context::{append_turn, ContextBuilder};
use crate::conversation::error::{ChatError, ChatResult};
use crate::conversation::turn::HistoryLog;
use crate::session::{SessionId, SessionLocks, SessionStore};
use std::sync::Arc;

/// Generated reply in both raw and presentation form.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub response_raw: String,
    pub response_html: String,
}

/// Result of the spoken round trip: what was heard, what was answered, and
/// the answer as audio when speech is enabled.
#[derive(Debug, Clone)]
pub struct VoiceReply {
    pub transcript: String,
    pub reply: Reply,
    pub audio: Option<Vec<u8>>,
}

pub struct ChatService {
    context: ContextBuilder,
    max_stored_turns: Option<usize>,
    generator: Arc<dyn Generator>,
    transcriber: Option<Arc<dyn Transcriber>>,
    formatter: ResponseFormatter,
    store: Arc<dyn SessionStore>,
    locks: SessionLocks,
}

impl ChatService {
    pub fn new(
        context: ContextBuilder,
        generator: Arc<dyn Generator>,
        formatter: ResponseFormatter,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            context,
            max_stored_turns: None,
            generator,
            transcriber: None,
            formatter,
            store,
            locks: SessionLocks::new(true),
        }
    }

    pub fn with_transcriber(mut self, transcriber: Option<Arc<dyn Transcriber>>) -> Self {
        self.transcriber = transcriber;
        self
    }

    pub fn with_max_stored_turns(mut self, max_stored_turns: Option<usize>) -> Self {
        self.max_stored_turns = max_stored_turns;
        self
    }

    pub fn with_session_serialization(mut self, enabled: bool) -> Self {
        self.locks = SessionLocks::new(enabled);
        self
    }

    pub fn formatter(&self) -> &ResponseFormatter {
        &self.formatter
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn generation_model(&self) -> &str {
        self.generator.model()
    }

    pub fn transcription_model(&self) -> Option<&str> {
        self.transcriber.as_deref().map(|t| t.model())
    }

    pub fn transcription_enabled(&self) -> bool {
        self.transcriber.is_some()
    }

    /// Answer `prompt` in the context of the session's recent turns.
    pub async fn predict(&self, session: &SessionId, prompt: &str) -> ChatResult<Reply> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(ChatError::InvalidTurn("prompt cannot be empty".to_string()));
        }

        let _guard = self.locks.acquire(session).await;

        let mut history = self.store.get(session).await?;
        let context = self.context.render(&history, prompt);

        tracing::debug!(
            session = %session,
            stored_turns = history.len(),
            window = self.context.window_size().get(),
            "Rendered generation context"
        );

        let response_raw = self.generator.generate(&context).await?;
        let response_html = self.formatter.to_html(&response_raw);

        append_turn(&mut history, prompt, &response_raw, &response_html)?;
        if let Some(max) = self.max_stored_turns {
            let dropped = history.retain_newest(max);
            if dropped > 0 {
                tracing::debug!(session = %session, dropped, "Trimmed stored history");
            }
        }
        self.store.put(session, history).await?;

        Ok(Reply {
            response_raw,
            response_html,
        })
    }

    /// Convert uploaded audio to text.
    pub async fn transcribe(&self, audio: &AudioUpload) -> ChatResult<String> {
        let transcriber = self
            .transcriber
            .as_ref()
            .ok_or_else(|| ChatError::Transcription("transcription is disabled".to_string()))?;
        transcriber.transcribe(audio).await
    }

    /// Transcribe, answer, and (optionally) speak the answer.
    ///
    /// A failed synthesis does not undo the stored turn; it is reported to the
    /// caller as a `Synthesis` error after the conversation already advanced.
    pub async fn voice_chat(&self, session: &SessionId, audio: &AudioUpload) -> ChatResult<VoiceReply> {
        let transcript = self.transcribe(audio).await?;
        if transcript.trim().is_empty() {
            return Err(ChatError::Transcription("no speech detected in audio".to_string()));
        }

        let reply = self.predict(session, &transcript).await?;

        let audio = if self.formatter.speech_enabled() {
            Some(self.formatter.to_speech(&reply.response_raw).await?)
        } else {
            None
        };

        Ok(VoiceReply {
            transcript,
            reply,
            audio,
        })
    }

    pub async fn history(&self, session: &SessionId) -> ChatResult<HistoryLog> {
        Ok(self.store.get(session).await?)
    }

    pub async fn clear_history(&self, session: &SessionId) -> ChatResult<()> {
        let _guard = self.locks.acquire(session).await;
        Ok(self.store.remove(session).await?)
    }
}
