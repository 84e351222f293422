//! # Hosted Service Adapters
//!
//! Boundaries to the external services that do the actual speech and language
//! work. Nothing here keeps state between calls; each adapter owns an HTTP
//! client, credentials and model settings.
//!
//! ## Available Adapters:
//! - **Transcriber**: audio upload → text (OpenAI-compatible `/audio/transcriptions`)
//! - **Generator**: rendered context → reply text (Gemini, OpenAI-compatible chat)
//! - **SpeechSynthesizer**: text → audio bytes (OpenAI-compatible `/audio/speech`)
//! - **ResponseFormatter**: Markdown → HTML, plus optional speech
//!
//! Failures are reported as the matching `ChatError` variant and are never
//! retried here.

pub mod formatter;
pub mod gemini;
pub mod http;
pub mod openai;

use crate::conversation::ChatResult;
use async_trait::async_trait;

pub use formatter::ResponseFormatter;
pub use gemini::GeminiGenerator;
pub use openai::{OpenAiGenerator, OpenAiSpeechSynthesizer, OpenAiTranscriber};

/// Audio received from a client, ready to forward to a transcription backend.
#[derive(Debug, Clone)]
pub struct AudioUpload {
    pub bytes: Vec<u8>,
    pub filename: Option<String>,
    pub content_type: Option<String>,
}

impl AudioUpload {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            filename: None,
            content_type: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &AudioUpload) -> ChatResult<String>;

    fn model(&self) -> &str;
}

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, context: &str) -> ChatResult<String>;

    fn model(&self) -> &str;
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `text`; the returned bytes are MP3 audio.
    async fn synthesize(&self, text: &str) -> ChatResult<Vec<u8>>;

    fn model(&self) -> &str;
}
