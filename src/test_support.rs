//! In-process stand-ins for the hosted adapters and app state, shared by unit tests.

use crate::adapters::{AudioUpload, Generator, ResponseFormatter, SpeechSynthesizer, Transcriber};
use crate::config::AppConfig;
use crate::conversation::{ChatError, ChatResult, ChatService, ContextBuilder};
use crate::session::MemorySessionStore;
use crate::state::AppState;
use actix_web::cookie::Cookie;
use actix_web::test::TestRequest;
use actix_web::web;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Returns a fixed reply and records every context it was asked to continue.
pub struct EchoGenerator {
    reply: String,
    delay: Option<Duration>,
    contexts: Mutex<Vec<String>>,
}

impl EchoGenerator {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            delay: None,
            contexts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay_ms(mut self, ms: u64) -> Self {
        self.delay = Some(Duration::from_millis(ms));
        self
    }

    pub fn contexts(&self) -> Vec<String> {
        self.contexts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for EchoGenerator {
    async fn generate(&self, context: &str) -> ChatResult<String> {
        self.contexts.lock().unwrap().push(context.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.reply.clone())
    }

    fn model(&self) -> &str {
        "echo"
    }
}

pub struct FailingGenerator;

#[async_trait]
impl Generator for FailingGenerator {
    async fn generate(&self, _context: &str) -> ChatResult<String> {
        Err(ChatError::Generation("Error connecting to Gemini: connection refused".to_string()))
    }

    fn model(&self) -> &str {
        "failing"
    }
}

pub struct FixedTranscriber {
    text: String,
}

impl FixedTranscriber {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }
}

#[async_trait]
impl Transcriber for FixedTranscriber {
    async fn transcribe(&self, audio: &AudioUpload) -> ChatResult<String> {
        if audio.bytes.is_empty() {
            return Err(ChatError::Transcription("Audio payload is empty".to_string()));
        }
        Ok(self.text.clone())
    }

    fn model(&self) -> &str {
        "fixed-transcriber"
    }
}

pub struct FailingTranscriber;

#[async_trait]
impl Transcriber for FailingTranscriber {
    async fn transcribe(&self, _audio: &AudioUpload) -> ChatResult<String> {
        Err(ChatError::Transcription("HTTP 400: Invalid file format.".to_string()))
    }

    fn model(&self) -> &str {
        "failing-transcriber"
    }
}

pub struct FixedSpeech {
    audio: Vec<u8>,
}

impl FixedSpeech {
    pub fn new(audio: Vec<u8>) -> Self {
        Self { audio }
    }
}

#[async_trait]
impl SpeechSynthesizer for FixedSpeech {
    async fn synthesize(&self, _text: &str) -> ChatResult<Vec<u8>> {
        Ok(self.audio.clone())
    }

    fn model(&self) -> &str {
        "fixed-speech"
    }
}

/// Application state backed by an in-memory store and the given generator.
pub fn test_state(generator: Arc<dyn Generator>) -> web::Data<AppState> {
    test_state_with(generator, None, None)
}

pub fn test_state_with(
    generator: Arc<dyn Generator>,
    transcriber: Option<Arc<dyn Transcriber>>,
    speech: Option<Arc<dyn SpeechSynthesizer>>,
) -> web::Data<AppState> {
    let config = AppConfig::default();
    let store = Arc::new(MemorySessionStore::new(chrono::Duration::minutes(30)));
    let chat = ChatService::new(
        ContextBuilder::default(),
        generator,
        ResponseFormatter::new(speech),
        store,
    )
    .with_transcriber(transcriber);
    web::Data::new(AppState::new(config, chat))
}

pub fn with_cookie(req: TestRequest, cookie: &Cookie<'_>) -> TestRequest {
    req.cookie(Cookie::new(cookie.name().to_string(), cookie.value().to_string()))
}

/// Hand-built multipart body with a single file field.
pub fn multipart_body(field: &str, filename: &str, content_type: &str, data: &[u8]) -> (String, Vec<u8>) {
    let boundary = "XCONVERSABOUNDARY";
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
            field, filename, content_type
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    (format!("multipart/form-data; boundary={}", boundary), body)
}
