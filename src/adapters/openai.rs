//! # OpenAI-Compatible Adapters
//!
//! Chat completions, Whisper transcription and TTS against any server that
//! speaks the OpenAI REST dialect (OpenAI itself, or a local gateway exposing
//! a Llama model under the same routes).
//!
//! ## Endpoints:
//! - `POST {base}/chat/completions`
//! - `POST {base}/audio/transcriptions` (multipart)
//! - `POST {base}/audio/speech`

use crate::adapters::http::{failure_message, trim_trailing_slash};
use crate::adapters::{AudioUpload, Generator, SpeechSynthesizer, Transcriber};
use crate::conversation::{ChatError, ChatResult};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Audio container extensions accepted by Whisper.
const SUPPORTED_AUDIO_EXTENSIONS: &[&str] = &[
    "flac", "m4a", "mp3", "mp4", "mpeg", "mpga", "oga", "ogg", "wav", "webm",
];

#[derive(Debug, Clone)]
struct Endpoint {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl Endpoint {
    fn url(&self, route: &str) -> String {
        format!("{}/{}", trim_trailing_slash(&self.base_url), route)
    }
}

// ---------------------------------------------------------------------------
// Chat completions
// ---------------------------------------------------------------------------

pub struct OpenAiGenerator {
    endpoint: Endpoint,
    model: String,
    system_prompt: Option<String>,
}

impl OpenAiGenerator {
    pub fn new(client: reqwest::Client, api_key: String, model: impl Into<String>) -> Self {
        Self {
            endpoint: Endpoint {
                client,
                api_key,
                base_url: DEFAULT_BASE_URL.to_string(),
            },
            model: model.into(),
            system_prompt: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.endpoint.base_url = base_url.into();
        self
    }

    /// Standing instruction sent as a leading `system` message.
    pub fn with_system_prompt(mut self, system_prompt: Option<String>) -> Self {
        self.system_prompt = system_prompt.filter(|p| !p.trim().is_empty());
        self
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[async_trait]
impl Generator for OpenAiGenerator {
    async fn generate(&self, context: &str) -> ChatResult<String> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system_prompt) = &self.system_prompt {
            messages.push(json!({ "role": "system", "content": system_prompt }));
        }
        messages.push(json!({ "role": "user", "content": context }));

        let body = json!({
            "model": self.model,
            "messages": messages,
        });

        tracing::debug!(model = %self.model, context_chars = context.len(), "Chat completion request");

        let response = self
            .endpoint
            .client
            .post(self.endpoint.url("chat/completions"))
            .bearer_auth(&self.endpoint.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::Generation(format!("Error connecting to generation service: {}", e)))?;

        if !response.status().is_success() {
            return Err(ChatError::Generation(failure_message(response).await));
        }

        let data: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ChatError::Generation(format!("Unexpected chat completion response: {}", e)))?;

        data.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| ChatError::Generation("Chat completion returned no text".to_string()))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// ---------------------------------------------------------------------------
// Transcription
// ---------------------------------------------------------------------------

pub struct OpenAiTranscriber {
    endpoint: Endpoint,
    model: String,
    language: Option<String>,
}

impl OpenAiTranscriber {
    pub fn new(client: reqwest::Client, api_key: String, model: impl Into<String>) -> Self {
        Self {
            endpoint: Endpoint {
                client,
                api_key,
                base_url: DEFAULT_BASE_URL.to_string(),
            },
            model: model.into(),
            language: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.endpoint.base_url = base_url.into();
        self
    }

    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language.filter(|l| !l.trim().is_empty());
        self
    }
}

/// Pick the file extension Whisper will use to detect the container.
///
/// The client's filename wins; otherwise the MIME type is mapped. Audio with
/// neither hint cannot be forwarded.
fn audio_extension(upload: &AudioUpload) -> ChatResult<String> {
    let from_name = upload
        .filename
        .as_deref()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());

    let from_mime = upload.content_type.as_deref().and_then(|mime| {
        let essence = mime.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
        let ext = match essence.as_str() {
            "audio/mpeg" | "audio/mp3" => "mp3",
            "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
            "audio/webm" | "video/webm" => "webm",
            "audio/ogg" => "ogg",
            "audio/flac" | "audio/x-flac" => "flac",
            "audio/mp4" | "audio/x-m4a" | "audio/m4a" => "m4a",
            "video/mp4" => "mp4",
            _ => return None,
        };
        Some(ext.to_string())
    });

    let extension = from_name
        .filter(|ext| SUPPORTED_AUDIO_EXTENSIONS.contains(&ext.as_str()))
        .or(from_mime)
        .ok_or_else(|| {
            ChatError::Transcription(format!(
                "Unsupported audio format (filename: {}, content type: {})",
                upload.filename.as_deref().unwrap_or("none"),
                upload.content_type.as_deref().unwrap_or("none"),
            ))
        })?;

    Ok(extension)
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[async_trait]
impl Transcriber for OpenAiTranscriber {
    async fn transcribe(&self, audio: &AudioUpload) -> ChatResult<String> {
        if audio.bytes.is_empty() {
            return Err(ChatError::Transcription("Audio payload is empty".to_string()));
        }
        let extension = audio_extension(audio)?;

        let file = Part::bytes(audio.bytes.clone())
            .file_name(format!("audio.{}", extension))
            .mime_str(audio.content_type.as_deref().unwrap_or("application/octet-stream"))
            .or_else(|_| {
                Part::bytes(audio.bytes.clone())
                    .file_name(format!("audio.{}", extension))
                    .mime_str("application/octet-stream")
            })
            .map_err(|e| ChatError::Transcription(format!("Failed to build upload: {}", e)))?;

        let mut form = Form::new()
            .part("file", file)
            .text("model", self.model.clone())
            .text("response_format", "json");
        if let Some(language) = &self.language {
            form = form.text("language", language.clone());
        }

        tracing::debug!(model = %self.model, bytes = audio.bytes.len(), extension = %extension, "Transcription request");

        let response = self
            .endpoint
            .client
            .post(self.endpoint.url("audio/transcriptions"))
            .bearer_auth(&self.endpoint.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ChatError::Transcription(format!("Error connecting to transcription service: {}", e)))?;

        if !response.status().is_success() {
            return Err(ChatError::Transcription(failure_message(response).await));
        }

        let data: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| ChatError::Transcription(format!("Unexpected transcription response: {}", e)))?;

        Ok(data.text.trim().to_string())
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// ---------------------------------------------------------------------------
// Speech synthesis
// ---------------------------------------------------------------------------

pub struct OpenAiSpeechSynthesizer {
    endpoint: Endpoint,
    model: String,
    voice: String,
}

impl OpenAiSpeechSynthesizer {
    pub fn new(
        client: reqwest::Client,
        api_key: String,
        model: impl Into<String>,
        voice: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: Endpoint {
                client,
                api_key,
                base_url: DEFAULT_BASE_URL.to_string(),
            },
            model: model.into(),
            voice: voice.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.endpoint.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiSpeechSynthesizer {
    async fn synthesize(&self, text: &str) -> ChatResult<Vec<u8>> {
        if text.trim().is_empty() {
            return Err(ChatError::Synthesis("Speech text cannot be empty".to_string()));
        }

        let body = json!({
            "model": self.model,
            "input": text,
            "voice": self.voice,
            "response_format": "mp3",
        });

        tracing::debug!(model = %self.model, voice = %self.voice, chars = text.len(), "Speech request");

        let response = self
            .endpoint
            .client
            .post(self.endpoint.url("audio/speech"))
            .bearer_auth(&self.endpoint.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::Synthesis(format!("Error connecting to speech service: {}", e)))?;

        if !response.status().is_success() {
            return Err(ChatError::Synthesis(failure_message(response).await));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ChatError::Synthesis(format!("Failed to read speech audio: {}", e)))?;
        if bytes.is_empty() {
            return Err(ChatError::Synthesis("Speech service returned no audio".to_string()));
        }

        Ok(bytes.to_vec())
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> reqwest::Client {
        crate::adapters::http::build_client(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_audio_extension_prefers_filename() {
        let upload = AudioUpload::new(vec![1])
            .with_filename("note.WAV")
            .with_content_type("audio/mpeg");
        assert_eq!(audio_extension(&upload).unwrap(), "wav");
    }

    #[test]
    fn test_audio_extension_falls_back_to_mime() {
        let upload = AudioUpload::new(vec![1])
            .with_filename("blob")
            .with_content_type("audio/webm;codecs=opus");
        assert_eq!(audio_extension(&upload).unwrap(), "webm");
    }

    #[test]
    fn test_audio_extension_rejects_unknown_format() {
        let upload = AudioUpload::new(vec![1])
            .with_filename("notes.txt")
            .with_content_type("text/plain");
        assert!(matches!(audio_extension(&upload), Err(ChatError::Transcription(_))));
    }

    #[tokio::test]
    async fn test_chat_completion_happy_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_string_contains("llama-2-7b-chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "index": 0, "message": { "role": "assistant", "content": "Claro." } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let generator = OpenAiGenerator::new(client(), "test-key".to_string(), "llama-2-7b-chat")
            .with_base_url(server.uri());
        assert_eq!(generator.generate("Usuario: ¿Sí?\n").await.unwrap(), "Claro.");
    }

    #[tokio::test]
    async fn test_chat_completion_leads_with_system_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({
                "messages": [
                    { "role": "system", "content": "Responde con información detallada y clara." },
                    { "role": "user", "content": "Usuario: Hola\n" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": "Hola." } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let generator = OpenAiGenerator::new(client(), "k".to_string(), "m")
            .with_base_url(server.uri())
            .with_system_prompt(Some("Responde con información detallada y clara.".to_string()));
        assert_eq!(generator.generate("Usuario: Hola\n").await.unwrap(), "Hola.");
    }

    #[tokio::test]
    async fn test_chat_completion_without_content_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let generator =
            OpenAiGenerator::new(client(), "k".to_string(), "m").with_base_url(server.uri());
        assert!(matches!(
            generator.generate("Usuario: x\n").await,
            Err(ChatError::Generation(_))
        ));
    }

    #[tokio::test]
    async fn test_transcription_sends_model_and_language() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/transcriptions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_string_contains("name=\"model\""))
            .and(body_string_contains("whisper-1"))
            .and(body_string_contains("name=\"language\""))
            .and(body_string_contains("filename=\"audio.mp3\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "text": " hola mundo " })))
            .expect(1)
            .mount(&server)
            .await;

        let transcriber = OpenAiTranscriber::new(client(), "test-key".to_string(), "whisper-1")
            .with_base_url(server.uri())
            .with_language(Some("es".to_string()));
        let upload = AudioUpload::new(b"ID3fakemp3".to_vec()).with_filename("temp.mp3");

        assert_eq!(transcriber.transcribe(&upload).await.unwrap(), "hola mundo");
    }

    #[tokio::test]
    async fn test_transcription_backend_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/transcriptions"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": { "message": "Invalid file format." }
            })))
            .mount(&server)
            .await;

        let transcriber =
            OpenAiTranscriber::new(client(), "k".to_string(), "whisper-1").with_base_url(server.uri());
        let upload = AudioUpload::new(vec![0, 1, 2]).with_filename("clip.wav");

        let err = transcriber.transcribe(&upload).await.unwrap_err();
        assert_eq!(err, ChatError::Transcription("HTTP 400: Invalid file format.".to_string()));
    }

    #[tokio::test]
    async fn test_transcription_rejects_empty_audio_without_calling_backend() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let transcriber =
            OpenAiTranscriber::new(client(), "k".to_string(), "whisper-1").with_base_url(server.uri());
        let upload = AudioUpload::new(Vec::new()).with_filename("clip.wav");
        assert!(transcriber.transcribe(&upload).await.is_err());
    }

    #[tokio::test]
    async fn test_speech_returns_audio_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/speech"))
            .and(body_string_contains("\"voice\":\"alloy\""))
            .and(body_string_contains("\"response_format\":\"mp3\""))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "audio/mpeg")
                    .set_body_bytes(vec![0xFF, 0xFB, 0x90, 0x00]),
            )
            .expect(1)
            .mount(&server)
            .await;

        let speech = OpenAiSpeechSynthesizer::new(client(), "k".to_string(), "tts-1", "alloy")
            .with_base_url(server.uri());
        assert_eq!(speech.synthesize("Hola").await.unwrap(), vec![0xFF, 0xFB, 0x90, 0x00]);
    }

    #[tokio::test]
    async fn test_speech_failure_is_synthesis_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/speech"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let speech = OpenAiSpeechSynthesizer::new(client(), "k".to_string(), "tts-1", "alloy")
            .with_base_url(server.uri());
        assert_eq!(
            speech.synthesize("Hola").await.unwrap_err(),
            ChatError::Synthesis("HTTP 500: boom".to_string())
        );
    }
}
