//! # Application State Management
//!
//! Everything the request handlers share: configuration, the chat pipeline
//! (adapters + session store), the session cookie settings, and request
//! metrics.
//!
//! ## Construction:
//! `AppState::build` wires the adapters selected by configuration once at
//! startup and injects them into the `ChatService`. Handlers never reach for
//! globals; they receive the state through `web::Data<AppState>`.
//!
//! ## Arc<RwLock<T>> Pattern:
//! - **Arc**: every worker thread holds a handle to the same state
//! - **RwLock**: metrics are updated by each request and read by `/metrics`

use crate::adapters::http::build_client;
use crate::adapters::{
    GeminiGenerator, Generator, OpenAiGenerator, OpenAiSpeechSynthesizer, OpenAiTranscriber,
    ResponseFormatter, SpeechSynthesizer, Transcriber,
};
use crate::config::{AppConfig, AudioProvider, Credentials, GenerationProvider, SessionBackend};
use crate::conversation::{ChatService, ContextBuilder};
use crate::session::{FileSessionStore, MemorySessionStore, SessionCookie, SessionStore};
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub chat: Arc<ChatService>,
    pub session_cookie: SessionCookie,
    pub metrics: Arc<RwLock<AppMetrics>>,
    pub start_time: Instant,
}

/// Counters collected across all HTTP requests.
#[derive(Debug, Default, Clone)]
pub struct AppMetrics {
    /// Total number of HTTP requests processed since server start
    pub request_count: u64,

    /// Total number of 4xx/5xx responses since server start
    pub error_count: u64,

    /// Key: endpoint name (e.g., "POST /api/predict")
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

impl AppState {
    pub fn new(config: AppConfig, chat: ChatService) -> Self {
        let session_cookie = SessionCookie::new(
            config.session.cookie_name.clone(),
            config.session.cookie_secure,
            config.session.idle_timeout_minutes,
        );

        Self {
            config: Arc::new(config),
            chat: Arc::new(chat),
            session_cookie,
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
        }
    }

    /// Build the full state from configuration and credentials.
    ///
    /// ## What this does:
    /// 1. Creates the shared HTTP client with the configured timeout
    /// 2. Instantiates the generation, transcription and speech adapters
    /// 3. Opens the configured session backend
    /// 4. Wires everything into a `ChatService`
    pub async fn build(config: AppConfig, credentials: &Credentials) -> Result<Self> {
        let client = build_client(Duration::from_secs(config.providers.request_timeout_secs))?;
        let openai_key = || {
            credentials
                .openai_api_key
                .clone()
                .ok_or_else(|| anyhow!("OPENAI_API_KEY is required"))
        };

        let generator: Arc<dyn Generator> = match config.providers.generation {
            GenerationProvider::Gemini => {
                let key = credentials
                    .gemini_api_key
                    .clone()
                    .ok_or_else(|| anyhow!("GEMINI_ACCESS_TOKEN is required"))?;
                Arc::new(
                    GeminiGenerator::new(client.clone(), key, config.models.generation_model.clone())
                        .with_base_url(config.providers.gemini_base_url.clone())
                        .with_system_prompt(config.models.system_prompt.clone()),
                )
            }
            GenerationProvider::OpenAi => Arc::new(
                OpenAiGenerator::new(client.clone(), openai_key()?, config.models.generation_model.clone())
                    .with_base_url(config.providers.openai_base_url.clone())
                    .with_system_prompt(config.models.system_prompt.clone()),
            ),
        };

        let transcriber: Option<Arc<dyn Transcriber>> = match config.providers.transcription {
            AudioProvider::OpenAi => Some(Arc::new(
                OpenAiTranscriber::new(client.clone(), openai_key()?, config.models.transcription_model.clone())
                    .with_base_url(config.providers.openai_base_url.clone())
                    .with_language(Some(config.models.language.clone())),
            )),
            AudioProvider::Disabled => None,
        };

        let speech: Option<Arc<dyn SpeechSynthesizer>> = match config.providers.speech {
            AudioProvider::OpenAi => Some(Arc::new(
                OpenAiSpeechSynthesizer::new(
                    client.clone(),
                    openai_key()?,
                    config.models.speech_model.clone(),
                    config.models.speech_voice.clone(),
                )
                .with_base_url(config.providers.openai_base_url.clone()),
            )),
            AudioProvider::Disabled => None,
        };

        let idle_timeout = chrono::Duration::minutes(config.session.idle_timeout_minutes as i64);
        let store: Arc<dyn SessionStore> = match config.session.backend {
            SessionBackend::Memory => Arc::new(MemorySessionStore::new(idle_timeout)),
            SessionBackend::Filesystem => {
                Arc::new(FileSessionStore::open(&config.session.directory, idle_timeout).await?)
            }
        };

        let window = NonZeroUsize::new(config.conversation.window_size)
            .ok_or_else(|| anyhow!("Conversation window size must be greater than 0"))?;
        let context = ContextBuilder::new(window)
            .with_tags(config.conversation.user_tag.clone(), config.conversation.model_tag.clone());

        let chat = ChatService::new(context, generator, ResponseFormatter::new(speech), store)
            .with_transcriber(transcriber)
            .with_max_stored_turns(config.conversation.max_stored_turns)
            .with_session_serialization(config.conversation.serialize_sessions);

        tracing::info!(
            generation = ?config.providers.generation,
            model = %config.models.generation_model,
            transcription = ?config.providers.transcription,
            speech = ?config.providers.speech,
            sessions = ?config.session.backend,
            window = config.conversation.window_size,
            "Chat pipeline ready"
        );

        Ok(Self::new(config, chat))
    }

    pub fn increment_request_count(&self) {
        let mut metrics = self.metrics.write().unwrap_or_else(|e| e.into_inner());
        metrics.request_count += 1;
    }

    pub fn increment_error_count(&self) {
        let mut metrics = self.metrics.write().unwrap_or_else(|e| e.into_inner());
        metrics.error_count += 1;
    }

    /// Record the outcome of one request against its endpoint.
    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        let mut metrics = self.metrics.write().unwrap_or_else(|e| e.into_inner());

        let endpoint_metric = metrics.endpoint_metrics.entry(endpoint.to_string()).or_default();
        endpoint_metric.request_count += 1;
        endpoint_metric.total_duration_ms += duration_ms;

        if is_error {
            endpoint_metric.error_count += 1;
        }
    }

    /// Copy of the metrics, taken so the lock is not held while serializing.
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        self.metrics.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl EndpointMetric {
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> Credentials {
        Credentials {
            gemini_api_key: Some("g-key".to_string()),
            openai_api_key: Some("sk-key".to_string()),
        }
    }

    #[tokio::test]
    async fn test_build_wires_configured_adapters() {
        let mut config = AppConfig::default();
        config.providers.speech = AudioProvider::OpenAi;

        let state = AppState::build(config, &credentials()).await.unwrap();
        assert_eq!(state.chat.generation_model(), "gemini-1.5-flash");
        assert_eq!(state.chat.transcription_model(), Some("whisper-1"));
        assert!(state.chat.formatter().speech_enabled());
        assert_eq!(state.chat.store().backend_name(), "memory");
    }

    #[tokio::test]
    async fn test_build_with_filesystem_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.providers.transcription = AudioProvider::Disabled;
        config.session.backend = SessionBackend::Filesystem;
        config.session.directory = dir.path().join("sessions").display().to_string();

        let state = AppState::build(config, &credentials()).await.unwrap();
        assert_eq!(state.chat.store().backend_name(), "filesystem");
        assert!(!state.chat.transcription_enabled());
        assert!(dir.path().join("sessions").is_dir());
    }

    #[tokio::test]
    async fn test_build_fails_without_required_key() {
        let config = AppConfig::default();
        let creds = Credentials {
            gemini_api_key: None,
            openai_api_key: Some("sk".to_string()),
        };
        assert!(AppState::build(config, &creds).await.is_err());
    }

    #[test]
    fn test_endpoint_metrics() {
        let metric = EndpointMetric {
            request_count: 4,
            total_duration_ms: 200,
            error_count: 1,
        };
        assert_eq!(metric.average_duration_ms(), 50.0);
        assert_eq!(metric.error_rate(), 0.25);
        assert_eq!(EndpointMetric::default().error_rate(), 0.0);
    }
}
