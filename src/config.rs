//! # Configuration Management
//!
//! This module handles loading and managing application configuration from multiple sources:
//! - TOML configuration files (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values (built into the code)
//!
//! ## Configuration Priority (highest to lowest):
//! 1. `HOST` / `PORT` (deployment platforms set these)
//! 2. Environment variables (`APP_SERVER__PORT`, `APP_CONVERSATION__WINDOW_SIZE`, ...)
//! 3. Configuration file (config.toml)
//! 4. Default values (defined in the Default impl)
//!
//! ## Secrets:
//! API keys are never part of `AppConfig` (it is logged and reported by the
//! health endpoint). They are read separately into `Credentials`, and a missing
//! key for an enabled provider stops the process at startup.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::env;

/// Main application configuration that contains all settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub providers: ProvidersConfig,
    pub models: ModelsConfig,
    pub conversation: ConversationConfig,
    pub session: SessionConfig,
}

/// Server-specific configuration settings.
///
/// ## Fields:
/// - `host`: IP address or hostname to bind the server to
/// - `port`: TCP port number to listen on
/// - `max_upload_bytes`: largest accepted audio upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
}

/// Cross-origin settings for the browser frontend.
///
/// An empty `allowed_origins` list allows any origin, which is convenient in
/// development. Production deployments list the site embedding the chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub max_age_secs: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenerationProvider {
    #[serde(rename = "gemini")]
    Gemini,
    #[serde(rename = "openai")]
    OpenAi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioProvider {
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "disabled")]
    Disabled,
}

/// Which hosted service backs each adapter, and where to reach it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    pub generation: GenerationProvider,
    pub transcription: AudioProvider,
    pub speech: AudioProvider,
    pub gemini_base_url: String,
    pub openai_base_url: String,
    pub request_timeout_secs: u64,
}

/// Hosted model names.
///
/// ## Fields:
/// - `generation_model`: e.g. "gemini-1.5-flash", or a chat model name for OpenAI-compatible servers
/// - `transcription_model`: e.g. "whisper-1"
/// - `speech_model` / `speech_voice`: text-to-speech model and voice
/// - `language`: ISO 639-1 hint passed to transcription ("es", "en", ...)
/// - `system_prompt`: optional standing instruction sent to the generator
///   alongside (never inside) the rendered conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    pub generation_model: String,
    pub transcription_model: String,
    pub speech_model: String,
    pub speech_voice: String,
    pub language: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

/// Context window policy.
///
/// `max_stored_turns` is unset by default: the stored history grows without
/// bound and only the rendered view is windowed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    pub window_size: usize,
    pub user_tag: String,
    pub model_tag: String,
    pub max_stored_turns: Option<usize>,
    pub serialize_sessions: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionBackend {
    #[serde(rename = "memory")]
    Memory,
    #[serde(rename = "filesystem")]
    Filesystem,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub backend: SessionBackend,
    pub directory: String,
    pub cookie_name: String,
    pub cookie_secure: bool,
    pub idle_timeout_minutes: u64,
    pub sweep_interval_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 5000,
                max_upload_bytes: 25 * 1024 * 1024, // Whisper API upload limit
            },
            cors: CorsConfig {
                allowed_origins: Vec::new(),
                max_age_secs: 3600,
            },
            providers: ProvidersConfig {
                generation: GenerationProvider::Gemini,
                transcription: AudioProvider::OpenAi,
                speech: AudioProvider::Disabled,
                gemini_base_url: crate::adapters::gemini::DEFAULT_BASE_URL.to_string(),
                openai_base_url: crate::adapters::openai::DEFAULT_BASE_URL.to_string(),
                request_timeout_secs: 60,
            },
            models: ModelsConfig {
                generation_model: "gemini-1.5-flash".to_string(),
                transcription_model: "whisper-1".to_string(),
                speech_model: "tts-1".to_string(),
                speech_voice: "alloy".to_string(),
                language: "es".to_string(),
                system_prompt: None,
            },
            conversation: ConversationConfig {
                window_size: crate::conversation::context::DEFAULT_WINDOW_SIZE,
                user_tag: crate::conversation::context::DEFAULT_USER_TAG.to_string(),
                model_tag: crate::conversation::context::DEFAULT_MODEL_TAG.to_string(),
                max_stored_turns: None,
                serialize_sessions: true,
            },
            session: SessionConfig {
                backend: SessionBackend::Memory,
                directory: "./sessions".to_string(),
                cookie_name: "conversa_session".to_string(),
                cookie_secure: false,
                idle_timeout_minutes: 31 * 24 * 60, // Flask's permanent session lifetime
                sweep_interval_secs: 300,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources in priority order.
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER__PORT=3000`: Override server port
    /// - `APP_PROVIDERS__GENERATION=openai`: Switch the generation backend
    /// - `APP_SESSION__BACKEND=filesystem`: Persist sessions on disk
    /// - `HOST=0.0.0.0` / `PORT=3000`: Special cases for deployment platforms
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("cors.allowed_origins")
                    .try_parsing(true),
            );

        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow!("Server port cannot be 0"));
        }

        if self.server.max_upload_bytes == 0 {
            return Err(anyhow!("Maximum upload size must be greater than 0"));
        }

        if self.conversation.window_size == 0 {
            return Err(anyhow!("Conversation window size must be greater than 0"));
        }

        if self.conversation.user_tag.trim().is_empty() || self.conversation.model_tag.trim().is_empty() {
            return Err(anyhow!("Conversation speaker tags cannot be empty"));
        }

        if self.conversation.max_stored_turns == Some(0) {
            return Err(anyhow!("max_stored_turns must be greater than 0 when set"));
        }

        if let Some(max) = self.conversation.max_stored_turns {
            if max < self.conversation.window_size {
                tracing::warn!(
                    "max_stored_turns ({}) is smaller than window_size ({}); the window will never fill",
                    max,
                    self.conversation.window_size
                );
            }
        }

        if self.models.generation_model.trim().is_empty() {
            return Err(anyhow!("Generation model cannot be empty"));
        }

        if self.providers.request_timeout_secs == 0 {
            return Err(anyhow!("Provider request timeout must be greater than 0"));
        }

        if self.session.cookie_name.trim().is_empty() {
            return Err(anyhow!("Session cookie name cannot be empty"));
        }

        if self.session.idle_timeout_minutes == 0 {
            return Err(anyhow!("Session idle timeout must be greater than 0"));
        }

        if self.session.sweep_interval_secs == 0 {
            return Err(anyhow!("Session sweep interval must be greater than 0"));
        }

        if self.session.backend == SessionBackend::Filesystem && self.session.directory.trim().is_empty() {
            return Err(anyhow!("Session directory is required for the filesystem backend"));
        }

        Ok(())
    }

    /// Whether any enabled adapter talks to an OpenAI-compatible API.
    pub fn uses_openai(&self) -> bool {
        self.providers.generation == GenerationProvider::OpenAi
            || self.providers.transcription == AudioProvider::OpenAi
            || self.providers.speech == AudioProvider::OpenAi
    }
}

/// API keys for the hosted services, read from the environment.
#[derive(Clone, Default)]
pub struct Credentials {
    pub gemini_api_key: Option<String>,
    pub openai_api_key: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("gemini_api_key", &self.gemini_api_key.as_ref().map(|_| "<redacted>"))
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Credentials {
    /// Read the keys the configured providers need.
    ///
    /// ## Variables:
    /// - `GEMINI_ACCESS_TOKEN` (or `GEMINI_API_KEY`): required when generation uses Gemini
    /// - `OPENAI_API_KEY`: required when any adapter uses an OpenAI-compatible API
    pub fn from_env(config: &AppConfig) -> Result<Self> {
        Self::from_lookup(config, |name| env::var(name).ok())
    }

    pub fn from_lookup(config: &AppConfig, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let credentials = Self {
            gemini_api_key: read("GEMINI_ACCESS_TOKEN").or_else(|| read("GEMINI_API_KEY")),
            openai_api_key: read("OPENAI_API_KEY"),
        };

        if config.providers.generation == GenerationProvider::Gemini && credentials.gemini_api_key.is_none() {
            return Err(anyhow!(
                "GEMINI_ACCESS_TOKEN is not set; it is required when providers.generation = \"gemini\""
            ));
        }

        if config.uses_openai() && credentials.openai_api_key.is_none() {
            return Err(anyhow!(
                "OPENAI_API_KEY is not set; it is required by the configured OpenAI-compatible providers"
            ));
        }

        Ok(credentials)
    }
}
