//! # Conversation Errors
//!
//! Failure taxonomy for the chat pipeline. `InvalidTurn` guards the history
//! log, three variants are raised at the adapter boundary when a hosted
//! service fails, and `Storage` covers session backend I/O.

use std::fmt;

/// Errors produced while building context or calling the hosted services.
///
/// ## Categories:
/// - **InvalidTurn**: precondition violation (empty prompt, missing response)
/// - **Transcription**: speech-to-text backend rejected or could not process audio
/// - **Generation**: text-generation backend or network failure
/// - **Synthesis**: text-to-speech backend failure
/// - **Storage**: the session store could not be read or written
#[derive(Debug, Clone, PartialEq)]
pub enum ChatError {
    InvalidTurn(String),
    Transcription(String),
    Generation(String),
    Synthesis(String),
    Storage(String),
}

impl ChatError {
    /// Machine-readable kind used in error payloads and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ChatError::InvalidTurn(_) => "invalid_turn",
            ChatError::Transcription(_) => "transcription_error",
            ChatError::Generation(_) => "generation_error",
            ChatError::Synthesis(_) => "synthesis_error",
            ChatError::Storage(_) => "storage_error",
        }
    }

    /// Whether the failure happened at a hosted service.
    pub fn is_adapter_failure(&self) -> bool {
        matches!(
            self,
            ChatError::Transcription(_) | ChatError::Generation(_) | ChatError::Synthesis(_)
        )
    }
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatError::InvalidTurn(msg) => write!(f, "Invalid turn: {}", msg),
            ChatError::Transcription(msg) => write!(f, "Transcription failed: {}", msg),
            ChatError::Generation(msg) => write!(f, "Generation failed: {}", msg),
            ChatError::Synthesis(msg) => write!(f, "Speech synthesis failed: {}", msg),
            ChatError::Storage(msg) => write!(f, "Session storage failed: {}", msg),
        }
    }
}

impl std::error::Error for ChatError {}

impl From<anyhow::Error> for ChatError {
    fn from(err: anyhow::Error) -> Self {
        ChatError::Storage(format!("{:#}", err))
    }
}

pub type ChatResult<T> = Result<T, ChatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_adapter_classification() {
        let invalid = ChatError::InvalidTurn("empty prompt".to_string());
        assert_eq!(invalid.kind(), "invalid_turn");
        assert!(!invalid.is_adapter_failure());

        let generation = ChatError::Generation("timeout".to_string());
        assert_eq!(generation.kind(), "generation_error");
        assert!(generation.is_adapter_failure());

        let storage = ChatError::from(anyhow::anyhow!("disk full"));
        assert_eq!(storage, ChatError::Storage("disk full".to_string()));
        assert!(!storage.is_adapter_failure());
    }

    #[test]
    fn test_display_includes_message() {
        let err = ChatError::Synthesis("voice not found".to_string());
        assert_eq!(err.to_string(), "Speech synthesis failed: voice not found");
    }
}
