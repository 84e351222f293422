//! Google Gemini text generation (`models/{model}:generateContent`).

use crate::adapters::http::{failure_message, trim_trailing_slash};
use crate::adapters::Generator;
use crate::conversation::{ChatError, ChatResult};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiGenerator {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    system_prompt: Option<String>,
}

impl GeminiGenerator {
    pub fn new(client: reqwest::Client, api_key: String, model: impl Into<String>) -> Self {
        Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.into(),
            system_prompt: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Standing instruction sent as Gemini's `systemInstruction`.
    pub fn with_system_prompt(mut self, system_prompt: Option<String>) -> Self {
        self.system_prompt = system_prompt.filter(|p| !p.trim().is_empty());
        self
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[async_trait]
impl Generator for GeminiGenerator {
    async fn generate(&self, context: &str) -> ChatResult<String> {
        let url = format!(
            "{}/models/{}:generateContent",
            trim_trailing_slash(&self.base_url),
            self.model
        );
        let mut body = json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": context }]
            }]
        });
        if let Some(system_prompt) = &self.system_prompt {
            body["systemInstruction"] = json!({ "parts": [{ "text": system_prompt }] });
        }

        tracing::debug!(model = %self.model, context_chars = context.len(), "Gemini generateContent");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::Generation(format!("Error connecting to Gemini: {}", e)))?;

        if !response.status().is_success() {
            return Err(ChatError::Generation(failure_message(response).await));
        }

        let data: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ChatError::Generation(format!("Unexpected Gemini response: {}", e)))?;

        if let Some(reason) = data.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(ChatError::Generation(format!("Prompt blocked by Gemini: {}", reason)));
        }

        let candidate = data
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ChatError::Generation("No candidates in Gemini response".to_string()))?;

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ChatError::Generation(format!(
                "Gemini returned no text (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }

        Ok(text)
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

    fn generator(server: &MockServer) -> GeminiGenerator {
        let client = crate::adapters::http::build_client(Duration::from_secs(5)).unwrap();
        GeminiGenerator::new(client, "test-key".to_string(), "gemini-1.5-flash").with_base_url(server.uri())
    }

    #[tokio::test]
    async fn test_generate_joins_candidate_parts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-1.5-flash:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_string_contains("Usuario: Hola"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": { "role": "model", "parts": [{ "text": "¡Hola! " }, { "text": "¿En qué te ayudo?" }] },
                    "finishReason": "STOP"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = generator(&server).generate("Usuario: Hola\n").await.unwrap();
        assert_eq!(reply, "¡Hola! ¿En qué te ayudo?");
    }

    #[tokio::test]
    async fn test_generate_sends_system_instruction() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "systemInstruction": { "parts": [{ "text": "Responde con información detallada y clara." }] },
                "contents": [{ "role": "user", "parts": [{ "text": "Usuario: Hola\n" }] }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [{ "text": "Hola." }] } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = generator(&server)
            .with_system_prompt(Some("Responde con información detallada y clara.".to_string()))
            .generate("Usuario: Hola\n")
            .await
            .unwrap();
        assert_eq!(reply, "Hola.");
    }

    #[tokio::test]
    async fn test_generate_maps_http_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "error": { "code": 403, "message": "API key not valid", "status": "PERMISSION_DENIED" }
            })))
            .mount(&server)
            .await;

        let err = generator(&server).generate("Usuario: Hola\n").await.unwrap_err();
        assert_eq!(err, ChatError::Generation("HTTP 403: API key not valid".to_string()));
    }

    #[tokio::test]
    async fn test_generate_reports_blocked_prompt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "promptFeedback": { "blockReason": "SAFETY" }
            })))
            .mount(&server)
            .await;

        let err = generator(&server).generate("Usuario: ...\n").await.unwrap_err();
        assert!(matches!(err, ChatError::Generation(msg) if msg.contains("SAFETY")));
    }

    #[tokio::test]
    async fn test_generate_rejects_empty_candidate() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "finishReason": "MAX_TOKENS" }]
            })))
            .mount(&server)
            .await;

        let err = generator(&server).generate("Usuario: hi\n").await.unwrap_err();
        assert!(matches!(err, ChatError::Generation(msg) if msg.contains("MAX_TOKENS")));
    }
}
