//! Shared HTTP plumbing for the hosted adapters.

use anyhow::{Context, Result};
use std::time::Duration;

/// Build the client every adapter shares; the timeout bounds each backend call.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(10)
        .user_agent(concat!("conversa-backend/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")
}

pub fn trim_trailing_slash(url: &str) -> &str {
    url.trim_end_matches('/')
}

/// Turn a non-success response into a short message.
///
/// Both Gemini and OpenAI wrap failures as `{"error": {"message": ...}}`;
/// anything else falls back to the raw body.
pub fn describe_failure(status: u16, body: &str) -> String {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message").or(Some(e)))
                .and_then(|m| m.as_str().map(str::to_string))
        })
        .unwrap_or_else(|| body.trim().chars().take(300).collect());

    if message.is_empty() {
        format!("HTTP {}", status)
    } else {
        format!("HTTP {}: {}", status, message)
    }
}

/// Read a failed response into a message, tolerating an unreadable body.
pub async fn failure_message(response: reqwest::Response) -> String {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    describe_failure(status, &body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_failure_extracts_nested_message() {
        let body = r#"{"error": {"code": 400, "message": "API key not valid"}}"#;
        assert_eq!(describe_failure(400, body), "HTTP 400: API key not valid");
    }

    #[test]
    fn test_describe_failure_accepts_string_error() {
        assert_eq!(describe_failure(503, r#"{"error": "overloaded"}"#), "HTTP 503: overloaded");
    }

    #[test]
    fn test_describe_failure_falls_back_to_body() {
        assert_eq!(describe_failure(502, "Bad Gateway\n"), "HTTP 502: Bad Gateway");
        assert_eq!(describe_failure(500, ""), "HTTP 500");
    }

    #[test]
    fn test_trim_trailing_slash() {
        assert_eq!(trim_trailing_slash("https://api.example.com/v1/"), "https://api.example.com/v1");
    }
}
