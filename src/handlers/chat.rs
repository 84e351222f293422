//! # Chat Handlers
//!
//! ## Endpoints:
//! - `GET /` - plain notice; the chat UI lives on a separate site
//! - `POST /api/predict` - answer a prompt within the session's conversation

use super::{form, ok_with_session};
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use actix_web::web::{self, Bytes};
use actix_web::{HttpRequest, HttpResponse};
use serde_json::json;

pub const EMPTY_PROMPT_MESSAGE: &str = "Por favor, ingresa un texto válido.";

pub async fn home() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body("Esta es la API del chatbot. El frontend está en WordPress.")
}

/// Generate a reply to `prompt` using the session's recent turns as context.
///
/// ## Endpoint: `POST /api/predict`
///
/// ## Request:
/// Form field (urlencoded or multipart) or JSON key `prompt`.
///
/// ## Response:
/// ```json
/// { "response_html": "<p>Hola, ¿en qué puedo ayudarte?</p>" }
/// ```
/// A missing or blank prompt is a 400; a generation failure is a 500.
pub async fn predict(state: web::Data<AppState>, req: HttpRequest, body: Bytes) -> AppResult<HttpResponse> {
    let prompt = form::text_field(&req, body, "prompt")
        .await?
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| AppError::ValidationError(EMPTY_PROMPT_MESSAGE.to_string()))?;

    let (session, is_new) = state.session_cookie.resolve(&req);
    tracing::debug!(session = %session, new_session = is_new, prompt_chars = prompt.len(), "Predict request");

    let reply = state.chat.predict(&session, &prompt).await?;

    Ok(ok_with_session(&state, &session).json(json!({
        "response_html": reply.response_html
    })))
}
