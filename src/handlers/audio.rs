//! # Audio Handlers
//!
//! ## Endpoints:
//! - `POST /api/transcribe` - speech to text for a multipart `audio` upload
//! - `POST /chatbot` - voice chat: transcribe, answer, and optionally speak the answer
//! - `POST /api/speak` - synthesize speech for a `text` field
//!
//! Upload size is bounded by `server.max_upload_bytes`; anything larger is a 413.

use super::{form, ok_with_session};
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use actix_multipart::Multipart;
use actix_web::web::{self, Bytes};
use actix_web::{HttpRequest, HttpResponse};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::json;

const TRANSCRIPTION_DISABLED: &str = "Transcription is disabled on this server";
const SPEECH_DISABLED: &str = "Speech synthesis is disabled on this server";

/// ## Endpoint: `POST /api/transcribe`
///
/// ## Response:
/// ```json
/// { "text": "Hola, ¿qué tal?" }
/// ```
pub async fn transcribe(state: web::Data<AppState>, payload: Multipart) -> AppResult<HttpResponse> {
    if !state.chat.transcription_enabled() {
        return Err(AppError::ServiceUnavailable(TRANSCRIPTION_DISABLED.to_string()));
    }

    let audio = form::audio_field(payload, state.config.server.max_upload_bytes).await?;
    tracing::debug!(
        bytes = audio.bytes.len(),
        filename = ?audio.filename,
        content_type = ?audio.content_type,
        "Transcribe request"
    );

    let text = state.chat.transcribe(&audio).await?;
    Ok(HttpResponse::Ok().json(json!({ "text": text })))
}

/// Voice variant of `/api/predict`.
///
/// ## Endpoint: `POST /chatbot`
///
/// ## Response:
/// ```json
/// {
///   "texto": "¿Qué hora es?",
///   "response_html": "<p>No tengo acceso a un reloj.</p>",
///   "audio": "SUQzBAAAAAAA...",
///   "audio_format": "mp3"
/// }
/// ```
/// `audio` is base64 and is `null` when speech synthesis is disabled.
pub async fn voice_chatbot(
    state: web::Data<AppState>,
    req: HttpRequest,
    payload: Multipart,
) -> AppResult<HttpResponse> {
    if !state.chat.transcription_enabled() {
        return Err(AppError::ServiceUnavailable(TRANSCRIPTION_DISABLED.to_string()));
    }

    let audio = form::audio_field(payload, state.config.server.max_upload_bytes).await?;
    let (session, is_new) = state.session_cookie.resolve(&req);
    tracing::debug!(session = %session, new_session = is_new, bytes = audio.bytes.len(), "Voice chat request");

    let voice = state.chat.voice_chat(&session, &audio).await?;
    let encoded = voice.audio.as_deref().map(|bytes| BASE64.encode(bytes));

    Ok(ok_with_session(&state, &session).json(json!({
        "texto": voice.transcript,
        "response_html": voice.reply.response_html,
        "audio": encoded,
        "audio_format": "mp3",
    })))
}

/// ## Endpoint: `POST /api/speak`
///
/// Form or JSON field `text`. Responds with `audio/mpeg` bytes.
pub async fn speak(state: web::Data<AppState>, req: HttpRequest, body: Bytes) -> AppResult<HttpResponse> {
    let formatter = state.chat.formatter();
    if !formatter.speech_enabled() {
        return Err(AppError::ServiceUnavailable(SPEECH_DISABLED.to_string()));
    }

    let text = form::text_field(&req, body, "text")
        .await?
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| AppError::ValidationError("Field 'text' is required".to_string()))?;

    let audio = formatter.to_speech(&text).await?;
    Ok(HttpResponse::Ok().content_type("audio/mpeg").body(audio))
}
