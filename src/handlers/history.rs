//! # History Handlers
//!
//! ## Endpoints:
//! - `GET /api/history` - the session's stored turns, oldest first
//! - `DELETE /api/history` - forget the session's conversation

use super::ok_with_session;
use crate::error::AppResult;
use crate::state::AppState;
use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;

/// Read-only: the session cookie is not re-issued, so its lifetime keeps
/// tracking the last stored turn rather than the last read.
///
/// ## Response:
/// ```json
/// {
///   "turns": [
///     { "prompt": "Hola", "response_html": "<p>¡Hola!</p>", "created_at": "2025-01-01T12:00:00Z" }
///   ],
///   "count": 1
/// }
/// ```
pub async fn get_history(state: web::Data<AppState>, req: HttpRequest) -> AppResult<HttpResponse> {
    let (session, _) = state.session_cookie.resolve(&req);
    let history = state.chat.history(&session).await?;

    let turns: Vec<serde_json::Value> = history
        .turns()
        .iter()
        .map(|turn| {
            json!({
                "prompt": turn.prompt(),
                "response_html": turn.response_html(),
                "created_at": turn.created_at(),
            })
        })
        .collect();

    Ok(HttpResponse::Ok().json(json!({
        "count": turns.len(),
        "turns": turns,
    })))
}

pub async fn clear_history(state: web::Data<AppState>, req: HttpRequest) -> AppResult<HttpResponse> {
    let (session, is_new) = state.session_cookie.resolve(&req);
    if !is_new {
        state.chat.clear_history(&session).await?;
        tracing::info!(session = %session, "Conversation history cleared");
    }

    Ok(ok_with_session(&state, &session).json(json!({ "status": "cleared" })))
}
