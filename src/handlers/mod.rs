pub mod audio;
pub mod chat;
pub mod form;
pub mod history;

pub use audio::*;
pub use chat::*;
pub use history::*;

use crate::health;
use crate::session::SessionId;
use crate::state::AppState;
use actix_web::{web, HttpResponse, HttpResponseBuilder};

/// Register every route the service exposes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(home))
        .route("/health", web::get().to(health::health_check))
        .route("/chatbot", web::post().to(voice_chatbot))
        .service(
            web::scope("/api")
                .route("/predict", web::post().to(predict))
                .route("/transcribe", web::post().to(transcribe))
                .route("/speak", web::post().to(speak))
                .route("/history", web::get().to(get_history))
                .route("/history", web::delete().to(clear_history))
                .route("/v1/health", web::get().to(health::health_check))
                .route("/v1/metrics", web::get().to(health::detailed_metrics)),
        );
}

/// Start a 200 response that (re)issues the session cookie.
///
/// Only for routes that write the session; the store refreshes its idle clock
/// on writes, not reads.
fn ok_with_session(state: &AppState, session: &SessionId) -> HttpResponseBuilder {
    let mut builder = HttpResponse::Ok();
    builder.cookie(state.session_cookie.issue(session));
    builder
}
