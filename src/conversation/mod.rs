//! # Conversation Module
//!
//! Bounded conversational context: which prior turns are replayed to the
//! generation service, how they are rendered, and how a finished exchange is
//! recorded in the session's history.
//!
//! ## Key Components:
//! - **turn**: `Turn` and `HistoryLog` data types
//! - **context**: `render_context`, `append_turn` and the `ContextBuilder`
//! - **service**: `ChatService`, the request pipeline tying store and adapters together
//! - **error**: `ChatError` taxonomy

pub mod context;
pub mod error;
pub mod service;
pub mod turn;

pub use context::{append_turn, render_context, ContextBuilder};
pub use error::{ChatError, ChatResult};
pub use service::{ChatService, Reply, VoiceReply};
pub use turn::{HistoryLog, Turn};
