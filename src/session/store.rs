//! # Session Store Contract
//!
//! The seam between the chat pipeline and wherever histories live. Backends
//! are `MemorySessionStore` and `FileSessionStore`; the choice is made once in
//! `AppState::build` from `session.backend`.

use crate::conversation::HistoryLog;
use crate::session::cookie::SessionId;
use anyhow::Result;
use async_trait::async_trait;

/// Storage contract for per-session conversation history.
///
/// ## Semantics:
/// - `get` on an unknown or expired session returns an empty log, not an error
/// - `put` replaces whatever was stored (last writer wins, no merging)
/// - Errors are reserved for backend failures such as unreadable files
///
/// No locking is implied; callers that need read-modify-write consistency
/// serialize through `SessionLocks`.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, id: &SessionId) -> Result<HistoryLog>;

    async fn put(&self, id: &SessionId, history: HistoryLog) -> Result<()>;

    /// Forget a session entirely.
    async fn remove(&self, id: &SessionId) -> Result<()>;

    /// Drop sessions idle past the expiry window, returning how many went away.
    async fn purge_expired(&self) -> Result<usize>;

    /// Number of sessions currently held (expired-but-unswept entries included).
    async fn session_count(&self) -> Result<usize>;

    fn backend_name(&self) -> &'static str;
}
