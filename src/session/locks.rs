//! # Per-Session Request Serialization
//!
//! Two requests for the same session that both run get → generate → put would
//! lose one of the turns. When enabled, `SessionLocks` hands out one async
//! mutex per session id and the chat service holds it for the whole sequence.
//! Different sessions never contend with each other.

use crate::session::cookie::SessionId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

pub struct SessionLocks {
    enabled: bool,
    locks: Mutex<HashMap<SessionId, Arc<AsyncMutex<()>>>>,
}

impl SessionLocks {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Wait for exclusive access to `id`.
    ///
    /// Returns `None` when serialization is disabled. The guard releases the
    /// session when dropped.
    pub async fn acquire(&self, id: &SessionId) -> Option<OwnedMutexGuard<()>> {
        if !self.enabled {
            return None;
        }

        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            // Entries only referenced by the map are idle; drop them.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(*id).or_default().clone()
        };

        Some(lock.lock_owned().await)
    }

    #[cfg(test)]
    pub fn tracked_sessions(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_disabled_locks_never_block() {
        let locks = SessionLocks::new(false);
        let id = SessionId::generate();
        assert!(locks.acquire(&id).await.is_none());
        assert!(locks.acquire(&id).await.is_none());
    }

    #[tokio::test]
    async fn test_same_session_waits_for_release() {
        let locks = Arc::new(SessionLocks::new(true));
        let id = SessionId::generate();

        let guard = locks.acquire(&id).await;
        assert!(guard.is_some());

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move { locks.acquire(&id).await.is_some() })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        assert!(contender.await.unwrap());
    }

    #[tokio::test]
    async fn test_different_sessions_do_not_contend() {
        let locks = SessionLocks::new(true);
        let _a = locks.acquire(&SessionId::generate()).await;
        let b = tokio::time::timeout(
            Duration::from_millis(50),
            locks.acquire(&SessionId::generate()),
        )
        .await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_idle_entries_are_pruned() {
        let locks = SessionLocks::new(true);
        drop(locks.acquire(&SessionId::generate()).await);
        let _held = locks.acquire(&SessionId::generate()).await;
        assert_eq!(locks.tracked_sessions(), 1);
    }
}
