//! # In-Memory Session Store
//!
//! Keeps every session's history in a process-local map. Contents disappear
//! on restart, which matches a single-process deployment.
//!
//! ## Thread Safety:
//! A `tokio::sync::RwLock` guards the map so concurrent `get` calls never block
//! each other; `put` takes the write lock only for the duration of an insert.

use crate::conversation::HistoryLog;
use crate::session::cookie::SessionId;
use crate::session::store::SessionStore;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct Entry {
    history: HistoryLog,
    last_access: DateTime<Utc>,
}

pub struct MemorySessionStore {
    entries: RwLock<HashMap<SessionId, Entry>>,
    idle_timeout: Duration,
}

impl MemorySessionStore {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            idle_timeout,
        }
    }

    fn is_expired(&self, entry: &Entry, now: DateTime<Utc>) -> bool {
        now - entry.last_access > self.idle_timeout
    }

    #[cfg(test)]
    pub(crate) async fn put_at(&self, id: &SessionId, history: HistoryLog, at: DateTime<Utc>) {
        self.entries.write().await.insert(
            *id,
            Entry {
                history,
                last_access: at,
            },
        );
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, id: &SessionId) -> Result<HistoryLog> {
        let entries = self.entries.read().await;
        let history = match entries.get(id) {
            Some(entry) if !self.is_expired(entry, Utc::now()) => entry.history.clone(),
            _ => HistoryLog::new(),
        };
        Ok(history)
    }

    async fn put(&self, id: &SessionId, history: HistoryLog) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(
            *id,
            Entry {
                history,
                last_access: Utc::now(),
            },
        );
        Ok(())
    }

    async fn remove(&self, id: &SessionId) -> Result<()> {
        self.entries.write().await.remove(id);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !self.is_expired(entry, now));
        Ok(before - entries.len())
    }

    async fn session_count(&self) -> Result<usize> {
        Ok(self.entries.read().await.len())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::append_turn;

    fn store() -> MemorySessionStore {
        MemorySessionStore::new(Duration::minutes(30))
    }

    fn one_turn() -> HistoryLog {
        let mut log = HistoryLog::new();
        append_turn(&mut log, "Hi", "Hello", "<p>Hello</p>").unwrap();
        log
    }

    #[tokio::test]
    async fn test_unknown_session_is_empty() {
        let log = store().get(&SessionId::generate()).await.unwrap();
        assert!(log.is_empty());
    }

    #[tokio::test]
    async fn test_put_replaces_previous_value() {
        let store = store();
        let id = SessionId::generate();

        store.put(&id, one_turn()).await.unwrap();
        store.put(&id, HistoryLog::new()).await.unwrap();

        assert!(store.get(&id).await.unwrap().is_empty());
        assert_eq!(store.session_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = store();
        let a = SessionId::generate();
        let b = SessionId::generate();

        store.put(&a, one_turn()).await.unwrap();

        assert_eq!(store.get(&a).await.unwrap().len(), 1);
        assert!(store.get(&b).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expired_sessions_read_as_empty_and_are_purged() {
        let store = store();
        let stale = SessionId::generate();
        let fresh = SessionId::generate();

        store
            .put_at(&stale, one_turn(), Utc::now() - Duration::hours(2))
            .await;
        store.put(&fresh, one_turn()).await.unwrap();

        assert!(store.get(&stale).await.unwrap().is_empty());
        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert_eq!(store.session_count().await.unwrap(), 1);
        assert_eq!(store.get(&fresh).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_remove_forgets_session() {
        let store = store();
        let id = SessionId::generate();
        store.put(&id, one_turn()).await.unwrap();
        store.remove(&id).await.unwrap();
        assert!(store.get(&id).await.unwrap().is_empty());
        assert_eq!(store.session_count().await.unwrap(), 0);
    }
}
