//! # Filesystem Session Store
//!
//! Persists each session as `<session-id>.json` inside a directory, so
//! conversations survive a restart of the process.
//!
//! ## File Format:
//! ```json
//! { "updated_at": "2025-01-01T12:00:00Z", "history": [ { "prompt": "...", ... } ] }
//! ```
//!
//! ## Write Safety:
//! Each write goes to its own temporary sibling and is renamed into place.
//! A crash mid-write never leaves a half-written history behind, and
//! overlapping writes for one session resolve to whichever rename lands last.

use crate::conversation::HistoryLog;
use crate::session::cookie::SessionId;
use crate::session::store::SessionStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
struct SessionFile {
    updated_at: DateTime<Utc>,
    history: HistoryLog,
}

pub struct FileSessionStore {
    directory: PathBuf,
    idle_timeout: Duration,
}

impl FileSessionStore {
    /// Open (and create if needed) the session directory.
    pub async fn open(directory: impl Into<PathBuf>, idle_timeout: Duration) -> Result<Self> {
        let directory = directory.into();
        tokio::fs::create_dir_all(&directory)
            .await
            .with_context(|| format!("Failed to create session directory {}", directory.display()))?;

        tracing::info!("Session files stored under {}", directory.display());
        Ok(Self {
            directory,
            idle_timeout,
        })
    }

    fn path_for(&self, id: &SessionId) -> PathBuf {
        self.directory.join(format!("{}.json", id))
    }

    fn is_expired(&self, file: &SessionFile, now: DateTime<Utc>) -> bool {
        now - file.updated_at > self.idle_timeout
    }

    async fn read_file(path: &Path) -> Result<Option<SessionFile>> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read session file {}", path.display()))
            }
        };

        match serde_json::from_slice::<SessionFile>(&bytes) {
            Ok(file) => Ok(Some(file)),
            Err(e) => {
                // A corrupt file is treated like a missing session rather than
                // failing every request from that user.
                tracing::warn!("Ignoring unreadable session file {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    async fn write_file(&self, id: &SessionId, file: &SessionFile) -> Result<()> {
        let target = self.path_for(id);
        // One temp file per write; overlapping puts for a session must not share it.
        let tmp = self.directory.join(format!(".{}.{}.json.tmp", id, Uuid::new_v4()));
        let bytes = serde_json::to_vec(file)?;

        if let Err(e) = tokio::fs::write(&tmp, bytes).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e).with_context(|| format!("Failed to write session file {}", tmp.display()));
        }
        if let Err(e) = tokio::fs::rename(&tmp, &target).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e).with_context(|| format!("Failed to move session file into {}", target.display()));
        }
        Ok(())
    }

    async fn session_files(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.directory).await?;
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            let is_session = path.extension().is_some_and(|ext| ext == "json")
                && path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .is_some_and(|s| s.parse::<SessionId>().is_ok());
            if is_session {
                paths.push(path);
            }
        }
        Ok(paths)
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn get(&self, id: &SessionId) -> Result<HistoryLog> {
        let history = match Self::read_file(&self.path_for(id)).await? {
            Some(file) if !self.is_expired(&file, Utc::now()) => file.history,
            _ => HistoryLog::new(),
        };
        Ok(history)
    }

    async fn put(&self, id: &SessionId, history: HistoryLog) -> Result<()> {
        let file = SessionFile {
            updated_at: Utc::now(),
            history,
        };
        self.write_file(id, &file).await
    }

    async fn remove(&self, id: &SessionId) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn purge_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let mut removed = 0;

        for path in self.session_files().await? {
            let stale = match Self::read_file(&path).await? {
                Some(file) => self.is_expired(&file, now),
                None => true,
            };
            if stale {
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => removed += 1,
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }

        Ok(removed)
    }

    async fn session_count(&self) -> Result<usize> {
        Ok(self.session_files().await?.len())
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }
}
