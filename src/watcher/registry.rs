//! Registry of watched files.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;

use super::error::WatcherError;
use super::feed::TailFeed;
use super::session::{SessionId, SessionInfo, TailSession};
use crate::config::WatcherConfig;

#[derive(Debug, Default)]
struct RegistryInner {
    sessions: HashMap<SessionId, Arc<TailSession>>,
    /// Last issued identifier.
    counter: SessionId,
}

/// Maps stable identifiers to tail sessions.
///
/// Identifier allocation and map changes happen under one write lock.
/// Identifiers start at 1 and are never reused, even after removal.
#[derive(Debug)]
pub struct WatchRegistry {
    config: WatcherConfig,
    inner: RwLock<RegistryInner>,
}

impl Default for WatchRegistry {
    fn default() -> Self {
        Self::new(WatcherConfig::default())
    }
}

impl WatchRegistry {
    /// Create an empty registry whose sessions use `config`.
    #[must_use]
    pub fn new(config: WatcherConfig) -> Self {
        Self {
            config,
            inner: RwLock::new(RegistryInner::default()),
        }
    }

    /// Register a file and return its identifier.
    ///
    /// The path is not checked for existence; a missing file surfaces as an
    /// `OpenFailed` event once the session is watched.
    ///
    /// # Errors
    ///
    /// Returns [`WatcherError::DuplicatePath`] if a session already watches
    /// `path`.
    pub async fn add(&self, path: impl Into<PathBuf>) -> Result<SessionId, WatcherError> {
        let path = path.into();
        let mut inner = self.inner.write().await;

        if inner.sessions.values().any(|s| s.path() == path.as_path()) {
            tracing::debug!(path = %path.display(), "Rejecting duplicate watch");
            return Err(WatcherError::DuplicatePath(path));
        }

        inner.counter += 1;
        let id = inner.counter;
        let session = TailSession::new(id, path, &self.config);
        tracing::info!(id, path = %session.path().display(), "Watch added");
        inner.sessions.insert(id, Arc::new(session));

        Ok(id)
    }

    /// Get a session by identifier.
    pub async fn get(&self, id: SessionId) -> Option<Arc<TailSession>> {
        self.inner.read().await.sessions.get(&id).cloned()
    }

    /// Get the session watching `path`.
    pub async fn get_by_path(&self, path: &Path) -> Option<Arc<TailSession>> {
        self.inner
            .read()
            .await
            .sessions
            .values()
            .find(|s| s.path() == path)
            .cloned()
    }

    /// Stop and remove a session.
    ///
    /// Returns `false` if no session has this identifier.
    pub async fn remove(&self, id: SessionId) -> bool {
        let mut inner = self.inner.write().await;

        let Some(session) = inner.sessions.get(&id) else {
            return false;
        };
        session.stop();
        inner.sessions.remove(&id);

        tracing::info!(id, "Watch removed");
        true
    }

    /// Snapshot of identifiers and their paths.
    pub async fn list_paths(&self) -> HashMap<SessionId, PathBuf> {
        self.inner
            .read()
            .await
            .sessions
            .iter()
            .map(|(id, s)| (*id, s.path().to_path_buf()))
            .collect()
    }

    /// Snapshots of every session, ordered by identifier.
    pub async fn list(&self) -> Vec<SessionInfo> {
        let mut infos: Vec<SessionInfo> = self
            .inner
            .read()
            .await
            .sessions
            .values()
            .map(|s| s.info())
            .collect();
        infos.sort_by_key(|info| info.id);
        infos
    }

    /// Attach a new subscriber to a session.
    pub async fn subscribe(&self, id: SessionId) -> Option<TailFeed> {
        self.get(id).await.map(|session| session.attach())
    }

    /// Number of registered sessions.
    pub async fn len(&self) -> usize {
        self.inner.read().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.sessions.is_empty()
    }

    /// Stop and remove every session.
    pub async fn shutdown(&self) {
        let mut inner = self.inner.write().await;
        for session in inner.sessions.values() {
            session.stop();
        }
        let count = inner.sessions.len();
        inner.sessions.clear();
        tracing::info!(count, "Registry shut down");
    }
}
