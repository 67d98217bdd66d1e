//! Tail session: one watched file, one poll loop, any number of subscribers.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

use super::error::WatcherError;
use super::event::{TailEvent, TailFailure};
use super::feed::TailFeed;
use super::tailer::{FileTailer, TailRead};
use crate::config::WatcherConfig;

/// Identifier assigned to a session by the registry.
pub type SessionId = u64;

/// Lifecycle state of a tail session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Created, or suspended with no subscribers. No poll loop running.
    Idle,
    /// Poll loop running.
    Watching,
    /// Poll loop ended on an open, stat or read error.
    Failed,
    /// Poll loop ended by [`TailSession::stop`].
    Stopped,
}

impl SessionStatus {
    /// Whether the session can never poll again.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Stopped)
    }
}

#[derive(Debug, Clone)]
struct SessionState {
    status: SessionStatus,
    cursor: u64,
    failure: Option<TailFailure>,
}

/// Serializable snapshot of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: SessionId,
    pub path: PathBuf,
    pub status: SessionStatus,
    pub cursor: u64,
    pub subscribers: usize,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<TailFailure>,
}

/// Watches one file and fans its appended bytes out to subscribers.
///
/// The poll loop is the only writer of the cursor. It runs in its own tokio
/// task, at most once per session, and is started by the first
/// [`attach`](Self::attach).
#[derive(Debug)]
pub struct TailSession {
    id: SessionId,
    path: PathBuf,
    created_at: DateTime<Utc>,
    poll_interval: Duration,
    suspend_when_idle: bool,
    events: broadcast::Sender<TailEvent>,
    state: watch::Sender<SessionState>,
    cancel: CancellationToken,
}

impl TailSession {
    /// Create an idle session for `path`.
    #[must_use]
    pub fn new(id: SessionId, path: PathBuf, config: &WatcherConfig) -> Self {
        let (events, _) = broadcast::channel(config.channel_capacity.max(1));
        let (state, _) = watch::channel(SessionState {
            status: SessionStatus::Idle,
            cursor: 0,
            failure: None,
        });

        Self {
            id,
            path,
            created_at: Utc::now(),
            poll_interval: config.poll_interval(),
            suspend_when_idle: config.suspend_when_idle,
            events,
            state,
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Byte offset delivered so far.
    #[must_use]
    pub fn cursor(&self) -> u64 {
        self.state.borrow().cursor
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.state.borrow().status
    }

    /// The terminal failure, once the session has failed.
    #[must_use]
    pub fn failure(&self) -> Option<TailFailure> {
        self.state.borrow().failure.clone()
    }

    /// Number of attached feeds.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    /// Snapshot of the session for listing.
    #[must_use]
    pub fn info(&self) -> SessionInfo {
        let state = self.state.borrow();
        SessionInfo {
            id: self.id,
            path: self.path.clone(),
            status: state.status,
            cursor: state.cursor,
            subscribers: self.events.receiver_count(),
            created_at: self.created_at,
            failure: state.failure.clone(),
        }
    }

    /// Start the poll loop unless it is already running.
    ///
    /// Only an idle session starts; a watching, failed or stopped session is
    /// left alone. Returns `true` if a loop was spawned.
    ///
    /// With `suspend_when_idle` enabled and no feed attached, the spawned loop
    /// goes back to [`SessionStatus::Idle`] on its first iteration without
    /// reading the file. Use [`attach`](Self::attach) to start polling.
    pub fn start(self: &Arc<Self>) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }

        let started = self.state.send_if_modified(|state| {
            if state.status == SessionStatus::Idle {
                state.status = SessionStatus::Watching;
                true
            } else {
                false
            }
        });

        if started {
            tokio::spawn(Arc::clone(self).poll_loop());
        }
        started
    }

    /// Attach a subscriber and start polling.
    ///
    /// The feed receives every event emitted after this call. Attaching to a
    /// failed session yields its failure once.
    pub fn attach(self: &Arc<Self>) -> TailFeed {
        // Subscribe before reading the state so a failure is never missed.
        let rx = self.events.subscribe();
        let pending = self.failure().map(TailEvent::Failed);
        self.start();

        tracing::debug!(
            id = self.id,
            subscribers = self.subscriber_count(),
            "Subscriber attached"
        );
        TailFeed::new(self.id, rx, self.cancel.clone(), pending)
    }

    /// Detach a subscriber.
    ///
    /// Other subscribers are unaffected. With idle suspension enabled the loop
    /// suspends at its next iteration once nobody is left.
    pub fn detach(&self, feed: TailFeed) {
        feed.detach();
        tracing::debug!(
            id = self.id,
            subscribers = self.subscriber_count(),
            "Subscriber detached"
        );
    }

    /// End the poll loop for good and close every feed.
    pub fn stop(&self) {
        self.cancel.cancel();
        self.state.send_if_modified(|state| {
            if state.status.is_terminal() {
                false
            } else {
                state.status = SessionStatus::Stopped;
                true
            }
        });
        tracing::info!(id = self.id, path = %self.path.display(), "Tail session stopped");
    }

    async fn poll_loop(self: Arc<Self>) {
        let mut tailer = FileTailer::with_offset(self.path.clone(), self.cursor());
        tracing::info!(
            id = self.id,
            path = %self.path.display(),
            cursor = tailer.offset(),
            "Tail session watching"
        );

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            if self.suspend_when_idle && self.try_suspend() {
                tracing::debug!(id = self.id, "No subscribers left, suspending poll loop");
                return;
            }

            match tailer.read_new().await {
                Ok(read) => self.publish(read, tailer.offset()),
                Err(error) => {
                    self.fail(&error);
                    return;
                }
            }

            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                () = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        tracing::debug!(id = self.id, "Poll loop ended");
    }

    /// Go back to idle if nobody is subscribed.
    ///
    /// The check runs under the state lock so a concurrent `start` either sees
    /// the session still watching with its new subscriber counted, or sees it
    /// idle and spawns a fresh loop.
    fn try_suspend(&self) -> bool {
        self.state.send_if_modified(|state| {
            if state.status == SessionStatus::Watching && self.events.receiver_count() == 0 {
                state.status = SessionStatus::Idle;
                true
            } else {
                false
            }
        })
    }

    fn publish(&self, read: TailRead, offset: u64) {
        if self.cancel.is_cancelled() {
            return;
        }

        if read.truncated_from.is_none() && read.chunk.is_none() {
            return;
        }

        self.state.send_modify(|state| state.cursor = offset);

        if let Some(previous_cursor) = read.truncated_from {
            let _ = self.events.send(TailEvent::Truncated {
                previous_cursor,
                size: offset,
            });
        }

        if let Some(chunk) = read.chunk {
            tracing::trace!(
                id = self.id,
                offset = chunk.offset,
                bytes = chunk.len(),
                "Appended data"
            );
            // No receivers is not an error: the bytes were polled for nobody.
            let _ = self.events.send(TailEvent::Data(chunk));
        }
    }

    fn fail(&self, error: &WatcherError) {
        if self.cancel.is_cancelled() {
            return;
        }
        let Some(failure) = TailFailure::from_error(error) else {
            return;
        };

        tracing::warn!(
            id = self.id,
            path = %self.path.display(),
            error = %error,
            "Tail session failed"
        );

        self.state.send_modify(|state| {
            state.status = SessionStatus::Failed;
            state.failure = Some(failure.clone());
        });
        let _ = self.events.send(TailEvent::Failed(failure));
    }
}
