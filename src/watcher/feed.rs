//! Subscriber handle on a tail session's fan-out.

use futures_core::Stream;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;

use super::event::TailEvent;
use super::session::SessionId;

/// One consumer's view of a session's event sequence.
///
/// Yields data events in order and ends after a failure, after the session
/// is stopped, or never. Dropping the feed detaches it.
///
/// Delivery is bounded: a consumer that falls more than the channel capacity
/// behind loses the oldest events instead of holding the others back.
#[derive(Debug)]
pub struct TailFeed {
    session_id: SessionId,
    rx: broadcast::Receiver<TailEvent>,
    cancel: CancellationToken,
    pending: Option<TailEvent>,
    finished: bool,
    skipped: u64,
}

impl TailFeed {
    pub(crate) fn new(
        session_id: SessionId,
        rx: broadcast::Receiver<TailEvent>,
        cancel: CancellationToken,
        pending: Option<TailEvent>,
    ) -> Self {
        Self {
            session_id,
            rx,
            cancel,
            pending,
            finished: false,
            skipped: 0,
        }
    }

    /// Identifier of the session this feed is attached to.
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Number of events dropped because this consumer lagged.
    #[must_use]
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Whether the sequence has ended.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Wait for the next event.
    ///
    /// Returns `None` once the sequence has ended.
    pub async fn recv(&mut self) -> Option<TailEvent> {
        if self.finished {
            return None;
        }

        if let Some(event) = self.pending.take() {
            self.finished = event.is_terminal();
            return Some(event);
        }

        loop {
            tokio::select! {
                biased;

                result = self.rx.recv() => match result {
                    Ok(event) => {
                        self.finished = event.is_terminal();
                        return Some(event);
                    }
                    Err(RecvError::Lagged(count)) => {
                        tracing::warn!(
                            id = self.session_id,
                            skipped = count,
                            "Subscriber lagged, dropping oldest events"
                        );
                        self.skipped += count;
                    }
                    Err(RecvError::Closed) => break,
                },

                () = self.cancel.cancelled() => break,
            }
        }

        self.finished = true;
        None
    }

    /// Detach from the session.
    pub fn detach(self) {
        drop(self);
    }

    /// Turn the feed into a stream of events.
    pub fn into_stream(self) -> impl Stream<Item = TailEvent> + Send + 'static {
        futures_util::stream::unfold(self, |mut feed| async move {
            let event = feed.recv().await?;
            Some((event, feed))
        })
    }
}
