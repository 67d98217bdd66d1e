//! Events delivered to tail session subscribers.

use std::borrow::Cow;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::error::{TailErrorKind, WatcherError};

/// A run of bytes appended to a watched file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailChunk {
    /// File offset of the first byte in `data`.
    pub offset: u64,
    /// The appended bytes.
    pub data: Arc<[u8]>,
}

impl TailChunk {
    /// Create a chunk starting at `offset`.
    #[must_use]
    pub fn new(offset: u64, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            offset,
            data: data.into(),
        }
    }

    /// Number of bytes in the chunk.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The chunk as text, replacing invalid UTF-8 sequences.
    #[must_use]
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.data)
    }
}

/// Terminal failure of a tail session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TailFailure {
    pub kind: TailErrorKind,
    pub message: String,
}

impl TailFailure {
    /// Build a failure from a terminal watcher error.
    ///
    /// Returns `None` for errors that do not end a session.
    #[must_use]
    pub fn from_error(error: &WatcherError) -> Option<Self> {
        error.kind().map(|kind| Self {
            kind,
            message: error.to_string(),
        })
    }
}

impl std::fmt::Display for TailFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// One item of a session's event sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TailEvent {
    /// New bytes were appended.
    Data(TailChunk),
    /// The file shrank below the cursor; reading restarts at offset 0.
    Truncated { previous_cursor: u64, size: u64 },
    /// The session failed. Always the last event of a feed.
    Failed(TailFailure),
}

impl TailEvent {
    /// Whether no further events follow this one.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Short event name used by transports.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Data(_) => "data",
            Self::Truncated { .. } => "truncated",
            Self::Failed(_) => "failed",
        }
    }
}
