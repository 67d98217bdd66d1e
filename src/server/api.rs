//! Request and response types for the HTTP API.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::watcher::{SessionId, TailErrorKind, TailEvent};

/// Body of POST /api/files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddFileRequest {
    /// Path of the file to watch.
    #[serde(default)]
    pub filepath: Option<String>,
}

impl AddFileRequest {
    #[must_use]
    pub fn new(filepath: impl Into<String>) -> Self {
        Self {
            filepath: Some(filepath.into()),
        }
    }
}

/// Response for POST /api/files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddFileResponse {
    /// Identifier of the new watch.
    pub id: SessionId,
    /// Size of the file when it was added.
    pub size: u64,
}

/// Response for GET /api/files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListResponse {
    /// Watched paths keyed by identifier.
    pub data: BTreeMap<SessionId, PathBuf>,
}

/// Response carrying a human readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// JSON payload of a streamed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamMessage {
    /// Appended text, decoded lossily.
    Data { offset: u64, text: String },
    /// The file was truncated and is read again from the start.
    Truncated { previous_cursor: u64, size: u64 },
    /// Watching failed; the stream ends.
    Failed { kind: TailErrorKind, message: String },
}

impl From<&TailEvent> for StreamMessage {
    fn from(event: &TailEvent) -> Self {
        match event {
            TailEvent::Data(chunk) => Self::Data {
                offset: chunk.offset,
                text: chunk.text().into_owned(),
            },
            TailEvent::Truncated {
                previous_cursor,
                size,
            } => Self::Truncated {
                previous_cursor: *previous_cursor,
                size: *size,
            },
            TailEvent::Failed(failure) => Self::Failed {
                kind: failure.kind,
                message: failure.message.clone(),
            },
        }
    }
}
