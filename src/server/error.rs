//! HTTP API error types.

use std::path::PathBuf;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::api::ErrorResponse;
use crate::watcher::{SessionId, WatcherError};

/// Errors returned by the API handlers.
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    /// The request did not name a file.
    #[error("filepath is missing")]
    MissingPath,

    /// The file could not be stat'ed.
    #[error("failed to get file's stat: {path}: {source}")]
    StatFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The path names a directory.
    #[error("must be a file, not a directory: {0}")]
    IsDirectory(PathBuf),

    /// The path names something other than a regular file.
    #[error("must be a regular file: {0}")]
    NotRegularFile(PathBuf),

    /// The file exists but cannot be opened for reading.
    #[error("file is not readable: {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The route segment is not an identifier.
    #[error("ID must be a positive integer: {0}")]
    MalformedId(String),

    /// Identifier 0 is never assigned.
    #[error("ID must be greater than 0")]
    InvalidId,

    /// No session has this identifier.
    #[error("no watched file with ID {0}")]
    NotFound(SessionId),

    /// Registry rejected the request.
    #[error(transparent)]
    Watcher(#[from] WatcherError),
}

impl ApiError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Watcher(WatcherError::DuplicatePath(_)) => StatusCode::CONFLICT,
            Self::Watcher(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        tracing::debug!(status = %status, error = %self, "Request failed");
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
