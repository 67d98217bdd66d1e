//! Watcher error types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Errors raised by the watch registry and by tail sessions.
#[derive(thiserror::Error, Debug)]
pub enum WatcherError {
    /// Another session already watches this path.
    #[error("Path is already watched: {0}")]
    DuplicatePath(PathBuf),

    /// The watched file could not be opened.
    #[error("Failed to open {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The watched file could not be stat'ed.
    #[error("Failed to stat {path}: {source}")]
    StatFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading the appended bytes failed.
    #[error("Failed to read {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl WatcherError {
    /// The terminal failure kind, or `None` for registry-level errors.
    #[must_use]
    pub fn kind(&self) -> Option<TailErrorKind> {
        match self {
            Self::DuplicatePath(_) => None,
            Self::OpenFailed { .. } => Some(TailErrorKind::OpenFailed),
            Self::StatFailed { .. } => Some(TailErrorKind::StatFailed),
            Self::ReadFailed { .. } => Some(TailErrorKind::ReadFailed),
        }
    }
}

/// Kind of a terminal session failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TailErrorKind {
    OpenFailed,
    StatFailed,
    ReadFailed,
}

impl std::fmt::Display for TailErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::OpenFailed => "open_failed",
            Self::StatFailed => "stat_failed",
            Self::ReadFailed => "read_failed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn io_error() -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::NotFound, "No such file or directory")
    }

    #[test]
    fn test_duplicate_path_display() {
        let err = WatcherError::DuplicatePath(PathBuf::from("/var/log/syslog"));
        assert_eq!(err.to_string(), "Path is already watched: /var/log/syslog");
        assert!(err.kind().is_none());
    }

    #[test]
    fn test_open_failed_display() {
        let err = WatcherError::OpenFailed {
            path: PathBuf::from("/no/such/file"),
            source: io_error(),
        };
        assert!(err.to_string().starts_with("Failed to open /no/such/file"));
        assert_eq!(err.kind(), Some(TailErrorKind::OpenFailed));
    }

    #[test]
    fn test_terminal_kinds() {
        let stat = WatcherError::StatFailed {
            path: PathBuf::from("/tmp/a.log"),
            source: io_error(),
        };
        let read = WatcherError::ReadFailed {
            path: PathBuf::from("/tmp/a.log"),
            source: io_error(),
        };
        assert_eq!(stat.kind(), Some(TailErrorKind::StatFailed));
        assert_eq!(read.kind(), Some(TailErrorKind::ReadFailed));
        assert!(read.to_string().contains("Failed to read"));
    }

    #[test]
    fn test_error_kind_serialization() {
        let json = serde_json::to_string(&TailErrorKind::OpenFailed).unwrap();
        assert_eq!(json, "\"open_failed\"");
        assert_eq!(TailErrorKind::ReadFailed.to_string(), "read_failed");
    }
}
