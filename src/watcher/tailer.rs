//! Incremental file tailer.
//!
//! Reads the bytes appended to a file since the last read.

use std::io::SeekFrom;
use std::path::PathBuf;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use super::error::WatcherError;
use super::event::TailChunk;

/// Outcome of a single tailer read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TailRead {
    /// Offset the tailer was at before it detected truncation.
    pub truncated_from: Option<u64>,
    /// Bytes appended since the previous read, if any.
    pub chunk: Option<TailChunk>,
}

/// File reader that tracks the byte offset already consumed.
///
/// Every call to [`FileTailer::read_new`] opens the file, stats it, reads the
/// appended region and closes it again, so no descriptor is held between
/// reads.
#[derive(Debug)]
pub struct FileTailer {
    /// Path to the watched file.
    path: PathBuf,
    /// Current byte offset in the file.
    offset: u64,
}

impl FileTailer {
    /// Create a tailer starting at the beginning of the file.
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path, offset: 0 }
    }

    /// Create a tailer starting at a specific offset.
    #[must_use]
    pub fn with_offset(path: PathBuf, offset: u64) -> Self {
        Self { path, offset }
    }

    /// Get the current byte offset.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Read the bytes appended since the last read.
    ///
    /// If the file is smaller than the current offset (truncated or rotated)
    /// the offset is reset to 0 and the whole current content is returned.
    ///
    /// # Errors
    ///
    /// Returns [`WatcherError::OpenFailed`], [`WatcherError::StatFailed`] or
    /// [`WatcherError::ReadFailed`] for the step that failed. The offset is
    /// not advanced on error.
    pub async fn read_new(&mut self) -> Result<TailRead, WatcherError> {
        let mut file = File::open(&self.path)
            .await
            .map_err(|source| WatcherError::OpenFailed {
                path: self.path.clone(),
                source,
            })?;

        let size = file
            .metadata()
            .await
            .map_err(|source| WatcherError::StatFailed {
                path: self.path.clone(),
                source,
            })?
            .len();

        let mut read = TailRead::default();

        if size < self.offset {
            tracing::warn!(
                path = %self.path.display(),
                old_offset = self.offset,
                new_len = size,
                "File truncated, resetting offset to 0"
            );
            read.truncated_from = Some(self.offset);
            self.offset = 0;
        }

        if size == self.offset {
            return Ok(read);
        }

        let data = self.read_range(&mut file, size).await?;
        read.chunk = Some(TailChunk::new(self.offset, data));
        self.offset = size;

        Ok(read)
    }

    /// Read exactly the bytes between the current offset and `size`.
    async fn read_range(&self, file: &mut File, size: u64) -> Result<Vec<u8>, WatcherError> {
        let read_failed = |source| WatcherError::ReadFailed {
            path: self.path.clone(),
            source,
        };

        let len = usize::try_from(size - self.offset).map_err(|_| {
            read_failed(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "appended region does not fit in memory",
            ))
        })?;

        file.seek(SeekFrom::Start(self.offset))
            .await
            .map_err(read_failed)?;

        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf).await.map_err(read_failed)?;
        Ok(buf)
    }
}
