//! Validation of paths submitted for watching.

use std::path::PathBuf;

use super::error::ApiError;

/// A path that is safe to hand to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Canonical absolute path.
    pub path: PathBuf,
    /// Size of the file at validation time.
    pub size: u64,
}

/// Check that `raw` names a readable regular file and canonicalize it.
///
/// # Errors
///
/// Returns the [`ApiError`] describing the first check that failed.
pub async fn resolve_watch_path(raw: &str) -> Result<ResolvedPath, ApiError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ApiError::MissingPath);
    }
    let path = PathBuf::from(raw);

    let metadata = tokio::fs::metadata(&path)
        .await
        .map_err(|source| ApiError::StatFailed {
            path: path.clone(),
            source,
        })?;

    if metadata.is_dir() {
        return Err(ApiError::IsDirectory(path));
    }
    if !metadata.is_file() {
        return Err(ApiError::NotRegularFile(path));
    }

    tokio::fs::File::open(&path)
        .await
        .map_err(|source| ApiError::Unreadable {
            path: path.clone(),
            source,
        })?;

    let canonical = tokio::fs::canonicalize(&path)
        .await
        .map_err(|source| ApiError::StatFailed { path, source })?;

    Ok(ResolvedPath {
        path: canonical,
        size: metadata.len(),
    })
}
