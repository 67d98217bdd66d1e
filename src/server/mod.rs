//! HTTP API over the watch registry.
//!
//! Validates submitted paths, maps registry errors to status codes and
//! forwards tail events over websockets and SSE.

mod api;
mod error;
mod handlers;
mod paths;
#[allow(clippy::module_inception)]
mod server;

pub use api::{
    AddFileRequest, AddFileResponse, ErrorResponse, ListResponse, MessageResponse, StreamMessage,
};
pub use error::ApiError;
pub use handlers::AppState;
pub use paths::{resolve_watch_path, ResolvedPath};
pub use server::LogmonServer;
