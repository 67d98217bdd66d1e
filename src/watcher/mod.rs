//! File watching engine.
//!
//! A [`WatchRegistry`] owns one [`TailSession`] per watched file. Each session
//! polls its file on a fixed interval and fans appended bytes out to every
//! attached [`TailFeed`].

mod error;
mod event;
mod feed;
mod registry;
mod session;
mod tailer;

pub use error::{TailErrorKind, WatcherError};
pub use event::{TailChunk, TailEvent, TailFailure};
pub use feed::TailFeed;
pub use registry::WatchRegistry;
pub use session::{SessionId, SessionInfo, SessionStatus, TailSession};
pub use tailer::{FileTailer, TailRead};
