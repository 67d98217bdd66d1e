//! HTTP handlers for the watch API.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::PathRejection;
use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::Response;
use axum::Json;
use futures_util::stream::StreamExt;

use super::api::{AddFileRequest, AddFileResponse, ListResponse, MessageResponse, StreamMessage};
use super::error::ApiError;
use super::paths::resolve_watch_path;
use crate::watcher::{SessionId, SessionInfo, TailEvent, TailFeed, WatchRegistry};

/// Longest close reason a websocket frame can carry.
const MAX_CLOSE_REASON: usize = 123;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Registry of watched files.
    pub registry: Arc<WatchRegistry>,
}

impl AppState {
    #[must_use]
    pub fn new(registry: Arc<WatchRegistry>) -> Self {
        Self { registry }
    }
}

/// Identifier from the route, with malformed values reported as [`ApiError`].
type IdParam = Result<Path<SessionId>, PathRejection>;

fn session_id(param: IdParam) -> Result<SessionId, ApiError> {
    param
        .map(|Path(id)| id)
        .map_err(|rejection| ApiError::MalformedId(rejection.body_text()))
}

/// Decode a POST body leniently.
///
/// The content type is not checked, and a body that is not a JSON object is
/// treated as naming no file.
fn parse_add_request(body: &[u8]) -> AddFileRequest {
    serde_json::from_slice(body).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "Failed to decode request body");
        AddFileRequest::default()
    })
}

/// GET /api/files - List watched files.
pub async fn list_files(State(state): State<AppState>) -> Json<ListResponse> {
    let data = state.registry.list_paths().await.into_iter().collect();
    Json(ListResponse { data })
}

/// POST /api/files - Start watching a file.
pub async fn add_file(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<AddFileResponse>, ApiError> {
    let raw = parse_add_request(&body)
        .filepath
        .ok_or(ApiError::MissingPath)?;
    let resolved = resolve_watch_path(&raw).await?;
    let id = state.registry.add(resolved.path).await?;

    Ok(Json(AddFileResponse {
        id,
        size: resolved.size,
    }))
}

/// GET /api/files/:id - Describe a watched file.
pub async fn get_file(
    State(state): State<AppState>,
    id: IdParam,
) -> Result<Json<SessionInfo>, ApiError> {
    let id = session_id(id)?;
    let session = state.registry.get(id).await.ok_or(ApiError::NotFound(id))?;
    Ok(Json(session.info()))
}

/// DELETE /api/files/:id - Stop watching a file.
pub async fn delete_file(
    State(state): State<AppState>,
    id: IdParam,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = session_id(id)?;
    if id == 0 {
        return Err(ApiError::InvalidId);
    }
    state.registry.remove(id).await;
    Ok(Json(MessageResponse::new("deleted successfully")))
}

/// GET /api/files/:id/ws - Stream appended text over a websocket.
pub async fn watch_ws(
    State(state): State<AppState>,
    id: IdParam,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let id = session_id(id)?;
    let feed = state
        .registry
        .subscribe(id)
        .await
        .ok_or(ApiError::NotFound(id))?;
    Ok(ws.on_upgrade(move |socket| forward_feed(socket, feed)))
}

/// GET /api/files/:id/events - SSE stream of tail events.
pub async fn watch_sse(
    State(state): State<AppState>,
    id: IdParam,
) -> Result<Sse<impl futures_core::Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let id = session_id(id)?;
    let feed = state
        .registry
        .subscribe(id)
        .await
        .ok_or(ApiError::NotFound(id))?;

    let stream = feed.into_stream().filter_map(|event| async move {
        let data = serde_json::to_string(&StreamMessage::from(&event)).ok()?;
        Some(Ok(Event::default().event(event.name()).data(data)))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// Send one text message per data event until the feed or the socket ends.
async fn forward_feed(mut socket: WebSocket, mut feed: TailFeed) {
    let id = feed.session_id();
    tracing::debug!(id, "Websocket viewer connected");

    loop {
        tokio::select! {
            event = feed.recv() => match event {
                Some(TailEvent::Data(chunk)) => {
                    let text = chunk.text().into_owned();
                    if let Err(e) = socket.send(Message::Text(text)).await {
                        tracing::debug!(id, error = %e, "Failed to write a message");
                        break;
                    }
                }
                Some(TailEvent::Truncated { previous_cursor, size }) => {
                    tracing::debug!(id, previous_cursor, size, "Viewer file truncated");
                }
                Some(TailEvent::Failed(failure)) => {
                    tracing::warn!(id, error = %failure, "Watching error");
                    let frame = CloseFrame {
                        code: close_code::ERROR,
                        reason: close_reason(&failure.message).into(),
                    };
                    let _ = socket.send(Message::Close(Some(frame))).await;
                    break;
                }
                None => {
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
            },

            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    let skipped = feed.skipped();
    if skipped > 0 {
        tracing::warn!(id, skipped, "Websocket viewer missed events while lagging");
    }
    tracing::debug!(id, skipped, "Websocket viewer disconnected");
}

fn close_reason(message: &str) -> String {
    if message.len() <= MAX_CLOSE_REASON {
        return message.to_string();
    }
    let mut end = MAX_CLOSE_REASON;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    message[..end].to_string()
}
