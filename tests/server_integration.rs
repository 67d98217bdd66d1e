//! Integration tests for the HTTP API.

use std::io::Write;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use logmon::config::WatcherConfig;
use logmon::server::{AddFileResponse, ErrorResponse, ListResponse, LogmonServer, MessageResponse};
use logmon::watcher::WatchRegistry;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(5);

struct TestServer {
    addr: SocketAddr,
    cancel: CancellationToken,
    handle: JoinHandle<std::io::Result<()>>,
}

impl TestServer {
    async fn start() -> Self {
        let registry = Arc::new(WatchRegistry::new(WatcherConfig {
            poll_interval_ms: 10,
            ..WatcherConfig::default()
        }));
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind listener");
        let addr = listener.local_addr().unwrap();

        let server = LogmonServer::new(registry);
        let cancel = server.cancellation_token();
        let handle = tokio::spawn(server.serve(listener));

        Self {
            addr,
            cancel,
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    async fn connect_ws(&self, id: u64) -> WsClient {
        let url = format!("ws://{}/api/files/{id}/ws", self.addr);
        let (socket, _) = timeout(WAIT, connect_async(url))
            .await
            .expect("Websocket connect timed out")
            .expect("Failed to connect websocket");
        socket
    }

    async fn shutdown(self) {
        self.cancel.cancel();
        let result = timeout(WAIT, self.handle)
            .await
            .expect("Server did not shut down")
            .expect("Server task panicked");
        assert!(result.is_ok());
    }
}

type WsClient = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Next text or close message, skipping pings. `None` once the socket ends.
async fn next_ws_message(socket: &mut WsClient) -> Option<Message> {
    timeout(WAIT, async {
        loop {
            match socket.next().await {
                Some(Ok(message @ (Message::Text(_) | Message::Close(_)))) => {
                    return Some(message)
                }
                Some(Ok(_)) => {}
                Some(Err(_)) | None => return None,
            }
        }
    })
    .await
    .expect("Timed out waiting for a websocket message")
}

fn append(path: &Path, bytes: &[u8]) {
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(path)
        .expect("Failed to open file for append");
    file.write_all(bytes).expect("Failed to append");
}

async fn add(client: &reqwest::Client, server: &TestServer, path: &Path) -> AddFileResponse {
    let response = client
        .post(server.url("/api/files"))
        .json(&serde_json::json!({ "filepath": path }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    response.json().await.unwrap()
}

/// Add, list, describe and delete a watched file.
#[tokio::test]
async fn test_file_lifecycle() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    std::fs::write(&path, "hello\n").unwrap();
    let canonical = path.canonicalize().unwrap();

    let server = TestServer::start().await;
    let client = reqwest::Client::new();

    let added = add(&client, &server, &path).await;
    assert_eq!(added.id, 1);
    assert_eq!(added.size, 6);

    let list: ListResponse = client
        .get(server.url("/api/files"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list.data.len(), 1);
    assert_eq!(list.data.get(&1), Some(&canonical));

    let info: serde_json::Value = client
        .get(server.url("/api/files/1"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(info["id"], 1);
    assert_eq!(info["status"], "idle");
    assert_eq!(info["cursor"], 0);
    assert_eq!(info["subscribers"], 0);

    let response = client
        .delete(server.url("/api/files/1"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let message: MessageResponse = response.json().await.unwrap();
    assert_eq!(message.message, "deleted successfully");

    let response = client.get(server.url("/api/files/1")).send().await.unwrap();
    assert_eq!(response.status(), 404);

    let list: ListResponse = client
        .get(server.url("/api/files"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(list.data.is_empty());

    server.shutdown().await;
}

/// Submitted paths are validated before a session is created.
#[tokio::test]
async fn test_add_rejects_bad_paths() {
    let dir = TempDir::new().unwrap();
    let server = TestServer::start().await;
    let client = reqwest::Client::new();

    let cases = [
        (serde_json::json!({}), "filepath is missing"),
        (serde_json::json!({ "filepath": "" }), "filepath is missing"),
        (
            serde_json::json!({ "filepath": dir.path() }),
            "not a directory",
        ),
        (
            serde_json::json!({ "filepath": "/no/such/file" }),
            "/no/such/file",
        ),
    ];

    for (body, expected) in cases {
        let response = client
            .post(server.url("/api/files"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400, "body: {body}");
        let error: ErrorResponse = response.json().await.unwrap();
        assert!(
            error.error.contains(expected),
            "expected {expected:?} in {:?}",
            error.error
        );
    }

    server.shutdown().await;
}

/// Watching the same file twice is a conflict.
#[tokio::test]
async fn test_add_duplicate_conflicts() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    std::fs::write(&path, "").unwrap();

    let server = TestServer::start().await;
    let client = reqwest::Client::new();

    add(&client, &server, &path).await;
    let response = client
        .post(server.url("/api/files"))
        .json(&serde_json::json!({ "filepath": path }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);

    server.shutdown().await;
}

/// Id 0 is rejected; unknown ids delete successfully.
#[tokio::test]
async fn test_delete_ids() {
    let server = TestServer::start().await;
    let client = reqwest::Client::new();

    let response = client
        .delete(server.url("/api/files/0"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let error: ErrorResponse = response.json().await.unwrap();
    assert_eq!(error.error, "ID must be greater than 0");

    let response = client
        .delete(server.url("/api/files/42"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    server.shutdown().await;
}

/// Streams of unknown sessions are not found.
#[tokio::test]
async fn test_stream_unknown_session() {
    let server = TestServer::start().await;
    let client = reqwest::Client::new();

    let response = client
        .get(server.url("/api/files/7/events"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    server.shutdown().await;
}

/// Appended lines arrive as SSE data events; shutdown ends the stream.
#[tokio::test]
async fn test_sse_stream_delivers_appends() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    std::fs::write(&path, "").unwrap();

    let server = TestServer::start().await;
    let client = reqwest::Client::new();
    let added = add(&client, &server, &path).await;

    let mut response = client
        .get(server.url(&format!("/api/files/{}/events", added.id)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    append(&path, b"hello\n");

    let mut received = String::new();
    timeout(WAIT, async {
        while !received.contains("hello") {
            let chunk = response
                .chunk()
                .await
                .unwrap()
                .expect("Stream ended early");
            received.push_str(&String::from_utf8_lossy(&chunk));
        }
    })
    .await
    .expect("Timed out waiting for SSE data");

    assert!(received.contains("event: data"));
    assert!(received.contains(r#""type":"data""#));
    assert!(received.contains(r#""offset":0"#));
    assert!(received.contains(r#""text":"hello\n""#));

    let info: serde_json::Value = client
        .get(server.url(&format!("/api/files/{}", added.id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(info["status"], "watching");
    assert_eq!(info["cursor"], 6);
    assert_eq!(info["subscribers"], 1);

    server.cancel.cancel();
    let ended = timeout(WAIT, async {
        loop {
            match response.chunk().await {
                Ok(Some(_)) => {}
                Ok(None) | Err(_) => break,
            }
        }
    })
    .await;
    assert!(ended.is_ok(), "SSE stream did not end on shutdown");

    let result = timeout(WAIT, server.handle).await.unwrap().unwrap();
    assert!(result.is_ok());
}

/// Request bodies that are not JSON objects get the JSON error envelope.
#[tokio::test]
async fn test_add_undecodable_body() {
    let server = TestServer::start().await;
    let client = reqwest::Client::new();

    for body in ["not json", "", "[]"] {
        let response = client
            .post(server.url("/api/files"))
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400, "body: {body:?}");
        let error: ErrorResponse = response.json().await.unwrap();
        assert_eq!(error.error, "filepath is missing");
    }

    // No content type at all
    let response = client
        .post(server.url("/api/files"))
        .body("not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let error: ErrorResponse = response.json().await.unwrap();
    assert_eq!(error.error, "filepath is missing");

    server.shutdown().await;
}

/// A valid body is accepted without a JSON content type.
#[tokio::test]
async fn test_add_without_content_type() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    std::fs::write(&path, "abc").unwrap();

    let server = TestServer::start().await;
    let client = reqwest::Client::new();

    let body = serde_json::json!({ "filepath": path }).to_string();
    let response = client
        .post(server.url("/api/files"))
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let added: AddFileResponse = response.json().await.unwrap();
    assert_eq!(added.size, 3);

    server.shutdown().await;
}

/// Identifiers that are not numbers get the JSON error envelope.
#[tokio::test]
async fn test_malformed_id() {
    let server = TestServer::start().await;
    let client = reqwest::Client::new();

    let requests = [
        client.delete(server.url("/api/files/abc")),
        client.get(server.url("/api/files/abc")),
        client.get(server.url("/api/files/-1/events")),
    ];

    for request in requests {
        let response = request.send().await.unwrap();
        assert_eq!(response.status(), 400);
        let error: ErrorResponse = response.json().await.unwrap();
        assert!(
            error.error.starts_with("ID must be a positive integer"),
            "{:?}",
            error.error
        );
    }

    server.shutdown().await;
}

/// Each append arrives as one text frame.
#[tokio::test]
async fn test_websocket_delivers_appends() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    std::fs::write(&path, "").unwrap();

    let server = TestServer::start().await;
    let client = reqwest::Client::new();
    let added = add(&client, &server, &path).await;

    let mut socket = server.connect_ws(added.id).await;

    append(&path, b"hello\n");
    assert_eq!(
        next_ws_message(&mut socket).await,
        Some(Message::Text("hello\n".to_string()))
    );

    append(&path, b"world\n");
    assert_eq!(
        next_ws_message(&mut socket).await,
        Some(Message::Text("world\n".to_string()))
    );

    socket.close(None).await.unwrap();
    server.shutdown().await;
}

/// A watching error closes the socket with 1011 and the error message.
#[tokio::test]
async fn test_websocket_closes_with_error_on_failure() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    std::fs::write(&path, "").unwrap();

    let server = TestServer::start().await;
    let client = reqwest::Client::new();
    let added = add(&client, &server, &path).await;

    let mut socket = server.connect_ws(added.id).await;
    std::fs::remove_file(&path).unwrap();

    match next_ws_message(&mut socket).await {
        Some(Message::Close(Some(frame))) => {
            assert_eq!(frame.code, CloseCode::Error);
            assert!(frame.reason.contains("app.log"), "{:?}", frame.reason);
            assert!(frame.reason.len() <= 123);
        }
        other => panic!("Expected an error close frame, got {other:?}"),
    }

    let info: serde_json::Value = client
        .get(server.url(&format!("/api/files/{}", added.id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(info["status"], "failed");
    assert_eq!(info["failure"]["kind"], "open_failed");

    server.shutdown().await;
}

/// Deleting the watched file closes the socket normally.
#[tokio::test]
async fn test_websocket_closes_on_delete() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("app.log");
    std::fs::write(&path, "").unwrap();

    let server = TestServer::start().await;
    let client = reqwest::Client::new();
    let added = add(&client, &server, &path).await;

    let mut socket = server.connect_ws(added.id).await;

    let response = client
        .delete(server.url(&format!("/api/files/{}", added.id)))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    match next_ws_message(&mut socket).await {
        Some(Message::Close(frame)) => {
            assert!(frame.map_or(true, |f| f.code == CloseCode::Normal));
        }
        other => panic!("Expected a normal close frame, got {other:?}"),
    }

    append(&path, b"late\n");
    assert!(next_ws_message(&mut socket).await.is_none());

    server.shutdown().await;
}
