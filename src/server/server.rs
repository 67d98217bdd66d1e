//! HTTP server with axum router and graceful shutdown.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{
    add_file, delete_file, get_file, list_files, watch_sse, watch_ws, AppState,
};
use crate::config::ServerConfig;
use crate::watcher::WatchRegistry;

/// HTTP front end for a [`WatchRegistry`].
pub struct LogmonServer {
    /// Server configuration.
    config: ServerConfig,
    /// Application state shared across handlers.
    state: AppState,
    /// Triggers graceful shutdown.
    cancel: CancellationToken,
}

impl LogmonServer {
    /// Create a server with default configuration.
    #[must_use]
    pub fn new(registry: Arc<WatchRegistry>) -> Self {
        Self {
            config: ServerConfig::default(),
            state: AppState::new(registry),
            cancel: CancellationToken::new(),
        }
    }

    /// Set the server configuration (builder pattern).
    #[must_use]
    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Use an externally owned cancellation token for shutdown.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that stops the server when cancelled.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Get the configured address as a string.
    #[must_use]
    pub fn address(&self) -> String {
        self.config.address()
    }

    /// Build the axum router with all routes and middleware.
    pub fn build_router(&self) -> Router {
        let router = Router::new()
            .route("/api/files", get(list_files).post(add_file))
            .route("/api/files/:id", get(get_file).delete(delete_file))
            .route("/api/files/:id/ws", get(watch_ws))
            .route("/api/files/:id/events", get(watch_sse))
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http());

        if self.config.cors_permissive {
            router.layer(CorsLayer::permissive())
        } else {
            router
        }
    }

    /// Bind the configured address and serve until cancelled.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind or serve.
    pub async fn run(self) -> std::io::Result<()> {
        let addr = self.address();
        let listener = TcpListener::bind(&addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until cancelled.
    ///
    /// On shutdown every session is stopped so open streams end.
    ///
    /// # Errors
    ///
    /// Returns an error if serving fails.
    pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        let app = self.build_router();
        let cancel = self.cancel.clone();
        let registry = Arc::clone(&self.state.registry);

        tracing::info!(address = %listener.local_addr()?, "Listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                cancel.cancelled().await;
                tracing::info!("Server shutting down gracefully");
                registry.shutdown().await;
            })
            .await
    }
}
