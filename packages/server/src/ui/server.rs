//! Server execution logic.

use std::sync::Arc;

use axum::{Router, routing::get};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{
    handler::{
        gaming_events, health_check, minigame_webhook, version, ws_chat_handler,
        ws_minigame_handler,
    },
    signal::shutdown_signal,
    state::AppState,
};

/// Session coordination server
///
/// Serves the chat and minigame websocket endpoints next to a small HTTP
/// API, over one shared [`AppState`].
///
/// # Example
///
/// ```ignore
/// let server = Server::new(state);
/// server.run("127.0.0.1".to_string(), 8000).await?;
/// ```
pub struct Server {
    state: Arc<AppState>,
}

impl Server {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Assemble the route table over the shared state.
    pub fn router(&self) -> Router {
        Router::new()
            // WebSocket endpoints
            .route("/ws/chat", get(ws_chat_handler))
            .route("/ws/minigame", get(ws_minigame_handler))
            // HTTP endpoints
            .route("/api/health", get(health_check))
            .route("/api/version", get(version))
            .route("/api/webhook/minigame", get(minigame_webhook))
            .route("/api/gaming/events", get(gaming_events))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// Run the server until Ctrl+C or SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot bind to the address or if
    /// serving fails.
    pub async fn run(self, host: String, port: u16) -> Result<(), Box<dyn std::error::Error>> {
        let app = self.router();

        let bind_addr = format!("{}:{}", host, port);
        let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

        tracing::info!("Session server listening on {}", listener.local_addr()?);
        tracing::info!("Chat endpoint:     ws://{}/ws/chat", bind_addr);
        tracing::info!("Minigame endpoint: ws://{}/ws/minigame", bind_addr);
        tracing::info!("Press Ctrl+C to shutdown gracefully");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");

        Ok(())
    }
}
