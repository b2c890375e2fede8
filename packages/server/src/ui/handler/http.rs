//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};
use serde_json::{Value, json};

use crate::{hub::MINIGAME_GROUP, ui::state::AppState};

/// Health check endpoint
pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Build and environment info
pub async fn version(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "api": env!("CARGO_PKG_VERSION"),
        "env": state.config.environment,
        "desc": "Pavilion session server",
    }))
}

/// Webhook for external services: tells every minigame listener to refetch.
pub async fn minigame_webhook(State(state): State<Arc<AppState>>) -> StatusCode {
    if let Err(e) = state
        .hub
        .broadcast(MINIGAME_GROUP, &json!({ "info": "update" }))
        .await
    {
        tracing::error!("Failed to push webhook update: {}", e);
    }
    StatusCode::OK
}

/// Upcoming-round summary in the event feed shape.
pub async fn gaming_events(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(state.scheduler.latest_round().await.to_event_payload())
}
