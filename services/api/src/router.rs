//! Axum Router Configuration
//!
//! The service exposes only the realtime surface: the per-call LLM WebSocket
//! and a liveness probe.

use crate::{state::AppState, ws::ws_handler};

use axum::{Router, routing::get};
use std::sync::Arc;

async fn health() -> &'static str {
    "ok"
}

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/llm-websocket/{call_id}", get(ws_handler))
        .with_state(app_state)
}
