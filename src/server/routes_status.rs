//! Health and stream metadata endpoints.
//!
//! These are snapshot reads: they never wait on an in-flight lifecycle
//! operation and never fail - probe errors degrade individual fields.

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use chrono::Utc;

use crate::server::AppContext;

pub fn status_routes() -> Router<AppContext> {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(session_status))
        .route("/stream_info", get(stream_info))
}

async fn health(State(ctx): State<AppContext>) -> impl IntoResponse {
    Json(ctx.supervisor.health())
}

async fn session_status(State(ctx): State<AppContext>) -> impl IntoResponse {
    Json(ctx.supervisor.status())
}

/// Stream URLs and feed state for external players.
async fn stream_info(State(ctx): State<AppContext>) -> impl IntoResponse {
    let health = ctx.supervisor.health();
    let base = ctx.config.server.public_base_url();

    Json(serde_json::json!({
        "stream_active": health.stream_active,
        "playlist_exists": health.hls_playlist_exists,
        "segment_count": health.hls_segment_count,
        "stream_urls": {
            "playlist_url": format!("{base}/playlist.m3u8"),
            "direct_url": format!("{base}/stream"),
        },
        "timestamp": Utc::now(),
    }))
}
