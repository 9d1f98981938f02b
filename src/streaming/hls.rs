//! HLS feed handlers.
//!
//! Serves the live manifest and its chunks. The serving path never takes the
//! supervisor's lifecycle lock: it checks the lock-free active flag, then
//! touches the filesystem. A chunk that a manifest snapshot referenced may
//! have been rotated away by the encoder a moment earlier; that read races to
//! a routine 404 rather than an error.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tokio_util::io::ReaderStream;

use crate::server::AppContext;

const MANIFEST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
const CHUNK_CONTENT_TYPE: &str = "video/mp2t";

/// Serve the live manifest.
///
/// An inactive session or a missing manifest both mean "the feed does not
/// exist right now" - an expected steady state answered with 404, never
/// logged as a fault.
pub async fn serve_manifest(State(ctx): State<AppContext>) -> Response {
    if !ctx.supervisor.is_active() {
        return feed_unavailable();
    }

    match ctx.supervisor.store().current_manifest() {
        Ok(bytes) => feed_response(MANIFEST_CONTENT_TYPE, Body::from(bytes)),
        Err(_) => feed_unavailable(),
    }
}

/// Serve one media chunk by filename.
pub async fn serve_chunk(State(ctx): State<AppContext>, Path(name): Path<String>) -> Response {
    if !is_valid_chunk_name(&name) {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "Invalid segment name"})),
        )
            .into_response();
    }

    if !ctx.supervisor.is_active() {
        return feed_unavailable();
    }

    let path = ctx.supervisor.store().chunk_path(&name);
    match tokio::fs::File::open(&path).await {
        Ok(file) => {
            let stream = ReaderStream::new(file);
            feed_response(content_type_for(&name), Body::from_stream(stream))
        }
        // Rotation may have deleted the chunk between the manifest read and
        // this fetch.
        Err(_) => feed_unavailable(),
    }
}

/// Content type derived from the filename extension.
fn content_type_for(name: &str) -> &'static str {
    if name.ends_with(".ts") {
        CHUNK_CONTENT_TYPE
    } else if name.ends_with(".m3u8") {
        MANIFEST_CONTENT_TYPE
    } else {
        "application/octet-stream"
    }
}

/// A chunk name must be a bare filename inside the store; anything path-like
/// is rejected before it reaches the filesystem.
fn is_valid_chunk_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('/') && !name.contains('\\') && !name.starts_with('.')
}

fn feed_response(content_type: &'static str, body: Body) -> Response {
    // The feed is live and meant for arbitrary external players: never
    // cached, always cross-origin readable.
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")
        .body(body)
        .unwrap()
}

fn feed_unavailable() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({"error": "No active stream available"})),
    )
        .into_response()
}
