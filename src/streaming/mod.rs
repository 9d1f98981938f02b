//! Live feed serving module.
//!
//! Provides the file-based HLS feed plus the pass-through pipe stream.
//!
//! # Routes
//!
//! HLS feed:
//! - `GET /playlist.m3u8` - Live manifest
//! - `GET /segment/{name}` - Media chunk
//!
//! Pass-through:
//! - `GET /stream` - Encoder stdout relayed straight to the response

mod direct;
mod hls;

pub use direct::stream_direct;
pub use hls::{serve_chunk, serve_manifest};

use axum::{routing::get, Router};

use crate::server::AppContext;

/// Create the live feed router.
pub fn feed_router() -> Router<AppContext> {
    Router::new()
        .route("/playlist.m3u8", get(serve_manifest))
        .route("/segment/:name", get(serve_chunk))
        .route("/stream", get(stream_direct))
}
