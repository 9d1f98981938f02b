//! Pass-through pipe streaming.
//!
//! Alternate transport to the file-based HLS feed: each request gets its own
//! encoder child muxing to stdout, and the pipe is relayed straight into the
//! response body. There is no manifest, no rotation, and no shared session -
//! the child lives exactly as long as its response, and is killed when the
//! client goes away.

use std::process::Stdio;

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio_stream::wrappers::ReceiverStream;

use crate::encoder::EncoderConfig;
use crate::server::AppContext;

/// Pipe read size; one channel slot per read keeps backpressure on the
/// encoder instead of buffering unbounded output.
const RELAY_CHUNK_BYTES: usize = 8192;

/// Relay a per-request encoder's stdout to the response.
pub async fn stream_direct(State(ctx): State<AppContext>) -> Response {
    let direct = &ctx.config.direct;
    if !direct.enabled {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "Direct streaming is disabled"})),
        )
            .into_response();
    }

    let encoder = EncoderConfig::from_config(&ctx.config.stream, &ctx.config.overlay);
    let args = encoder.direct_args(direct);

    let mut child = match Command::new(&encoder.program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            tracing::error!("failed to spawn pass-through encoder: {e}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "Failed to start stream"})),
            )
                .into_response();
        }
    };

    let Some(mut stdout) = child.stdout.take() else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": "Failed to start stream"})),
        )
            .into_response();
    };

    // The relay task owns the child: when the client disconnects the
    // receiver drops, the send fails, the task returns, and kill_on_drop
    // reaps the encoder.
    let (tx, rx) = tokio::sync::mpsc::channel::<std::io::Result<Bytes>>(1);
    tokio::spawn(async move {
        loop {
            let mut buf = vec![0u8; RELAY_CHUNK_BYTES];
            match stdout.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => {
                    buf.truncate(n);
                    if tx.send(Ok(Bytes::from(buf))).await.is_err() {
                        tracing::debug!("pass-through client disconnected");
                        break;
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    break;
                }
            }
        }
        // Whether EOF or disconnect ended the relay, the child has no
        // audience left; make sure it is gone before reaping.
        if let Err(e) = child.start_kill() {
            tracing::debug!("pass-through encoder already exited: {e}");
        }
        match child.wait().await {
            Ok(status) => tracing::debug!(%status, "pass-through encoder exited"),
            Err(e) => tracing::warn!("wait on pass-through encoder failed: {e}"),
        }
    });

    let body = Body::from_stream(ReceiverStream::new(rx));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, container_content_type(&direct.container))
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")
        .body(body)
        .unwrap()
}

fn container_content_type(container: &str) -> &'static str {
    match container {
        "webm" => "video/webm",
        "matroska" => "video/x-matroska",
        "mp4" => "video/mp4",
        "mpegts" => "video/mp2t",
        _ => "application/octet-stream",
    }
}
