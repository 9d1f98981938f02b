//! Lifecycle control endpoints.
//!
//! All four endpoints funnel into the supervisor, which serializes them; two
//! overlapping requests are resolved by waiting on its lock, never by
//! reporting a conflict to the caller.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Error;
use crate::server::AppContext;

#[derive(Debug, Serialize)]
pub struct LifecycleResponse {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_start_time: Option<DateTime<Utc>>,

    pub timestamp: DateTime<Utc>,
}

impl LifecycleResponse {
    fn ok(message: &str) -> Self {
        Self {
            success: true,
            message: Some(message.to_string()),
            error: None,
            new_start_time: None,
            timestamp: Utc::now(),
        }
    }

    fn failed(error: String) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error),
            new_start_time: None,
            timestamp: Utc::now(),
        }
    }
}

pub fn control_routes() -> Router<AppContext> {
    Router::new()
        .route("/start", post(start_stream))
        .route("/stop", post(stop_stream))
        .route("/restart", post(restart_stream))
        .route("/reset_clock", post(reset_clock))
}

async fn start_stream(State(ctx): State<AppContext>) -> Response {
    match ctx.supervisor.start().await {
        Ok(()) => Json(LifecycleResponse::ok("Live stream started successfully")).into_response(),
        Err(e) => lifecycle_error(e),
    }
}

async fn stop_stream(State(ctx): State<AppContext>) -> Response {
    match ctx.supervisor.stop().await {
        Ok(()) => Json(LifecycleResponse::ok("Live stream stopped successfully")).into_response(),
        Err(e) => lifecycle_error(e),
    }
}

async fn restart_stream(State(ctx): State<AppContext>) -> Response {
    match ctx.supervisor.restart().await {
        Ok(()) => Json(LifecycleResponse::ok("Stream restarted successfully")).into_response(),
        Err(e) => lifecycle_error(e),
    }
}

async fn reset_clock(State(ctx): State<AppContext>) -> Response {
    match ctx.supervisor.reset_clock().await {
        Ok(new_start) => {
            let mut body = LifecycleResponse::ok("Clock and stream restarted successfully");
            body.new_start_time = Some(new_start);
            Json(body).into_response()
        }
        Err(e) => lifecycle_error(e),
    }
}

fn lifecycle_error(e: Error) -> Response {
    let status =
        StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(LifecycleResponse::failed(e.to_string()))).into_response()
}
