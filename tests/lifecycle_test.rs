//! Integration tests for the stream lifecycle: start/stop/restart semantics,
//! idempotency, failure reporting, and process hygiene.

#![cfg(unix)]

mod common;

use common::{TestHarness, FAILING_ENCODER, WORKING_ENCODER};
use patterncast::supervisor::SessionState;

#[tokio::test]
async fn fresh_server_reports_inactive_then_starts() {
    let (harness, addr) = TestHarness::with_server(WORKING_ENCODER).await;
    let client = reqwest::Client::new();

    let health: serde_json::Value = client
        .get(format!("http://{addr}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["stream_active"], false);

    let resp = client
        .post(format!("http://{addr}/start"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);

    let health: serde_json::Value = client
        .get(format!("http://{addr}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["stream_active"], true);
    assert_eq!(health["hls_playlist_exists"], true);
    assert_eq!(health["hls_segment_count"], 2);

    harness.supervisor.stop().await.unwrap();
}

#[tokio::test]
async fn start_is_idempotent_while_active() {
    let harness = TestHarness::with_encoder(WORKING_ENCODER);

    harness.supervisor.start().await.unwrap();
    let first = harness.supervisor.status();
    assert_eq!(first.state, SessionState::Active);
    assert_eq!(harness.count_encoder_processes(), 1);

    // A second start neither relaunches nor rebases the clock.
    harness.supervisor.start().await.unwrap();
    let second = harness.supervisor.status();
    assert_eq!(second.state, SessionState::Active);
    assert_eq!(second.started_at, first.started_at);
    assert_eq!(harness.count_encoder_processes(), 1);

    harness.supervisor.stop().await.unwrap();
}

#[tokio::test]
async fn failed_start_reports_diagnostics() {
    let (harness, addr) = TestHarness::with_server(FAILING_ENCODER).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{addr}/start"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("Unrecognized option"));

    let health: serde_json::Value = client
        .get(format!("http://{addr}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["stream_active"], false);

    // The failure is also visible in the status snapshot, and nothing was
    // left behind on disk or in the process table.
    let status = harness.supervisor.status();
    assert_eq!(status.state, SessionState::Failed);
    assert!(status.last_error.is_some());
    assert!(!harness.output_dir.exists());
    assert_eq!(harness.count_encoder_processes(), 0);
}

#[tokio::test]
async fn stop_tears_down_process_and_directory() {
    let harness = TestHarness::with_encoder(WORKING_ENCODER);

    harness.supervisor.start().await.unwrap();
    assert!(harness.output_dir.exists());
    assert_eq!(harness.count_encoder_processes(), 1);

    harness.supervisor.stop().await.unwrap();

    assert_eq!(harness.supervisor.status().state, SessionState::Idle);
    assert!(!harness.output_dir.exists());
    assert_eq!(harness.count_encoder_processes(), 0);
}

#[tokio::test]
async fn stop_on_idle_is_successful_noop() {
    let (_harness, addr) = TestHarness::with_server(WORKING_ENCODER).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{addr}/stop"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn start_stop_manifest_is_gone() {
    let (_harness, addr) = TestHarness::with_server(WORKING_ENCODER).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{addr}/start"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .post(format!("http://{addr}/stop"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .get(format!("http://{addr}/playlist.m3u8"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn reset_clock_rebases_uptime() {
    let (harness, addr) = TestHarness::with_server(WORKING_ENCODER).await;
    let client = reqwest::Client::new();

    client
        .post(format!("http://{addr}/start"))
        .send()
        .await
        .unwrap();
    let before = harness.supervisor.status().started_at;

    tokio::time::sleep(std::time::Duration::from_millis(1200)).await;
    let uptime_before: f64 = client
        .get(format!("http://{addr}/health"))
        .send()
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap()["uptime_secs"]
        .as_f64()
        .unwrap();
    assert!(uptime_before >= 1.0);

    let resp = client
        .post(format!("http://{addr}/reset_clock"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert!(body.get("new_start_time").is_some());

    let after = harness.supervisor.status().started_at;
    assert!(after > before);

    let uptime_after: f64 = client
        .get(format!("http://{addr}/health"))
        .send()
        .await
        .unwrap()
        .json::<serde_json::Value>()
        .await
        .unwrap()["uptime_secs"]
        .as_f64()
        .unwrap();
    assert!(uptime_after < uptime_before);

    harness.supervisor.stop().await.unwrap();
}

#[tokio::test]
async fn concurrent_restarts_leave_one_encoder() {
    let (harness, addr) = TestHarness::with_server(WORKING_ENCODER).await;
    let client = reqwest::Client::new();

    client
        .post(format!("http://{addr}/start"))
        .send()
        .await
        .unwrap();

    let first = client.post(format!("http://{addr}/restart")).send();
    let second = client.post(format!("http://{addr}/restart")).send();
    let (first, second) = tokio::join!(first, second);

    let first: serde_json::Value = first.unwrap().json().await.unwrap();
    let second: serde_json::Value = second.unwrap().json().await.unwrap();
    assert_eq!(first["success"], true);
    assert_eq!(second["success"], true);

    assert_eq!(harness.supervisor.status().state, SessionState::Active);
    assert_eq!(harness.count_encoder_processes(), 1);

    harness.supervisor.stop().await.unwrap();
    assert_eq!(harness.count_encoder_processes(), 0);
}

#[tokio::test]
async fn stop_after_failed_start_returns_to_idle() {
    let harness = TestHarness::with_encoder(FAILING_ENCODER);

    assert!(harness.supervisor.start().await.is_err());
    assert_eq!(harness.supervisor.status().state, SessionState::Failed);

    harness.supervisor.stop().await.unwrap();
    assert_eq!(harness.supervisor.status().state, SessionState::Idle);
}

#[tokio::test]
async fn restart_from_idle_starts_the_stream() {
    let harness = TestHarness::with_encoder(WORKING_ENCODER);

    harness.supervisor.restart().await.unwrap();
    assert_eq!(harness.supervisor.status().state, SessionState::Active);
    assert_eq!(harness.count_encoder_processes(), 1);

    harness.supervisor.stop().await.unwrap();
}
