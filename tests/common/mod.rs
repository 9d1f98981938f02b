//! Shared test harness for integration tests.
//!
//! Builds the full production wiring (segment store, supervisor, router)
//! against a temp sandbox, with small `/bin/sh` scripts standing in for the
//! encoder. The [`TestHarness::with_server`] constructor starts Axum on a
//! random port for HTTP-level testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use patterncast::config::Config;
use patterncast::encoder::EncoderConfig;
use patterncast::server::{create_router, AppContext};
use patterncast::store::SegmentStore;
use patterncast::supervisor::{StreamSupervisor, SupervisorTimings};
use tempfile::TempDir;

/// Stub encoder that behaves like ffmpeg in HLS mode: takes the playlist
/// path from its final argument, writes a manifest plus two chunks, then
/// idles until terminated.
pub const WORKING_ENCODER: &str = r#"#!/bin/sh
for arg in "$@"; do last="$arg"; done
dir=$(dirname "$last")
mkdir -p "$dir"
printf 'fake-mpegts-data' > "$dir/segment_000.ts"
printf 'fake-mpegts-data' > "$dir/segment_001.ts"
{
  echo '#EXTM3U'
  echo '#EXT-X-VERSION:3'
  echo '#EXT-X-TARGETDURATION:2'
  echo '#EXTINF:2.0,'
  echo 'segment/segment_000.ts'
  echo '#EXTINF:2.0,'
  echo 'segment/segment_001.ts'
} > "$last"
sleep 60
"#;

/// Stub encoder that rejects its arguments the way ffmpeg does.
pub const FAILING_ENCODER: &str = r#"#!/bin/sh
echo 'Unrecognized option --bogus' >&2
exit 1
"#;

/// Stub encoder that emits a short byte stream on stdout and exits, for the
/// pass-through relay.
pub const PIPE_ENCODER: &str = r#"#!/bin/sh
printf 'fake-webm-stream'
"#;

/// Test harness wrapping a fully-constructed supervisor and config backed by
/// a temp directory sandbox.
pub struct TestHarness {
    pub supervisor: Arc<StreamSupervisor>,
    pub config: Config,
    pub output_dir: PathBuf,
    pub encoder_path: PathBuf,
    _tmp: TempDir,
}

impl TestHarness {
    /// Create a new harness whose encoder is the given shell script.
    pub fn with_encoder(script: &str) -> Self {
        let tmp = tempfile::tempdir().expect("failed to create temp dir");
        let encoder_path = write_script(tmp.path(), "encoder.sh", script);
        let output_dir = tmp.path().join("hls");

        let mut config = Config::default();
        config.stream.encoder = encoder_path.to_string_lossy().into_owned();
        config.stream.output_dir = output_dir.clone();
        config.stream.startup_grace_secs = 1;
        config.stream.stop_timeout_secs = 2;
        config.stream.restart_pause_ms = 50;

        let store = SegmentStore::new(output_dir.clone());
        let encoder = EncoderConfig::from_config(&config.stream, &config.overlay);
        let timings = SupervisorTimings::from_config(&config.stream);
        let supervisor = StreamSupervisor::new(encoder, store, timings);

        Self {
            supervisor,
            config,
            output_dir,
            encoder_path,
            _tmp: tmp,
        }
    }

    /// Start an Axum server on a random port and return the harness together
    /// with the bound socket address.
    pub async fn with_server(script: &str) -> (Self, SocketAddr) {
        let harness = Self::with_encoder(script);
        let ctx = AppContext {
            supervisor: Arc::clone(&harness.supervisor),
            config: Arc::new(harness.config.clone()),
        };
        let app = create_router(ctx);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (harness, addr)
    }

    /// Count live processes whose command line references this harness's
    /// encoder script. Linux-only, used to prove "exactly one encoder".
    pub fn count_encoder_processes(&self) -> usize {
        let needle = self.encoder_path.to_string_lossy().into_owned();
        let mut count = 0;
        let Ok(entries) = std::fs::read_dir("/proc") else {
            return 0;
        };
        for entry in entries.flatten() {
            let cmdline = entry.path().join("cmdline");
            if let Ok(data) = std::fs::read(&cmdline) {
                if String::from_utf8_lossy(&data).contains(&needle) {
                    count += 1;
                }
            }
        }
        count
    }
}

fn write_script(dir: &Path, name: &str, contents: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, contents).expect("failed to write stub encoder");
    let mut perms = std::fs::metadata(&path)
        .expect("failed to stat stub encoder")
        .permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("failed to mark stub encoder executable");
    path
}
