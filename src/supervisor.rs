//! Stream lifecycle supervision.
//!
//! Exactly one live stream session exists per server. Every lifecycle
//! transition (start, stop, restart, clock reset) is serialized through a
//! single async mutex that also owns the running [`EncoderHandle`], so at most
//! one encoder process is ever alive. Status reads and the media serving path
//! never touch that mutex: they read a snapshot behind a cheap `RwLock` and a
//! lock-free active flag, so a slow stop can never block a health probe or a
//! chunk request.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::config::StreamConfig;
use crate::encoder::{tools, EncoderConfig, EncoderHandle, Startup};
use crate::error::{Error, Result};
use crate::store::SegmentStore;

/// Lifecycle state of the stream session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Starting,
    Active,
    Stopping,
    Failed,
}

/// Point-in-time view of the session, readable without waiting on an
/// in-flight lifecycle operation.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub state: SessionState,
    pub started_at: DateTime<Utc>,
    pub last_error: Option<String>,
}

/// Read-only health projection computed on demand. Probe failures degrade
/// individual fields instead of erroring.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub encoder_available: bool,
    pub stream_active: bool,
    pub hls_playlist_exists: bool,
    /// Chunk files on disk; -1 when the directory cannot be read.
    pub hls_segment_count: i64,
    pub uptime_secs: f64,
}

/// Timing bounds for lifecycle operations.
#[derive(Debug, Clone)]
pub struct SupervisorTimings {
    pub startup_grace: Duration,
    pub stop_timeout: Duration,
    pub restart_pause: Duration,
}

impl SupervisorTimings {
    pub fn from_config(stream: &StreamConfig) -> Self {
        Self {
            startup_grace: Duration::from_secs(stream.startup_grace_secs),
            stop_timeout: Duration::from_secs(stream.stop_timeout_secs),
            restart_pause: Duration::from_millis(stream.restart_pause_ms),
        }
    }
}

/// Owner of the one stream session and its encoder process.
pub struct StreamSupervisor {
    encoder: EncoderConfig,
    store: SegmentStore,
    timings: SupervisorTimings,
    /// Owns the running handle; holding this lock is what serializes
    /// lifecycle operations.
    lifecycle: Mutex<Option<EncoderHandle>>,
    /// Snapshot for `status()`; written only while the lifecycle lock is
    /// held.
    status: RwLock<SessionStatus>,
    /// Lock-free flag checked by the serving path.
    active: AtomicBool,
}

impl StreamSupervisor {
    pub fn new(
        encoder: EncoderConfig,
        store: SegmentStore,
        timings: SupervisorTimings,
    ) -> Arc<Self> {
        Arc::new(Self {
            encoder,
            store,
            timings,
            lifecycle: Mutex::new(None),
            status: RwLock::new(SessionStatus {
                state: SessionState::Idle,
                started_at: Utc::now(),
                last_error: None,
            }),
            active: AtomicBool::new(false),
        })
    }

    pub fn store(&self) -> &SegmentStore {
        &self.store
    }

    /// Whether the feed is currently servable. Never blocks.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Snapshot of the session without waiting on lifecycle operations.
    pub fn status(&self) -> SessionStatus {
        self.status.read().clone()
    }

    /// Start the stream. Idempotent while the encoder is alive; otherwise
    /// resets the store, launches the encoder, and waits out the startup
    /// grace window before flipping to `Active`.
    pub async fn start(&self) -> Result<()> {
        let mut slot = self.lifecycle.lock().await;
        self.start_locked(&mut slot).await
    }

    /// Stop the stream: terminate the encoder (bounded), then tear down the
    /// segment directory. Idempotent on an idle session.
    pub async fn stop(&self) -> Result<()> {
        let mut slot = self.lifecycle.lock().await;
        self.stop_locked(&mut slot).await
    }

    /// Stop followed by start under one lock acquisition, with a brief pause
    /// so OS resources can release in between.
    pub async fn restart(&self) -> Result<()> {
        let mut slot = self.lifecycle.lock().await;
        self.stop_locked(&mut slot).await?;
        tokio::time::sleep(self.timings.restart_pause).await;
        self.start_locked(&mut slot).await
    }

    /// Rebase the visible uptime clock to now, restarting the encoder if one
    /// is running so its rendered timer overlay matches the reported uptime.
    /// Returns the new clock origin.
    pub async fn reset_clock(&self) -> Result<DateTime<Utc>> {
        let mut slot = self.lifecycle.lock().await;

        if slot.is_some() {
            self.stop_locked(&mut slot).await?;
            tokio::time::sleep(self.timings.restart_pause).await;
            self.start_locked(&mut slot).await?;
        }

        let mut status = self.status.write();
        status.started_at = Utc::now();
        Ok(status.started_at)
    }

    /// Compute a health snapshot. Never fails: probe errors degrade the
    /// affected field.
    pub fn health(&self) -> HealthSnapshot {
        let status = self.status();
        let active = self.is_active();
        let playlist_exists = active && self.store.manifest_exists();
        let segment_count = if active {
            match self.store.count_chunks() {
                Ok(n) => n as i64,
                Err(_) => -1,
            }
        } else {
            0
        };

        HealthSnapshot {
            status: "healthy",
            timestamp: Utc::now(),
            encoder_available: tools::encoder_available(&self.encoder.program),
            stream_active: active,
            hls_playlist_exists: playlist_exists,
            hls_segment_count: segment_count,
            uptime_secs: (Utc::now() - status.started_at).num_milliseconds() as f64 / 1000.0,
        }
    }

    async fn start_locked(&self, slot: &mut Option<EncoderHandle>) -> Result<()> {
        if let Some(handle) = slot.as_mut() {
            if handle.is_alive() {
                // Idempotent: nothing to relaunch, clock untouched.
                tracing::debug!("start requested while already active");
                return Ok(());
            }
            // The encoder died behind our back; clear the slot and relaunch.
            tracing::warn!("previous encoder exited unexpectedly, relaunching");
            self.active.store(false, Ordering::Release);
            *slot = None;
        }

        self.set_state(SessionState::Starting);

        if let Err(e) = self.store.reset() {
            self.record_failure(e.to_string());
            return Err(e);
        }

        let args = self.encoder.hls_args(&self.store);
        let mut handle = match EncoderHandle::launch(&self.encoder.program, &args) {
            Ok(handle) => handle,
            Err(e) => {
                self.remove_store_best_effort();
                self.record_failure(e.to_string());
                return Err(e);
            }
        };

        match handle.await_stable_or_fail(self.timings.startup_grace).await {
            Startup::Running => {
                {
                    let mut status = self.status.write();
                    status.state = SessionState::Active;
                    status.started_at = Utc::now();
                    status.last_error = None;
                }
                self.active.store(true, Ordering::Release);
                tracing::info!(pid = ?handle.id(), "stream active");
                *slot = Some(handle);
                Ok(())
            }
            Startup::Exited { code, diagnostics } => {
                // The process is already gone; only the directory needs
                // cleaning up.
                self.remove_store_best_effort();
                let exit = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
                let message = match diagnostics.trim() {
                    "" => format!("encoder exited with status {exit} during startup"),
                    diag => format!("encoder exited with status {exit} during startup: {diag}"),
                };
                self.record_failure(message.clone());
                Err(Error::EncoderStartup { message })
            }
        }
    }

    async fn stop_locked(&self, slot: &mut Option<EncoderHandle>) -> Result<()> {
        let Some(mut handle) = slot.take() else {
            // Idempotent no-op; a Failed session settles back to Idle.
            self.set_state(SessionState::Idle);
            return Ok(());
        };

        self.set_state(SessionState::Stopping);
        self.active.store(false, Ordering::Release);

        // Process teardown and file cleanup are independent: a failure to
        // delete files must not leave a live encoder, and vice versa.
        handle.terminate(self.timings.stop_timeout).await;

        if let Err(e) = self.store.remove() {
            tracing::warn!("failed to remove segment directory: {e}");
        }

        self.set_state(SessionState::Idle);
        Ok(())
    }

    fn set_state(&self, state: SessionState) {
        self.status.write().state = state;
    }

    fn record_failure(&self, message: String) {
        tracing::error!("stream start failed: {message}");
        let mut status = self.status.write();
        status.state = SessionState::Failed;
        status.last_error = Some(message);
    }

    fn remove_store_best_effort(&self) {
        if let Err(e) = self.store.remove() {
            tracing::warn!("failed to remove segment directory: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn idle_supervisor() -> Arc<StreamSupervisor> {
        let config = Config::default();
        let dir = std::env::temp_dir().join(format!(
            "patterncast-supervisor-test-{}",
            std::process::id()
        ));
        StreamSupervisor::new(
            EncoderConfig::from_config(&config.stream, &config.overlay),
            SegmentStore::new(dir),
            SupervisorTimings::from_config(&config.stream),
        )
    }

    #[tokio::test]
    async fn fresh_session_is_idle() {
        let supervisor = idle_supervisor();
        let status = supervisor.status();
        assert_eq!(status.state, SessionState::Idle);
        assert!(status.last_error.is_none());
        assert!(!supervisor.is_active());
    }

    #[tokio::test]
    async fn stop_on_idle_is_noop() {
        let supervisor = idle_supervisor();
        supervisor.stop().await.unwrap();
        supervisor.stop().await.unwrap();
        assert_eq!(supervisor.status().state, SessionState::Idle);
    }

    #[tokio::test]
    async fn reset_clock_on_idle_rebases_clock() {
        let supervisor = idle_supervisor();
        let before = supervisor.status().started_at;
        tokio::time::sleep(Duration::from_millis(20)).await;
        let rebased = supervisor.reset_clock().await.unwrap();
        assert!(rebased > before);
        assert_eq!(supervisor.status().started_at, rebased);
    }

    #[tokio::test]
    async fn health_on_idle_session() {
        let supervisor = idle_supervisor();
        let health = supervisor.health();
        assert!(!health.stream_active);
        assert!(!health.hls_playlist_exists);
        assert_eq!(health.hls_segment_count, 0);
        assert!(health.uptime_secs >= 0.0);
    }
}
