//! Handle for one running encoder process.
//!
//! Owns the OS child from spawn to reap. Standard error is drained into a
//! bounded ring buffer so startup failures can be reported with the encoder's
//! own words instead of a bare exit code.

use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};

use crate::error::{Error, Result};

/// Maximum retained stderr lines.
const STDERR_RING_CAPACITY: usize = 200;

/// Outcome of the startup grace window.
#[derive(Debug)]
pub enum Startup {
    /// Still alive after the grace window; the encoder accepted its
    /// arguments and environment.
    Running,
    /// Exited within the window.
    Exited {
        code: Option<i32>,
        diagnostics: String,
    },
}

/// One supervised encoder invocation.
pub struct EncoderHandle {
    child: Child,
    pid: Option<u32>,
    stderr_ring: Arc<Mutex<VecDeque<String>>>,
}

impl EncoderHandle {
    /// Spawn the encoder. Returns immediately; reaching steady state is
    /// checked separately with [`EncoderHandle::await_stable_or_fail`].
    pub fn launch(program: &str, args: &[String]) -> Result<Self> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::EncoderStartup {
                message: format!("failed to spawn {program}: {e}"),
            })?;

        let stderr_ring = Arc::new(Mutex::new(VecDeque::new()));
        if let Some(stderr) = child.stderr.take() {
            let ring = Arc::clone(&stderr_ring);
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    let mut ring = ring.lock();
                    if ring.len() == STDERR_RING_CAPACITY {
                        ring.pop_front();
                    }
                    ring.push_back(line);
                }
            });
        }

        let pid = child.id();
        tracing::info!(pid = ?pid, program, "encoder launched");

        Ok(Self {
            child,
            pid,
            stderr_ring,
        })
    }

    /// OS process identifier recorded at launch.
    pub fn id(&self) -> Option<u32> {
        self.pid
    }

    /// Non-blocking liveness probe.
    pub fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Buffered stderr joined into one diagnostic string.
    pub fn diagnostics(&self) -> String {
        let ring = self.stderr_ring.lock();
        ring.iter().cloned().collect::<Vec<_>>().join("\n")
    }

    /// Wait up to `grace` for the process to prove it did not reject its
    /// arguments or environment. Distinguishes "failed immediately" from
    /// "running but not yet producing output".
    pub async fn await_stable_or_fail(&mut self, grace: Duration) -> Startup {
        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                // Let the stderr drain task catch up before reporting.
                tokio::time::sleep(Duration::from_millis(50)).await;
                Startup::Exited {
                    code: status.code(),
                    diagnostics: self.diagnostics(),
                }
            }
            Ok(Err(e)) => Startup::Exited {
                code: None,
                diagnostics: format!("wait on encoder failed: {e}"),
            },
            Err(_elapsed) => Startup::Running,
        }
    }

    /// Graceful termination: deliver SIGTERM, wait up to `timeout`, then
    /// hard-kill. Always releases the OS process. An already-exited process
    /// is logged, never an error.
    pub async fn terminate(&mut self, timeout: Duration) {
        match self.child.try_wait() {
            Ok(Some(status)) => {
                tracing::debug!(%status, "encoder already exited");
                return;
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("encoder liveness probe failed: {e}"),
        }

        self.send_term();

        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(Ok(status)) => {
                tracing::info!(%status, "encoder exited after SIGTERM");
            }
            Ok(Err(e)) => {
                tracing::warn!("wait after SIGTERM failed: {e}");
            }
            Err(_elapsed) => {
                tracing::warn!(
                    timeout_secs = timeout.as_secs(),
                    "encoder ignored SIGTERM, killing"
                );
                if let Err(e) = self.child.kill().await {
                    tracing::warn!("failed to kill encoder: {e}");
                }
            }
        }
    }

    #[cfg(unix)]
    fn send_term(&self) {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = self.pid {
            if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                tracing::debug!("SIGTERM delivery failed: {e}");
            }
        }
    }

    #[cfg(not(unix))]
    fn send_term(&self) {
        // No graceful signal available; terminate() escalates to kill() once
        // the timeout elapses.
    }
}
