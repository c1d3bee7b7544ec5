// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A single office worker: fixed port, supervised backend process.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use platen_core::{BackendKind, Config, ConvertError, Health, HealthBoard, RestartBudget};
use thiserror::Error;
use tokio::process::{Child, Command};
use uuid::Uuid;

use crate::readiness;
use crate::subprocess::{run_with_input, run_with_timeout, SubprocessError, KILL_TIMEOUT};

#[derive(Debug, Error)]
enum LaunchError {
    #[error("spawn failed: {0}")]
    Spawn(#[from] std::io::Error),
    #[error(transparent)]
    Readiness(#[from] readiness::ReadinessError),
}

/// One office worker. Created at startup, never destroyed; the backend
/// process behind it dies and respawns.
pub struct OfficeWorker {
    port: u16,
    pid_path: PathBuf,
    profile_dir: PathBuf,
    /// True iff the backend runs and no conversion is in flight.
    available: AtomicBool,
    /// Pid of the running backend process; 0 when none.
    backend_pid: AtomicU32,
    config: Arc<Config>,
    health: HealthBoard,
}

impl OfficeWorker {
    pub(crate) fn new(port: u16, config: Arc<Config>, health: HealthBoard) -> Arc<Self> {
        // The random token is chosen once per worker instance; restarts
        // of the backend reuse the same paths.
        let token = Uuid::new_v4().simple().to_string();
        let pid_path = config.tmp_dir.join(format!("office-{port}.pid"));
        let profile_dir = config.tmp_dir.join(format!("office-{port}-{token}"));
        Arc::new(Self {
            port,
            pid_path,
            profile_dir,
            available: AtomicBool::new(false),
            backend_pid: AtomicU32::new(0),
            config,
            health,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Compare-and-set claim. Winning the claim clears availability.
    pub(crate) fn try_claim(&self) -> bool {
        self.available
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn release(&self) {
        self.available.store(true, Ordering::Release);
    }

    /// Keep the backend alive until the restart budget is exhausted.
    pub(crate) async fn supervise(self: Arc<Self>) {
        let mut budget =
            RestartBudget::new(self.config.max_restarts, self.config.restart_window());
        loop {
            if let Err(err) = budget.try_begin(Instant::now()) {
                tracing::error!(port = self.port, error = %err, "office worker failed permanently");
                self.health.set_office_worker(self.port, Health::Unhealthy);
                return;
            }

            match self.start_backend().await {
                Ok(mut child) => {
                    budget.started(Instant::now());
                    self.backend_pid
                        .store(child.id().unwrap_or(0), Ordering::Release);
                    self.available.store(true, Ordering::Release);
                    self.health.set_office_worker(self.port, Health::Healthy);
                    tracing::info!(port = self.port, "office worker ready");

                    let status = child.wait().await;
                    budget.exited(Instant::now());
                    self.available.store(false, Ordering::Release);
                    self.health.set_office_worker(self.port, Health::Unhealthy);
                    self.backend_pid.store(0, Ordering::Release);
                    match status {
                        Ok(status) => tracing::warn!(
                            port = self.port,
                            status = %status,
                            "office worker exited"
                        ),
                        Err(err) => tracing::warn!(
                            port = self.port,
                            error = %err,
                            "office worker wait failed"
                        ),
                    }

                    self.reap_orphans().await;
                    self.cleanup_artifacts();
                }
                Err(err) => {
                    tracing::warn!(port = self.port, error = %err, "office worker spawn failed");
                }
            }

            tokio::time::sleep(self.config.restart_delay).await;
        }
    }

    /// Spawn the backend and wait for its pid file and profile dir.
    async fn start_backend(&self) -> Result<Child, LaunchError> {
        // Stale pid file from a previous run would satisfy the readiness
        // wait before the new backend is actually up.
        let _ = std::fs::remove_file(&self.pid_path);

        let mut cmd = Command::new(&self.config.unoserver_bin);
        cmd.arg("--port")
            .arg(self.port.to_string())
            .arg("--interface")
            .arg("127.0.0.1")
            .arg("--pidfile")
            .arg(&self.pid_path)
            .arg("--user-installation")
            .arg(&self.profile_dir)
            .arg("--conversion-timeout")
            .arg(self.config.pdf_render_timeout.as_secs().to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        let mut child = cmd.spawn()?;

        let ready = readiness::await_paths(
            &self.config.tmp_dir,
            &[&self.pid_path, &self.profile_dir],
            self.config.office_launch_timeout,
        )
        .await;

        match ready {
            Ok(()) => Ok(child),
            Err(err) => {
                let _ = child.kill().await;
                Err(err.into())
            }
        }
    }

    /// Run one conversion. The caller must hold the claim; availability
    /// is restored by the lease drop in all paths.
    pub(crate) async fn convert_claimed(&self, input: &[u8]) -> Result<Vec<u8>, ConvertError> {
        let mut cmd = Command::new(&self.config.unoconvert_bin);
        cmd.arg("--host")
            .arg("127.0.0.1")
            .arg("--port")
            .arg(self.port.to_string())
            .arg("--convert-to")
            .arg("pdf")
            .arg("-")
            .arg("-");

        let result = run_with_input(
            cmd,
            input,
            self.config.pdf_render_timeout,
            "office conversion",
        )
        .await;

        match result {
            Ok(output) if output.status.success() => Ok(output.stdout),
            Ok(output) => Err(ConvertError::Backend {
                backend: BackendKind::Office,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }),
            Err(err @ SubprocessError::Timeout { .. }) => {
                // A stuck backend would jam every later job routed to
                // this worker; kill it so the supervisor respawns.
                tracing::warn!(port = self.port, error = %err, "office conversion timed out");
                self.kill_backend().await;
                Err(ConvertError::Timeout {
                    backend: BackendKind::Office,
                })
            }
            Err(err) => Err(ConvertError::internal(err)),
        }
    }

    /// Force-kill the long-running backend process.
    async fn kill_backend(&self) {
        let pid = self.backend_pid.load(Ordering::Acquire);
        if pid == 0 {
            return;
        }
        let mut cmd = Command::new("kill");
        cmd.args(["-9", &pid.to_string()]);
        if let Err(err) = run_with_timeout(cmd, KILL_TIMEOUT, "kill office backend").await {
            tracing::warn!(port = self.port, error = %err, "failed to kill office backend");
        }
    }

    /// Kill children of the pid recorded in the pid file.
    ///
    /// Leaked backend children keep the worker's port bound and make
    /// every request routed to the respawned worker hang.
    async fn reap_orphans(&self) {
        let recorded = std::fs::read_to_string(&self.pid_path)
            .ok()
            .and_then(|raw| raw.trim().parse::<u32>().ok());
        let Some(pid) = recorded else {
            return;
        };
        let mut cmd = Command::new("pkill");
        cmd.args(["-9", "-P", &pid.to_string()]);
        if let Err(err) = run_with_timeout(cmd, KILL_TIMEOUT, "pkill office orphans").await {
            tracing::warn!(port = self.port, error = %err, "failed to kill orphaned children");
        }
    }

    /// Remove the pid file and user-profile directory, log-only on failure.
    fn cleanup_artifacts(&self) {
        if let Err(err) = std::fs::remove_file(&self.pid_path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(port = self.port, error = %err, "failed to remove pid file");
            }
        }
        if self.profile_dir.is_dir() {
            if let Err(err) = std::fs::remove_dir_all(&self.profile_dir) {
                tracing::warn!(port = self.port, error = %err, "failed to remove profile dir");
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn set_available_for_test(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    #[cfg(test)]
    pub(crate) fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    #[cfg(test)]
    pub(crate) fn paths_for_test(&self) -> (&PathBuf, &PathBuf) {
        (&self.pid_path, &self.profile_dir)
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
