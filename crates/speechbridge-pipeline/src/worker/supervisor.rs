//! Start, stop, and inspect the detached live worker.

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use serde::Serialize;
use speechbridge_core::error::{Result, SpeechBridgeError};
use speechbridge_core::types::{Transcript, WorkerStatus};
use sysinfo::{Pid, ProcessesToUpdate, Signal, System};
use tracing::{debug, info, warn};

use super::pidfile::{PidContents, process_alive};
use super::state::WorkerPaths;

const START_TIMEOUT: Duration = Duration::from_secs(10);
const POLL: Duration = Duration::from_millis(200);

/// Snapshot reported to the CLI and dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct LiveStatus {
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<WorkerStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WorkerSupervisor {
    paths: WorkerPaths,
}

impl WorkerSupervisor {
    pub fn new(paths: WorkerPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &WorkerPaths {
        &self.paths
    }

    /// Live PID, cleaning up stale or unreadable PID files on the way.
    fn live_pid(&self) -> Result<Option<u32>> {
        let pid_file = self.paths.pid_file();
        match pid_file.read() {
            PidContents::Missing => Ok(None),
            PidContents::Pid(pid) if process_alive(pid) => Ok(Some(pid)),
            PidContents::Pid(pid) => {
                debug!(pid, "Removing stale PID file");
                pid_file.remove()?;
                Ok(None)
            }
            PidContents::Garbage => {
                debug!(path = %pid_file.path().display(), "Removing unreadable PID file");
                pid_file.remove()?;
                Ok(None)
            }
        }
    }

    pub async fn status(&self) -> Result<LiveStatus> {
        let pid = self.live_pid()?;
        let running = pid.is_some();
        Ok(LiveStatus {
            running,
            pid,
            status: self.paths.read_status().await,
            partial: if running {
                self.paths.read_partial().await
            } else {
                None
            },
        })
    }

    /// Spawn `exe args..` detached and wait for it to write its PID file.
    pub async fn start(&self, exe: &Path, args: &[String]) -> Result<u32> {
        if let Some(pid) = self.live_pid()? {
            return Err(SpeechBridgeError::Worker(format!(
                "Live worker already running (pid {pid})"
            )));
        }
        tokio::fs::create_dir_all(self.paths.state_dir()).await?;

        let mut command = std::process::Command::new(exe);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // Own process group, so a Ctrl-C in the launching terminal doesn't reach it
            command.process_group(0);
        }

        let mut child = tokio::process::Command::from(command).spawn().map_err(|e| {
            SpeechBridgeError::Worker(format!("Failed to spawn {}: {e}", exe.display()))
        })?;
        let child_pid = child.id();
        info!(exe = %exe.display(), pid = ?child_pid, "Spawned live worker");

        let deadline = Instant::now() + START_TIMEOUT;
        let pid_file = self.paths.pid_file();
        let pid = loop {
            if let PidContents::Pid(pid) = pid_file.read() {
                break pid;
            }
            if let Ok(Some(exit)) = child.try_wait() {
                let detail = self
                    .paths
                    .read_status()
                    .await
                    .and_then(|s| s.error)
                    .unwrap_or_else(|| exit.to_string());
                return Err(SpeechBridgeError::Worker(format!(
                    "Live worker exited during startup: {detail}"
                )));
            }
            if Instant::now() >= deadline {
                let _ = child.start_kill();
                return Err(SpeechBridgeError::Worker(format!(
                    "Live worker did not write its PID file within {}s",
                    START_TIMEOUT.as_secs()
                )));
            }
            tokio::time::sleep(POLL).await;
        };

        // Reap the child when it exits so it never lingers as a zombie
        tokio::spawn(async move {
            let _ = child.wait().await;
        });

        Ok(pid)
    }

    /// Ask the worker to stop by removing its PID file, then wait for it to exit.
    ///
    /// After `grace` the process is sent SIGTERM. Returns whether a worker was
    /// running.
    pub async fn stop(&self, grace: Duration) -> Result<bool> {
        let Some(pid) = self.live_pid()? else {
            return Ok(false);
        };
        self.paths.pid_file().remove()?;
        info!(pid, "Stop requested");

        if wait_for_exit(pid, grace).await {
            return Ok(true);
        }

        warn!(pid, "Live worker still running, sending SIGTERM");
        let mut sys = System::new();
        let sys_pid = Pid::from_u32(pid);
        sys.refresh_processes(ProcessesToUpdate::Some(&[sys_pid]), true);
        if let Some(process) = sys.process(sys_pid) {
            if process.kill_with(Signal::Term).is_none() {
                process.kill();
            }
        }

        if wait_for_exit(pid, Duration::from_secs(2)).await {
            Ok(true)
        } else {
            Err(SpeechBridgeError::Worker(format!(
                "Live worker (pid {pid}) did not exit"
            )))
        }
    }

    pub async fn transcripts(&self) -> Vec<Transcript> {
        self.paths.read_transcripts().await
    }

    pub async fn clear_transcripts(&self) -> Result<()> {
        self.paths.write_transcripts(&[]).await
    }
}

async fn wait_for_exit(pid: u32, within: Duration) -> bool {
    let deadline = Instant::now() + within;
    loop {
        if !process_alive(pid) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}
