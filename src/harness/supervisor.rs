//! Lifecycle of the application under test
//!
//! The child's stdout and stderr are drained by background tasks that only
//! discard bytes, so a chatty target can never block on a full pipe. The
//! tasks share nothing with the harness; exit status is read from the child
//! itself.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncRead;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use super::report::ProcessExit;
use crate::common::{Error, Result};

/// How a stop request was satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The process had already exited on its own
    AlreadyExited(ProcessExit),
    /// The process exited within the grace period
    Graceful(ProcessExit),
    /// The grace period ran out and the process was killed
    Killed,
}

/// Starts and stops the target process
#[async_trait]
pub trait ProcessSupervisor: Send {
    /// Handle to a running process
    type Handle: Send;

    /// Launch `program` with `args`
    ///
    /// Launch failures are fatal to a run.
    async fn start(&mut self, program: &Path, args: &[String]) -> Result<Self::Handle>;

    /// Ask the process to terminate, killing it if it has not exited within
    /// `grace`
    async fn stop(&mut self, handle: &mut Self::Handle, grace: Duration) -> StopOutcome;

    /// Exit status if the process has exited, without waiting
    fn try_exit(&mut self, handle: &mut Self::Handle) -> Option<ProcessExit>;

    fn is_running(&mut self, handle: &mut Self::Handle) -> bool {
        self.try_exit(handle).is_none()
    }
}

/// A process spawned by [`ChildSupervisor`]
#[derive(Debug)]
pub struct ChildProcess {
    child: Child,
    program: PathBuf,
    drains: Vec<JoinHandle<()>>,
}

impl ChildProcess {
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Drop for ChildProcess {
    fn drop(&mut self) {
        for drain in &self.drains {
            drain.abort();
        }
    }
}

/// Supervises real OS processes
#[derive(Debug, Default, Clone)]
pub struct ChildSupervisor {
    working_dir: Option<PathBuf>,
}

impl ChildSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run children in `dir`
    pub fn with_working_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.working_dir = dir;
        self
    }

    /// Resolve bare command names through PATH
    fn resolve(program: &Path) -> Result<PathBuf> {
        if program.components().count() > 1 || program.is_absolute() {
            return Ok(program.to_path_buf());
        }
        which::which(program).map_err(|_| Error::ProgramNotFound(program.display().to_string()))
    }
}

#[async_trait]
impl ProcessSupervisor for ChildSupervisor {
    type Handle = ChildProcess;

    async fn start(&mut self, program: &Path, args: &[String]) -> Result<ChildProcess> {
        let resolved = Self::resolve(program)?;

        let mut cmd = Command::new(&resolved);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::launch(&resolved.display().to_string(), e))?;

        let mut drains = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            drains.push(spawn_drain(stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            drains.push(spawn_drain(stderr));
        }

        tracing::info!(
            program = %resolved.display(),
            pid = child.id().unwrap_or_default(),
            "Target started"
        );

        Ok(ChildProcess {
            child,
            program: resolved,
            drains,
        })
    }

    async fn stop(&mut self, handle: &mut ChildProcess, grace: Duration) -> StopOutcome {
        if let Some(exit) = self.try_exit(handle) {
            tracing::debug!(%exit, "Target already exited");
            return StopOutcome::AlreadyExited(exit);
        }

        request_termination(&mut handle.child);

        match tokio::time::timeout(grace, handle.child.wait()).await {
            Ok(Ok(status)) => {
                let exit = exit_of(status);
                tracing::info!(%exit, "Target stopped");
                StopOutcome::Graceful(exit)
            }
            Ok(Err(e)) => {
                tracing::warn!("Failed waiting for target: {}, killing it", e);
                kill(&mut handle.child).await
            }
            Err(_) => {
                tracing::warn!(
                    grace_ms = grace.as_millis() as u64,
                    "Target did not exit within grace period, killing it"
                );
                kill(&mut handle.child).await
            }
        }
    }

    fn try_exit(&mut self, handle: &mut ChildProcess) -> Option<ProcessExit> {
        match handle.child.try_wait() {
            Ok(Some(status)) => Some(exit_of(status)),
            Ok(None) => None,
            Err(e) => {
                tracing::debug!("Could not query target status: {}", e);
                None
            }
        }
    }
}

/// Discard everything the child writes to `stream`
fn spawn_drain<R>(mut stream: R) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = tokio::io::copy(&mut stream, &mut tokio::io::sink()).await {
            tracing::trace!("Output drain ended: {}", e);
        }
    })
}

/// Send SIGTERM on Unix; elsewhere there is no graceful request, so kill
fn request_termination(child: &mut Child) {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            // SAFETY: plain syscall on a pid we own and have not reaped yet
            let result = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
            if result == 0 {
                return;
            }
            tracing::debug!(pid, "SIGTERM failed, falling back to kill");
        }
    }
    if let Err(e) = child.start_kill() {
        tracing::warn!("Failed to kill target: {}", e);
    }
}

async fn kill(child: &mut Child) -> StopOutcome {
    if let Err(e) = child.kill().await {
        tracing::warn!("Failed to kill target: {}", e);
    }
    StopOutcome::Killed
}

fn exit_of(status: std::process::ExitStatus) -> ProcessExit {
    #[cfg(unix)]
    let signal = {
        use std::os::unix::process::ExitStatusExt;
        status.signal()
    };
    #[cfg(not(unix))]
    let signal = None;

    ProcessExit {
        code: status.code(),
        signal,
    }
}
