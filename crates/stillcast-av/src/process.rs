//! Encoder process control.
//!
//! Encoders run detached from the request that started them: output streams
//! are discarded and only the files they write are observed. Stopping one is
//! always bounded: polite signal, grace period, then kill.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, Command};

use crate::{Error, Result};

/// How an encoder ended when asked to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Exited within the grace period after SIGTERM.
    Graceful,
    /// Ignored SIGTERM and was killed.
    Killed,
    /// Had already exited before we asked.
    AlreadyExited,
}

/// A running encoder.
#[derive(Debug)]
pub struct EncoderProcess {
    child: Child,
    program: String,
}

impl EncoderProcess {
    /// Spawn `program` with `args`, stdio discarded.
    ///
    /// The child is killed if the handle is dropped without being terminated.
    pub fn spawn(program: &Path, args: &[String]) -> Result<Self> {
        let name = program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| program.to_string_lossy().to_string());

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::spawn_failed(&name, e.to_string()))?;

        #[cfg(feature = "tracing")]
        tracing::info!(pid = ?child.id(), "{} process started", name);

        Ok(Self {
            child,
            program: name,
        })
    }

    /// OS process id, or `None` once the process has been reaped.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Program name, for logging.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Non-blocking exit check.
    pub fn try_exit_status(&mut self) -> Result<Option<ExitStatus>> {
        Ok(self.child.try_wait()?)
    }

    /// Stop the process: SIGTERM, wait up to `grace`, then SIGKILL.
    ///
    /// A process that is already gone counts as success.
    pub async fn terminate(&mut self, grace: Duration) -> Result<Termination> {
        if self.child.try_wait()?.is_some() {
            return Ok(Termination::AlreadyExited);
        }

        let Some(pid) = self.child.id() else {
            return Ok(Termination::AlreadyExited);
        };

        if !send_terminate(pid)? {
            // Gone between the check and the signal; reap it.
            let _ = self.child.wait().await;
            return Ok(Termination::AlreadyExited);
        }

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(_)) => Ok(Termination::Graceful),
            Ok(Err(e)) => Err(e.into()),
            Err(_elapsed) => match self.child.kill().await {
                Ok(()) => Ok(Termination::Killed),
                Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => {
                    Ok(Termination::AlreadyExited)
                }
                Err(e) => Err(e.into()),
            },
        }
    }
}

/// Send SIGTERM. Returns `false` if the process no longer exists.
#[cfg(unix)]
fn send_terminate(pid: u32) -> Result<bool> {
    use nix::errno::Errno;
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let pid = i32::try_from(pid).map_err(|_| Error::InvalidInput(format!("bad pid {pid}")))?;
    match kill(Pid::from_raw(pid), Signal::SIGTERM) {
        Ok(()) => Ok(true),
        Err(Errno::ESRCH) => Ok(false),
        Err(e) => Err(Error::Io(std::io::Error::from(e))),
    }
}

/// No polite signal off unix; the grace wait is skipped by reporting the
/// signal as delivered and letting the timeout path kill.
#[cfg(not(unix))]
fn send_terminate(_pid: u32) -> Result<bool> {
    Ok(true)
}
