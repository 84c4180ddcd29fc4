//! Worker process lifecycle
//!
//! Verification runs in a separate process so a crashing or hanging
//! solver interaction never takes the host down. The worker is this same
//! binary re-executed with the hidden `serve` subcommand; the
//! `VERIBOUND_WORKER` environment variable overrides the binary, which
//! tests use to exercise misbehaving workers.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use log::{debug, warn};

use super::TransportError;

/// Overrides the worker binary; defaults to the current executable
pub const WORKER_ENV: &str = "VERIBOUND_WORKER";

/// Handle to a spawned worker. Dropping it kills the process.
#[derive(Debug)]
pub struct WorkerProcess {
    child: Child,
}

impl WorkerProcess {
    pub fn launch(
        session: &str,
        idle_timeout: Duration,
        capacity: usize,
    ) -> Result<Self, TransportError> {
        let program = worker_binary()?;
        let child = worker_command(&program, session, idle_timeout, capacity)
            .spawn()
            .map_err(|e| TransportError::Launch(format!("{}: {e}", program.display())))?;
        debug!("launched worker pid {} for session {session}", child.id());
        Ok(Self { child })
    }

    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// True while the process has not exited. An idle worker exits on its
    /// own; the host relaunches on the next dispatch.
    pub fn is_alive(&mut self) -> bool {
        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                debug!("worker pid {} exited: {status}", self.child.id());
                false
            }
            Err(e) => {
                warn!("worker pid {} state unknown: {e}", self.child.id());
                false
            }
        }
    }
}

impl Drop for WorkerProcess {
    fn drop(&mut self) {
        if matches!(self.child.try_wait(), Ok(None)) {
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
    }
}

/// Both ends must agree on the frame capacity, so the host's configured
/// value is forwarded to the `serve` subcommand.
fn worker_command(
    program: &Path,
    session: &str,
    idle_timeout: Duration,
    capacity: usize,
) -> Command {
    let mut command = Command::new(program);
    command
        .arg("serve")
        .arg("--session")
        .arg(session)
        .arg("--idle-ms")
        .arg(idle_timeout.as_millis().to_string())
        .arg("--capacity")
        .arg(capacity.to_string())
        .stdin(Stdio::null());
    command
}

fn worker_binary() -> Result<PathBuf, TransportError> {
    let program = match std::env::var_os(WORKER_ENV) {
        Some(path) => PathBuf::from(path),
        None => std::env::current_exe()
            .map_err(|e| TransportError::Launch(format!("current executable unknown: {e}")))?,
    };
    if !program.is_file() {
        return Err(TransportError::Launch(format!(
            "worker binary {} does not exist",
            program.display()
        )));
    }
    Ok(program)
}
