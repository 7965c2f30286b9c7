//! Process inspection and signaling.
//!
//! Pids are reused by the OS, so a recorded pid being alive is not enough to
//! act on it. Before signaling, `stop` verifies the process is plausibly one
//! of ours by inspecting its name and command line. This is a best-effort
//! soft control (renamed binaries, containers and a missing process-info
//! filesystem all defeat it), not a hard guarantee.

use sysinfo::{Pid, ProcessRefreshKind, System, UpdateKind};

use crate::error::{CtxError, Result};

/// Substring expected in the process name or command line of a session
/// owner. Matches the binary name.
const IDENTITY_NEEDLE: &str = "ctxcap";

/// Result of a signal-0 liveness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Alive,
    Dead,
    /// The process exists but is behind a privilege boundary; it must not
    /// be treated as stale.
    Denied,
}

/// Cheap liveness probe via signal 0.
pub fn probe(pid: u32) -> Liveness {
    #[cfg(unix)]
    {
        if unsafe { libc::kill(pid as i32, 0) } == 0 {
            return Liveness::Alive;
        }
        match std::io::Error::last_os_error().raw_os_error() {
            Some(code) if code == libc::EPERM => Liveness::Denied,
            _ => Liveness::Dead,
        }
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
        Liveness::Dead
    }
}

/// Whether a process with this pid exists at all (signalable or not).
pub fn is_pid_alive(pid: u32) -> bool {
    probe(pid) != Liveness::Dead
}

/// Best-effort check that `pid` belongs to a ctxcap process.
///
/// Checks both the process name and the command line, since the binary may
/// run under an interpreter or wrapper.
pub fn verify_identity(pid: u32) -> bool {
    let mut sys = System::new();
    let sys_pid = Pid::from(pid as usize);
    sys.refresh_process_specifics(
        sys_pid,
        ProcessRefreshKind::new().with_cmd(UpdateKind::Always),
    );

    let Some(process) = sys.process(sys_pid) else {
        return false;
    };

    if process.name().to_lowercase().contains(IDENTITY_NEEDLE) {
        return true;
    }
    process
        .cmd()
        .iter()
        .any(|arg| arg.to_lowercase().contains(IDENTITY_NEEDLE))
}

/// Sends SIGTERM, requesting cooperative shutdown.
pub fn send_terminate(pid: u32) -> Result<()> {
    #[cfg(unix)]
    {
        send_signal(pid, libc::SIGTERM)
    }
    #[cfg(not(unix))]
    {
        Err(CtxError::ProcessLookup { pid })
    }
}

/// Sends SIGKILL. Last-resort escalation; bypasses the owner's cleanup
/// path, so the caller must clean up afterwards.
pub fn send_kill(pid: u32) -> Result<()> {
    #[cfg(unix)]
    {
        send_signal(pid, libc::SIGKILL)
    }
    #[cfg(not(unix))]
    {
        Err(CtxError::ProcessLookup { pid })
    }
}

#[cfg(unix)]
fn send_signal(pid: u32, signal: libc::c_int) -> Result<()> {
    if unsafe { libc::kill(pid as i32, signal) } == 0 {
        return Ok(());
    }
    let err = std::io::Error::last_os_error();
    match err.raw_os_error() {
        Some(code) if code == libc::ESRCH => Err(CtxError::ProcessLookup { pid }),
        Some(code) if code == libc::EPERM => Err(CtxError::PermissionDenied { pid }),
        _ => Err(err.into()),
    }
}
