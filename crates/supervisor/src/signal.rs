//! Per-platform process signalling
//!
//! On Unix graceful termination is SIGTERM and the forced kill is SIGKILL,
//! both delivered to the child's pid. Elsewhere there is no graceful
//! request, so both map to `Child::kill`.
//!
//! Callers must only signal children that have not been reaped yet: an
//! unreaped pid cannot be recycled by the OS.

use std::process::Child;

#[cfg(unix)]
fn send(pid: u32, signal: libc::c_int) {
    // SAFETY: kill(2) has no memory-safety preconditions.
    let rc = unsafe { libc::kill(pid as libc::pid_t, signal) };
    if rc != 0 {
        tracing::debug!(
            pid,
            signal,
            error = %std::io::Error::last_os_error(),
            "signal delivery failed"
        );
    }
}

/// Ask the child to shut down.
#[cfg(unix)]
pub fn terminate(child: &mut Child) {
    send(child.id(), libc::SIGTERM);
}

/// Kill the child outright.
#[cfg(unix)]
pub fn kill(child: &mut Child) {
    send(child.id(), libc::SIGKILL);
}

/// True while a process with this pid exists (zombies included).
#[cfg(unix)]
pub fn is_alive(pid: u32) -> bool {
    // SAFETY: signal 0 performs only the existence/permission check.
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

#[cfg(not(unix))]
pub fn terminate(child: &mut Child) {
    let _ = child.kill();
}

#[cfg(not(unix))]
pub fn kill(child: &mut Child) {
    let _ = child.kill();
}
