// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OS-specific process utilities.
//!
//! Not part of the lifecycle contract: the controller never force-kills
//! a managed child. These helpers exist for operational tooling around
//! the daemon (and are stubbed on platforms without signal support).

use std::io;

/// Resolve the pid of a registered process by name.
pub fn resolve_pid(controller: &crate::ProcessController, name: &str) -> Option<u32> {
    controller.process_pid(name)
}

/// Send SIGKILL to a pid. Unix only; elsewhere this reports unsupported.
#[cfg(unix)]
pub fn kill_process(pid: u32) -> io::Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let pid = i32::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
    kill(Pid::from_raw(pid), Signal::SIGKILL).map_err(io::Error::from)
}

#[cfg(not(unix))]
pub fn kill_process(_pid: u32) -> io::Result<()> {
    Err(io::Error::new(io::ErrorKind::Unsupported, "kill not supported on this platform"))
}

#[cfg(test)]
#[path = "os_tests.rs"]
mod tests;
