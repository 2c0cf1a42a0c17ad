// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One supervised OS process: identity, lifecycle state machine, and the
//! per-process stdout/stderr/reaper threads.
//!
//! Every method here is called by the [`ProcessController`] while it
//! holds the registry lock; nothing in this module takes the lock itself.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use tracing::{debug, error, warn};
use warden_core::{AuthKey, ProcessState, RespawnPolicy};

use crate::controller::ProcessController;
use crate::sink::OutputSink;
use crate::spawn::LaunchSpec;

/// Token appended to the command line when a process is relaunched by the
/// respawn machinery, so the child can tell a restart from a first boot.
pub(crate) const RESTART_FLAG: &str = "--process-restarted";

/// What the reaper must do once exit bookkeeping is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExitDisposition {
    /// Shutdown was requested for this process; remove it from the registry.
    Remove,
    /// Unplanned crash; the respawn counter was incremented and the policy
    /// should be consulted (outside the lock) with this count.
    Respawn(u32),
    /// Planned stop; leave the process registered and down.
    Leave,
}

/// Immediate action for [`ManagedProcess::request_shutdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ShutdownAction {
    /// Already down; remove from the registry right away.
    RemoveNow,
    /// Stop signal delivered (or already stopping); the reaper removes it.
    AwaitExit,
}

pub(crate) struct ManagedProcess {
    name: String,
    key: AuthKey,
    command: Vec<String>,
    env: HashMap<String, String>,
    working_dir: PathBuf,
    privileged: bool,
    policy: RespawnPolicy,

    state: ProcessState,
    pid: Option<u32>,
    stdin: Option<Box<dyn Write + Send>>,
    start_time: Option<Instant>,
    respawn_count: u32,
    stop_requested: bool,
    shutdown: bool,
}

impl ManagedProcess {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        name: String,
        key: AuthKey,
        command: Vec<String>,
        env: HashMap<String, String>,
        working_dir: PathBuf,
        privileged: bool,
        policy: RespawnPolicy,
    ) -> Self {
        Self {
            name,
            key,
            command,
            env,
            working_dir,
            privileged,
            policy,
            state: ProcessState::Down,
            pid: None,
            stdin: None,
            start_time: None,
            respawn_count: 0,
            stop_requested: false,
            shutdown: false,
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn key(&self) -> &AuthKey {
        &self.key
    }

    pub(crate) fn is_privileged(&self) -> bool {
        self.privileged
    }

    pub(crate) fn state(&self) -> ProcessState {
        self.state
    }

    pub(crate) fn is_running(&self) -> bool {
        matches!(self.state, ProcessState::Started | ProcessState::Stopping)
    }

    pub(crate) fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub(crate) fn policy(&self) -> RespawnPolicy {
        self.policy
    }

    /// Operator-initiated start. Resets the respawn counter; no-op unless
    /// down. Returns true if the process came up.
    pub(crate) fn start(&mut self, ctl: &Arc<ProcessController>) -> bool {
        if self.state != ProcessState::Down {
            debug!(name = %self.name, state = %self.state, "start ignored, process not down");
            return false;
        }
        self.respawn_count = 0;
        self.do_start(ctl, false)
    }

    /// Automatic relaunch after a crash. No-op unless down.
    pub(crate) fn respawn(&mut self, ctl: &Arc<ProcessController>) -> bool {
        if self.state != ProcessState::Down {
            debug!(name = %self.name, state = %self.state, "respawn ignored, process not down");
            return false;
        }
        self.do_start(ctl, true)
    }

    /// Launch the OS process and wire up its drain and reaper threads.
    ///
    /// Launch failure is recoverable: it is logged and the process stays
    /// down. On success the state is Started and the registry will see a
    /// started notification from the caller.
    fn do_start(&mut self, ctl: &Arc<ProcessController>, restart: bool) -> bool {
        let mut command = self.command.clone();
        if restart {
            command.push(RESTART_FLAG.to_string());
        }
        let spec = LaunchSpec {
            command,
            env: self.env.clone(),
            working_dir: self.working_dir.clone(),
        };
        let mut child = match ctl.launcher().launch(&spec) {
            Ok(child) => child,
            Err(e) => {
                error!(name = %self.name, "failed to launch process: {}", e);
                return false;
            }
        };

        let pid = child.pid();
        if let Some(stdout) = child.take_stdout() {
            spawn_drain(&self.name, "out", stdout, ctl.stdout_sink().clone());
        }
        if let Some(stderr) = child.take_stderr() {
            spawn_drain(&self.name, "err", stderr, ctl.stderr_sink().clone());
        }

        let mut stdin = child.take_stdin();
        if let Some(ref mut pipe) = stdin {
            // The key is the first thing the child reads; it uses it to
            // authenticate its own protocol connection back to us.
            if let Err(e) = pipe.write_all(self.key.as_bytes()).and_then(|()| pipe.flush()) {
                warn!(name = %self.name, "failed to write auth key to stdin: {}", e);
            }
        }

        spawn_reaper(&self.name, child, Arc::clone(ctl));

        self.pid = Some(pid);
        self.stdin = stdin;
        self.state = ProcessState::Started;
        self.start_time = Some(Instant::now());
        debug!(name = %self.name, pid, restart, "process started");
        true
    }

    /// Operator-initiated stop: close stdin and wait for the child to
    /// exit on its own. No-op unless started.
    pub(crate) fn stop(&mut self) {
        if self.state != ProcessState::Started {
            debug!(name = %self.name, state = %self.state, "stop ignored, process not started");
            return;
        }
        self.stop_requested = true;
        // Dropping stdin closes the pipe; that is the only stop signal we
        // send. No forced kill.
        self.stdin = None;
        self.state = ProcessState::Stopping;
    }

    /// Shutdown request for this process (registry drain path). Idempotent.
    pub(crate) fn request_shutdown(&mut self) -> ShutdownAction {
        self.shutdown = true;
        match self.state {
            ProcessState::Down => ShutdownAction::RemoveNow,
            ProcessState::Started => {
                self.stop();
                ShutdownAction::AwaitExit
            }
            ProcessState::Stopping => ShutdownAction::AwaitExit,
        }
    }

    /// Record an OS-level exit. Transitions to Down, clears the handles,
    /// and reports uptime plus what the reaper should do next. The
    /// stop-requested flag is cleared in all cases.
    pub(crate) fn record_exit(&mut self) -> (u64, ExitDisposition) {
        let uptime_ms = self
            .start_time
            .take()
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0);
        self.state = ProcessState::Down;
        self.pid = None;
        self.stdin = None;
        let stop_requested = self.stop_requested;
        self.stop_requested = false;

        let disposition = if self.shutdown {
            ExitDisposition::Remove
        } else if !stop_requested {
            self.respawn_count += 1;
            ExitDisposition::Respawn(self.respawn_count)
        } else {
            ExitDisposition::Leave
        };
        (uptime_ms, disposition)
    }

    /// Pipe bytes to the child's stdin. Best-effort: failures are logged,
    /// never propagated, so a broken child cannot wedge the registry.
    pub(crate) fn send_stdin(&mut self, data: &[u8]) {
        let Some(pipe) = self.stdin.as_mut() else {
            debug!(name = %self.name, "stdin write ignored, process has no stdin");
            return;
        };
        if let Err(e) = pipe.write_all(data).and_then(|()| pipe.flush()) {
            warn!(name = %self.name, "stdin write failed: {}", e);
        }
    }

    /// Tell the child to re-attach to its manager at a new address.
    /// Best-effort, same as [`send_stdin`](Self::send_stdin).
    pub(crate) fn reconnect(&mut self, host: &str, port: u16) {
        let line = format!("reconnect {} {}\n", host, port);
        self.send_stdin(line.as_bytes());
    }
}

/// Drain one child output stream line by line into the shared sink,
/// prefixed with the process name. The thread ends when the stream
/// closes or fails; the source is dropped (closed) either way.
fn spawn_drain(name: &str, tag: &str, stream: Box<dyn Read + Send>, sink: OutputSink) {
    let name = name.to_string();
    let thread_name = format!("warden-{}-{}", tag, name);
    let spawned = thread::Builder::new().name(thread_name).spawn(move || {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    while matches!(buf.last(), Some(b'\n' | b'\r')) {
                        buf.pop();
                    }
                    // Children are not required to emit UTF-8; forward
                    // lossily rather than dropping the stream.
                    sink.line(&name, &String::from_utf8_lossy(&buf));
                }
                Err(e) => {
                    debug!(name = %name, "output stream closed: {}", e);
                    break;
                }
            }
        }
    });
    if let Err(e) = spawned {
        error!("failed to spawn drain thread: {}", e);
    }
}

/// Block until the child exits, then run the controller's exit handling.
fn spawn_reaper(name: &str, child: Box<dyn crate::spawn::ChildHandle>, ctl: Arc<ProcessController>) {
    let name = name.to_string();
    let thread_name = format!("warden-reap-{}", name);
    let spawned = thread::Builder::new().name(thread_name).spawn(move || {
        let code = match child.wait() {
            Ok(code) => code,
            Err(e) => {
                error!(name = %name, "wait for process failed: {}", e);
                -1
            }
        };
        ctl.on_process_exit(&name, code);
    });
    if let Err(e) = spawned {
        error!("failed to spawn reaper thread: {}", e);
    }
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
