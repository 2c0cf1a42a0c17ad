// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The process registry: the single authority over managed processes.
//!
//! One coarse mutex guards the whole registry (process table, auth-key
//! index, connection set, shutdown flag); one condvar signals removals
//! and shutdown so drain waits and pending respawns can wake. Any
//! operation that spawns an OS process holds the lock for the duration.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info, trace, warn};
use warden_core::{exit_codes, AuthKey, ProcessEvent, ProcessState, RespawnPolicy};
use warden_wire::{encode_event, MessageConnection};

use crate::process::{ExitDisposition, ManagedProcess, ShutdownAction};
use crate::sink::OutputSink;
use crate::spawn::Launcher;

/// How the controller terminates its own OS process. The reserved exit
/// codes from the privileged process funnel through this so tests can
/// observe the code instead of dying.
pub trait ExitHook: Send + Sync {
    fn exit(&self, code: i32);
}

/// The real hook: `std::process::exit`.
pub struct SystemExit;

impl ExitHook for SystemExit {
    fn exit(&self, code: i32) {
        std::process::exit(code);
    }
}

struct Registry {
    /// Primary view, keyed by process name.
    procs: HashMap<String, ManagedProcess>,
    /// Secondary view for connection authentication. Always in sync with
    /// `procs`: same membership, identical keys.
    by_key: HashMap<AuthKey, String>,
    /// Authenticated connections receiving lifecycle broadcasts. A write
    /// failure drops the connection from this set.
    connections: Vec<Arc<dyn MessageConnection>>,
    /// Once set, no process may be added or started and the registry is
    /// draining.
    shutdown: bool,
}

/// Work to do after the registry lock is released.
enum AfterExit {
    Nothing,
    /// Full controller shutdown then process exit with this code.
    Exit(i32),
    /// Consult the respawn policy for the n-th crash.
    Respawn { policy: RespawnPolicy, count: u32 },
}

pub struct ProcessController {
    inner: Mutex<Registry>,
    cond: Condvar,
    launcher: Box<dyn Launcher>,
    stdout_sink: OutputSink,
    stderr_sink: OutputSink,
    exit_hook: Box<dyn ExitHook>,
}

impl ProcessController {
    pub fn new(
        launcher: Box<dyn Launcher>,
        stdout_sink: OutputSink,
        stderr_sink: OutputSink,
        exit_hook: Box<dyn ExitHook>,
    ) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Registry {
                procs: HashMap::new(),
                by_key: HashMap::new(),
                connections: Vec::new(),
                shutdown: false,
            }),
            cond: Condvar::new(),
            launcher,
            stdout_sink,
            stderr_sink,
            exit_hook,
        })
    }

    pub(crate) fn launcher(&self) -> &dyn Launcher {
        self.launcher.as_ref()
    }

    pub(crate) fn stdout_sink(&self) -> &OutputSink {
        &self.stdout_sink
    }

    pub(crate) fn stderr_sink(&self) -> &OutputSink {
        &self.stderr_sink
    }

    /// Register a new managed process and broadcast PROCESS_ADDED.
    ///
    /// Returns the freshly generated auth key, or `None` when the request
    /// was ignored: shutdown in progress, invalid command, duplicate
    /// name, or a second privileged process. All of these are benign and
    /// only logged.
    pub fn add_process(
        &self,
        name: &str,
        command: Vec<String>,
        env: HashMap<String, String>,
        working_dir: PathBuf,
        privileged: bool,
        policy: RespawnPolicy,
    ) -> Option<AuthKey> {
        let mut inner = self.inner.lock();
        if inner.shutdown {
            warn!(name, "ignoring add request, shutdown in progress");
            return None;
        }
        if command.is_empty() || command.iter().any(|c| c.is_empty()) {
            warn!(name, "ignoring add request, command has empty elements");
            return None;
        }
        if inner.procs.contains_key(name) {
            warn!(name, "ignoring add request, process already exists");
            return None;
        }
        if privileged && inner.procs.values().any(ManagedProcess::is_privileged) {
            warn!(name, "ignoring add request, a privileged process already exists");
            return None;
        }
        let key = AuthKey::generate();
        let proc = ManagedProcess::new(
            name.to_string(),
            key,
            command,
            env,
            working_dir,
            privileged,
            policy,
        );
        inner.by_key.insert(key, name.to_string());
        inner.procs.insert(name.to_string(), proc);
        info!(name, privileged, "process added");
        Self::broadcast_locked(&mut inner, &ProcessEvent::Added { name: name.to_string() });
        Some(key)
    }

    /// Start a process by name. Ignored during shutdown or for unknown
    /// names; a no-op if the process is already up.
    pub fn start_process(self: &Arc<Self>, name: &str) {
        let mut inner = self.inner.lock();
        if inner.shutdown {
            debug!(name, "ignoring start request, shutdown in progress");
            return;
        }
        let Some(proc) = inner.procs.get_mut(name) else {
            warn!(name, "ignoring start request for unknown process");
            return;
        };
        if proc.start(self) {
            Self::broadcast_locked(&mut inner, &ProcessEvent::Started { name: name.to_string() });
        }
    }

    /// Ask a process to stop (stdin close). Ignored during shutdown or
    /// for unknown names.
    pub fn stop_process(&self, name: &str) {
        let mut inner = self.inner.lock();
        if inner.shutdown {
            debug!(name, "ignoring stop request, shutdown in progress");
            return;
        }
        match inner.procs.get_mut(name) {
            Some(proc) => proc.stop(),
            None => warn!(name, "ignoring stop request for unknown process"),
        }
    }

    /// Remove a process from the registry and broadcast PROCESS_REMOVED.
    pub fn remove_process(&self, name: &str) {
        let mut inner = self.inner.lock();
        if !inner.procs.contains_key(name) {
            warn!(name, "ignoring remove request for unknown process");
            return;
        }
        self.remove_locked(&mut inner, name);
    }

    /// Pipe bytes to a process's stdin. Silently ignored during shutdown
    /// or for unknown names; write failures are logged by the process.
    pub fn send_stdin(&self, name: &str, data: &[u8]) {
        let mut inner = self.inner.lock();
        if inner.shutdown {
            debug!(name, "ignoring stdin data, shutdown in progress");
            return;
        }
        match inner.procs.get_mut(name) {
            Some(proc) => proc.send_stdin(data),
            None => debug!(name, "ignoring stdin data for unknown process"),
        }
    }

    /// Tell a process to re-attach to its manager at a new address.
    pub fn reconnect_process(&self, name: &str, host: &str, port: u16) {
        let mut inner = self.inner.lock();
        if inner.shutdown {
            debug!(name, "ignoring reconnect request, shutdown in progress");
            return;
        }
        match inner.procs.get_mut(name) {
            Some(proc) => proc.reconnect(host, port),
            None => warn!(name, "ignoring reconnect request for unknown process"),
        }
    }

    /// Broadcast a PROCESS_INVENTORY snapshot to every managed connection.
    pub fn send_inventory(&self) {
        let mut inner = self.inner.lock();
        let mut entries: Vec<warden_core::InventoryRecord> = inner
            .procs
            .values()
            .map(|p| warden_core::InventoryRecord {
                name: p.name().to_string(),
                key: *p.key(),
                running: p.is_running(),
            })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Self::broadcast_locked(&mut inner, &ProcessEvent::Inventory { entries });
    }

    /// Full registry shutdown: drain the privileged process first, then
    /// everything else, blocking (lock released while waiting) until the
    /// registry is empty. Idempotent.
    pub fn shutdown(self: &Arc<Self>) {
        let mut inner = self.inner.lock();
        if inner.shutdown {
            debug!("shutdown already in progress");
            return;
        }
        info!("shutting down process controller");
        inner.shutdown = true;
        // Wake pending respawn waits so they abort instead of relaunching.
        self.cond.notify_all();

        let privileged =
            inner.procs.values().find(|p| p.is_privileged()).map(|p| p.name().to_string());
        if let Some(name) = privileged {
            self.request_shutdown_locked(&mut inner, &name);
            while inner.procs.contains_key(&name) {
                self.cond.wait(&mut inner);
            }
        }

        let names: Vec<String> = inner.procs.keys().cloned().collect();
        for name in names {
            self.request_shutdown_locked(&mut inner, &name);
        }
        while !inner.procs.is_empty() {
            self.cond.wait(&mut inner);
        }
        info!("process controller drained");
    }

    /// Shut everything down on a fresh thread, then terminate the
    /// controller's own process with `code`. Used for the reserved
    /// privileged exit codes and the SHUTDOWN command; never run on a
    /// reaper or connection thread.
    pub fn initiate_exit(self: &Arc<Self>, code: i32) {
        let ctl = Arc::clone(self);
        let spawned = thread::Builder::new().name("warden-shutdown".to_string()).spawn(move || {
            ctl.shutdown();
            ctl.exit_hook.exit(code);
        });
        if let Err(e) = spawned {
            error!("failed to spawn shutdown thread: {}", e);
        }
    }

    /// Look up a connection credential. `None` for unknown keys — an
    /// expected occurrence (stale clients, probing), not an error.
    /// `Some(privileged)` reports whether the owning process may issue
    /// commands.
    pub fn authenticate(&self, key: &AuthKey) -> Option<bool> {
        let inner = self.inner.lock();
        let name = inner.by_key.get(key)?;
        inner.procs.get(name).map(ManagedProcess::is_privileged)
    }

    /// Add an authenticated connection to the broadcast set.
    pub fn attach_connection(&self, conn: Arc<dyn MessageConnection>) {
        let mut inner = self.inner.lock();
        debug!(conn = conn.id(), "connection attached");
        inner.connections.push(conn);
    }

    /// Drop a connection from the broadcast set (peer closed or failed).
    pub fn detach_connection(&self, id: u64) {
        let mut inner = self.inner.lock();
        inner.connections.retain(|c| c.id() != id);
    }

    /// Exit handling, run on the per-process reaper thread after the OS
    /// process terminates.
    pub(crate) fn on_process_exit(self: &Arc<Self>, name: &str, code: i32) {
        let after = {
            let mut inner = self.inner.lock();
            let Some(proc) = inner.procs.get_mut(name) else {
                debug!(name, "exit of process no longer in registry");
                return;
            };
            let privileged = proc.is_privileged();
            let policy = proc.policy();
            let (uptime_ms, disposition) = proc.record_exit();
            info!(name, code, uptime_ms, "process exited");
            Self::broadcast_locked(
                &mut inner,
                &ProcessEvent::Stopped { name: name.to_string(), uptime_ms },
            );

            match disposition {
                ExitDisposition::Remove => {
                    self.remove_locked(&mut inner, name);
                    AfterExit::Nothing
                }
                _ if privileged && code == exit_codes::ABORT => {
                    info!(name, "privileged process aborted, shutting down");
                    self.remove_locked(&mut inner, name);
                    AfterExit::Exit(0)
                }
                _ if privileged && code == exit_codes::RESTART_FROM_LAUNCHER => {
                    info!(name, "privileged process requested full restart");
                    self.remove_locked(&mut inner, name);
                    AfterExit::Exit(exit_codes::RESTART_FROM_LAUNCHER)
                }
                ExitDisposition::Respawn(count) => AfterExit::Respawn { policy, count },
                ExitDisposition::Leave => AfterExit::Nothing,
            }
        };

        // Policy decision and back-off wait happen with the lock released;
        // the wait itself rides the registry condvar so shutdown cancels it.
        match after {
            AfterExit::Nothing => {}
            AfterExit::Exit(code) => self.initiate_exit(code),
            AfterExit::Respawn { policy, count } => match policy.decide(count) {
                Some(wait) => self.wait_and_respawn(name, wait),
                None => info!(name, count, "not respawning"),
            },
        }
    }

    /// Observe the back-off wait, then relaunch if the process is still
    /// registered, still down, and the registry is not shutting down.
    /// Shutdown during the wait aborts the respawn.
    fn wait_and_respawn(self: &Arc<Self>, name: &str, wait: Duration) {
        let deadline = Instant::now() + wait;
        let mut inner = self.inner.lock();
        loop {
            if inner.shutdown {
                debug!(name, "respawn aborted by shutdown");
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            // Lock released while parked; spurious wakes re-check above.
            self.cond.wait_for(&mut inner, deadline - now);
        }
        let Some(proc) = inner.procs.get_mut(name) else {
            debug!(name, "respawn aborted, process removed");
            return;
        };
        if proc.respawn(self) {
            Self::broadcast_locked(&mut inner, &ProcessEvent::Started { name: name.to_string() });
        }
    }

    fn request_shutdown_locked(&self, inner: &mut Registry, name: &str) {
        let Some(proc) = inner.procs.get_mut(name) else {
            return;
        };
        match proc.request_shutdown() {
            ShutdownAction::RemoveNow => self.remove_locked(inner, name),
            ShutdownAction::AwaitExit => {}
        }
    }

    /// Remove from both keyed views, broadcast PROCESS_REMOVED, and wake
    /// anything blocked on process-count changes.
    fn remove_locked(&self, inner: &mut Registry, name: &str) {
        if let Some(proc) = inner.procs.remove(name) {
            inner.by_key.remove(proc.key());
            info!(name, "process removed");
            Self::broadcast_locked(inner, &ProcessEvent::Removed { name: name.to_string() });
            self.cond.notify_all();
        }
    }

    /// Fan an event out to every managed connection. A write failure
    /// drops that connection from the set and never aborts delivery to
    /// the rest.
    fn broadcast_locked(inner: &mut Registry, event: &ProcessEvent) {
        let payload = match encode_event(event) {
            Ok(payload) => payload,
            Err(e) => {
                error!("failed to encode event: {}", e);
                return;
            }
        };
        let mut dead: Vec<u64> = Vec::new();
        for conn in &inner.connections {
            if let Err(e) = conn.send(&payload) {
                warn!(conn = conn.id(), "dropping connection after write failure: {}", e);
                dead.push(conn.id());
            } else {
                trace!(conn = conn.id(), event = ?event.kind(), "event delivered");
            }
        }
        if !dead.is_empty() {
            inner.connections.retain(|c| !dead.contains(&c.id()));
        }
    }

    // Introspection, used by the bootstrap path and tests.

    /// Current lifecycle state of a process, if registered.
    pub fn process_state(&self, name: &str) -> Option<ProcessState> {
        self.inner.lock().procs.get(name).map(ManagedProcess::state)
    }

    /// The auth key of a registered process. The bootstrap path hands
    /// this to the embedding client of the privileged process.
    pub fn process_key(&self, name: &str) -> Option<AuthKey> {
        self.inner.lock().procs.get(name).map(|p| *p.key())
    }

    /// OS pid of a running process.
    pub fn process_pid(&self, name: &str) -> Option<u32> {
        self.inner.lock().procs.get(name).and_then(ManagedProcess::pid)
    }

    /// Number of registered processes.
    pub fn process_count(&self) -> usize {
        self.inner.lock().procs.len()
    }

    /// Number of attached managed connections.
    pub fn connection_count(&self) -> usize {
        self.inner.lock().connections.len()
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
