// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The connection-holding client.
//!
//! One background thread reads broadcast events off the socket; each
//! event first completes any pending command task it matches, then fans
//! out to the registered listeners. Listener callbacks run on the read
//! thread and must not block.

use std::collections::HashMap;
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};
use warden_core::{AuthKey, EventKind, InventoryRecord, ProcessEvent};
use warden_wire::{
    decode_event, read_message, write_message, AuthRequest, ControllerRequest, PROTOCOL_VERSION,
};

use crate::task::{LifecycleTask, TaskInner};
use crate::ClientError;

/// Receives every broadcast event, on the client's read thread.
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &ProcessEvent);
}

struct Shared {
    writer: Mutex<TcpStream>,
    listeners: Mutex<Vec<(u64, Arc<dyn EventListener>)>>,
    tasks: Mutex<Vec<Arc<TaskInner>>>,
    closed: Mutex<bool>,
}

impl Shared {
    fn dispatch(&self, event: &ProcessEvent) {
        let completed: Vec<Arc<TaskInner>> = {
            let mut tasks = self.tasks.lock();
            let mut done = Vec::new();
            tasks.retain(|task| {
                if task.matches(event) {
                    done.push(Arc::clone(task));
                    false
                } else {
                    true
                }
            });
            done
        };
        for task in completed {
            task.complete(event);
        }

        // Snapshot so a listener may add or remove listeners from its
        // callback without deadlocking.
        let listeners: Vec<Arc<dyn EventListener>> =
            self.listeners.lock().iter().map(|(_, l)| Arc::clone(l)).collect();
        for listener in listeners {
            listener.on_event(event);
        }
    }

    fn mark_closed(&self) {
        *self.closed.lock() = true;
        let tasks: Vec<Arc<TaskInner>> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            task.abandon();
        }
    }
}

pub struct ControllerClient {
    shared: Arc<Shared>,
    next_listener: AtomicU64,
}

impl ControllerClient {
    /// Connect and authenticate as the process owning `key`. The daemon
    /// never answers AUTH; a bad key simply gets the connection closed,
    /// which surfaces here as the first command or wait failing.
    pub fn connect(addr: SocketAddr, key: AuthKey) -> Result<Self, ClientError> {
        let mut stream = TcpStream::connect(addr)?;
        let auth = AuthRequest { version: PROTOCOL_VERSION, key }.encode()?;
        write_message(&mut stream, &auth)?;

        let reader = stream.try_clone()?;
        let shared = Arc::new(Shared {
            writer: Mutex::new(stream),
            listeners: Mutex::new(Vec::new()),
            tasks: Mutex::new(Vec::new()),
            closed: Mutex::new(false),
        });

        let read_shared = Arc::clone(&shared);
        thread::Builder::new()
            .name("warden-client-read".to_string())
            .spawn(move || read_loop(reader, read_shared))?;

        Ok(Self { shared, next_listener: AtomicU64::new(1) })
    }

    /// Register a broadcast listener; the returned id removes it.
    pub fn add_listener(&self, listener: Arc<dyn EventListener>) -> u64 {
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        self.shared.listeners.lock().push((id, listener));
        id
    }

    pub fn remove_listener(&self, id: u64) {
        self.shared.listeners.lock().retain(|(lid, _)| *lid != id);
    }

    pub fn is_closed(&self) -> bool {
        *self.shared.closed.lock()
    }

    /// Register a managed process. The key on the wire is a placeholder;
    /// the daemon mints the authoritative key and publishes it in the
    /// inventory.
    pub fn add_process(
        &self,
        name: &str,
        command: Vec<String>,
        env: HashMap<String, String>,
        working_dir: &str,
    ) -> Result<LifecycleTask, ClientError> {
        let request = ControllerRequest::AddProcess {
            name: name.to_string(),
            key: AuthKey::generate(),
            command,
            env,
            working_dir: working_dir.to_string(),
        };
        self.command_with_completion(&request, EventKind::Added, Some(name))
    }

    pub fn start_process(&self, name: &str) -> Result<LifecycleTask, ClientError> {
        let request = ControllerRequest::StartProcess { name: name.to_string() };
        self.command_with_completion(&request, EventKind::Started, Some(name))
    }

    pub fn stop_process(&self, name: &str) -> Result<LifecycleTask, ClientError> {
        let request = ControllerRequest::StopProcess { name: name.to_string() };
        self.command_with_completion(&request, EventKind::Stopped, Some(name))
    }

    pub fn remove_process(&self, name: &str) -> Result<LifecycleTask, ClientError> {
        let request = ControllerRequest::RemoveProcess { name: name.to_string() };
        self.command_with_completion(&request, EventKind::Removed, Some(name))
    }

    pub fn send_stdin(&self, name: &str, data: &[u8]) -> Result<(), ClientError> {
        self.send(&ControllerRequest::SendStdin { name: name.to_string(), data: data.to_vec() })
    }

    pub fn reconnect_process(&self, name: &str, host: &str, port: u16) -> Result<(), ClientError> {
        self.send(&ControllerRequest::ReconnectProcess {
            name: name.to_string(),
            host: host.to_string(),
            port,
        })
    }

    pub fn request_inventory(&self) -> Result<LifecycleTask, ClientError> {
        self.command_with_completion(&ControllerRequest::RequestProcessInventory, EventKind::Inventory, None)
    }

    /// Request the inventory and wait for the snapshot.
    pub fn inventory(&self, timeout: Duration) -> Result<Vec<InventoryRecord>, ClientError> {
        let event = self.request_inventory()?.wait(timeout)?;
        match event {
            ProcessEvent::Inventory { entries } => Ok(entries),
            // matches() pins the event kind; nothing else can complete it.
            _ => Ok(Vec::new()),
        }
    }

    /// Ask the daemon to drain every process and exit.
    pub fn shutdown(&self) -> Result<(), ClientError> {
        self.send(&ControllerRequest::Shutdown)
    }

    /// Register the completion task before sending, so the event cannot
    /// race past between send and registration.
    fn command_with_completion(
        &self,
        request: &ControllerRequest,
        kind: EventKind,
        name: Option<&str>,
    ) -> Result<LifecycleTask, ClientError> {
        let inner = TaskInner::new(kind, name.map(str::to_string));
        self.shared.tasks.lock().push(Arc::clone(&inner));
        if let Err(e) = self.send(request) {
            self.shared.tasks.lock().retain(|t| !Arc::ptr_eq(t, &inner));
            return Err(e);
        }
        Ok(LifecycleTask::new(inner))
    }

    fn send(&self, request: &ControllerRequest) -> Result<(), ClientError> {
        if self.is_closed() {
            return Err(ClientError::ConnectionClosed);
        }
        let payload = request.encode()?;
        let mut writer = self.shared.writer.lock();
        write_message(&mut *writer, &payload)?;
        trace!(?request, "command sent");
        Ok(())
    }
}

fn read_loop(mut reader: TcpStream, shared: Arc<Shared>) {
    loop {
        match read_message(&mut reader) {
            Ok(Some(payload)) => match decode_event(&payload) {
                Ok(event) => shared.dispatch(&event),
                Err(e) => warn!("undecodable event frame: {}", e),
            },
            Ok(None) => {
                debug!("daemon closed the connection");
                break;
            }
            Err(e) => {
                debug!("connection failed: {}", e);
                break;
            }
        }
    }
    shared.mark_closed();
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
