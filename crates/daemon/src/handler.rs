// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-connection protocol state machine.
//!
//! A fresh connection may send exactly one thing: AUTH. A bad version or
//! unknown key closes the connection with no reply — nothing is leaked
//! to unauthenticated peers. After auth, only the privileged connection
//! may issue commands; observers receive broadcasts and nothing else.

use std::io;
use std::sync::Arc;

use tracing::{debug, trace, warn};
use warden_wire::{
    AuthRequest, ConnectionHandler, ControllerRequest, MessageConnection, PROTOCOL_VERSION,
};

use crate::controller::ProcessController;

/// Connection role, decided once at authentication.
enum ConnState {
    /// No AUTH seen yet. Anything but a valid AUTH closes the connection.
    Unauthenticated,
    /// Authenticated with a non-privileged process key. Receives
    /// broadcasts; commands are dropped.
    Observer,
    /// Authenticated with the privileged process key. May issue commands.
    Privileged,
}

/// Handler for one protocol connection, driven from its read thread.
pub struct ServerHandler {
    controller: Arc<ProcessController>,
    conn: Arc<dyn MessageConnection>,
    state: ConnState,
}

impl ServerHandler {
    pub fn new(controller: Arc<ProcessController>, conn: Arc<dyn MessageConnection>) -> Self {
        Self { controller, conn, state: ConnState::Unauthenticated }
    }

    fn authenticate(&mut self, payload: &[u8]) {
        let auth = match AuthRequest::decode(payload) {
            Ok(auth) => auth,
            Err(e) => {
                debug!(conn = self.conn.id(), "closing connection, first message not AUTH: {}", e);
                self.conn.close();
                return;
            }
        };
        if auth.version < PROTOCOL_VERSION {
            debug!(conn = self.conn.id(), version = auth.version, "closing connection, bad version");
            self.conn.close();
            return;
        }
        match self.controller.authenticate(&auth.key) {
            Some(privileged) => {
                debug!(conn = self.conn.id(), privileged, "connection authenticated");
                self.state = if privileged { ConnState::Privileged } else { ConnState::Observer };
                self.controller.attach_connection(Arc::clone(&self.conn));
            }
            None => {
                // Unknown keys are expected (stale clients, probing);
                // close without detail.
                debug!(conn = self.conn.id(), "closing connection, unknown auth key");
                self.conn.close();
            }
        }
    }

    fn dispatch(&self, request: ControllerRequest) {
        match request {
            ControllerRequest::AddProcess { name, key: _, command, env, working_dir } => {
                // The registry is the key authority: the wire-supplied key
                // is superseded by a freshly generated one; the peer learns
                // it from the inventory.
                self.controller.add_process(
                    &name,
                    command,
                    env,
                    working_dir.into(),
                    false,
                    warden_core::RespawnPolicy::Respawn,
                );
            }
            ControllerRequest::StartProcess { name } => self.controller.start_process(&name),
            ControllerRequest::StopProcess { name } => self.controller.stop_process(&name),
            ControllerRequest::RemoveProcess { name } => self.controller.remove_process(&name),
            ControllerRequest::SendStdin { name, data } => {
                self.controller.send_stdin(&name, &data)
            }
            ControllerRequest::RequestProcessInventory => self.controller.send_inventory(),
            ControllerRequest::ReconnectProcess { name, host, port } => {
                self.controller.reconnect_process(&name, &host, port)
            }
            ControllerRequest::Shutdown => self.controller.initiate_exit(0),
        }
    }
}

impl ConnectionHandler for ServerHandler {
    fn on_message(&mut self, payload: &[u8]) {
        match self.state {
            ConnState::Unauthenticated => self.authenticate(payload),
            ConnState::Observer => match ControllerRequest::decode(payload) {
                // Security boundary: observers get no error back, the
                // command simply does not happen.
                Ok(request) => {
                    trace!(conn = self.conn.id(), ?request, "ignoring command from observer")
                }
                Err(e) => trace!(conn = self.conn.id(), "undecodable frame from observer: {}", e),
            },
            ConnState::Privileged => match ControllerRequest::decode(payload) {
                Ok(request) => self.dispatch(request),
                Err(e) => warn!(conn = self.conn.id(), "undecodable frame from controller: {}", e),
            },
        }
    }

    fn on_finished(&mut self) {
        debug!(conn = self.conn.id(), "connection finished");
        self.controller.detach_connection(self.conn.id());
    }

    fn on_failure(&mut self, error: io::Error) {
        debug!(conn = self.conn.id(), "connection failed: {}", error);
        self.controller.detach_connection(self.conn.id());
    }
}

#[cfg(test)]
#[path = "handler_tests.rs"]
mod tests;
