// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Completion handles for commands that are answered by a broadcast.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use warden_core::{EventKind, ProcessEvent};

use crate::ClientError;

#[derive(Debug)]
enum TaskState {
    Pending,
    Done(ProcessEvent),
    Closed,
}

pub(crate) struct TaskInner {
    kind: EventKind,
    name: Option<String>,
    state: Mutex<TaskState>,
    cond: Condvar,
}

impl TaskInner {
    pub(crate) fn new(kind: EventKind, name: Option<String>) -> Arc<Self> {
        Arc::new(Self { kind, name, state: Mutex::new(TaskState::Pending), cond: Condvar::new() })
    }

    /// Whether `event` is the completion this task is waiting for.
    pub(crate) fn matches(&self, event: &ProcessEvent) -> bool {
        event.kind() == self.kind && self.name.as_deref() == event.process_name()
    }

    pub(crate) fn complete(&self, event: &ProcessEvent) {
        let mut state = self.state.lock();
        if matches!(*state, TaskState::Pending) {
            *state = TaskState::Done(event.clone());
            self.cond.notify_all();
        }
    }

    /// Fail the task because the connection went away.
    pub(crate) fn abandon(&self) {
        let mut state = self.state.lock();
        if matches!(*state, TaskState::Pending) {
            *state = TaskState::Closed;
            self.cond.notify_all();
        }
    }
}

/// A pending command completion. Cheap to drop: an abandoned task is
/// cleaned out of the client's pending set when its event arrives.
pub struct LifecycleTask {
    inner: Arc<TaskInner>,
}

impl LifecycleTask {
    pub(crate) fn new(inner: Arc<TaskInner>) -> Self {
        Self { inner }
    }

    /// Block until the matching event arrives, the connection closes, or
    /// `timeout` elapses. Re-checks the remaining deadline on spurious
    /// wakes.
    pub fn wait(&self, timeout: Duration) -> Result<ProcessEvent, ClientError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.state.lock();
        loop {
            match &*state {
                TaskState::Done(event) => return Ok(event.clone()),
                TaskState::Closed => return Err(ClientError::ConnectionClosed),
                TaskState::Pending => {}
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(ClientError::TimedOut);
            }
            self.inner.cond.wait_for(&mut state, deadline - now);
        }
    }
}
