// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle events broadcast by the controller to managed connections.

use crate::AuthKey;

/// One entry of a process inventory snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryRecord {
    pub name: String,
    pub key: AuthKey,
    pub running: bool,
}

/// A lifecycle event fanned out to every managed connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    Added { name: String },
    Started { name: String },
    Stopped { name: String, uptime_ms: u64 },
    Removed { name: String },
    Inventory { entries: Vec<InventoryRecord> },
}

/// Discriminant of a [`ProcessEvent`], used by the client facade to match
/// an awaited completion against an incoming event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Added,
    Started,
    Stopped,
    Removed,
    Inventory,
}

impl ProcessEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ProcessEvent::Added { .. } => EventKind::Added,
            ProcessEvent::Started { .. } => EventKind::Started,
            ProcessEvent::Stopped { .. } => EventKind::Stopped,
            ProcessEvent::Removed { .. } => EventKind::Removed,
            ProcessEvent::Inventory { .. } => EventKind::Inventory,
        }
    }

    /// The process name this event concerns, if any. Inventory events are
    /// registry-wide and carry no single name.
    pub fn process_name(&self) -> Option<&str> {
        match self {
            ProcessEvent::Added { name }
            | ProcessEvent::Started { name }
            | ProcessEvent::Stopped { name, .. }
            | ProcessEvent::Removed { name } => Some(name),
            ProcessEvent::Inventory { .. } => None,
        }
    }
}
