// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle state of a managed process.

use std::fmt;

/// Lifecycle state of a managed process.
///
/// `Down` is both the initial state and the final state after removal.
/// A process only ever moves `Down -> Started -> Stopping -> Down`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Not running. No OS handle, no stdin.
    Down,
    /// Running, with a live OS handle and writable stdin.
    Started,
    /// Stop requested; stdin closed, waiting for the child to exit.
    Stopping,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProcessState::Down => "down",
            ProcessState::Started => "started",
            ProcessState::Stopping => "stopping",
        };
        f.write_str(s)
    }
}
