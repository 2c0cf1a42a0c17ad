// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Warden daemon: the process-controller registry and everything it
//! needs to supervise child processes.
//!
//! The registry ([`ProcessController`]) is the single authority over the
//! managed-process table. All mutating operations serialize behind one
//! lock; lifecycle events fan out to every authenticated connection.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod controller;
mod handler;
mod os;
mod process;
mod sink;
mod spawn;

pub use controller::{ExitHook, ProcessController, SystemExit};
pub use handler::ServerHandler;
pub use os::{kill_process, resolve_pid};
pub use sink::OutputSink;
pub use spawn::{ChildHandle, CommandLauncher, LaunchSpec, Launcher};

#[cfg(test)]
pub(crate) mod test_support;
