// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Core domain types for the warden process controller.
//!
//! Shared by the daemon, the wire protocol, and the client facade:
//! process lifecycle states, authentication keys, the respawn policy,
//! lifecycle events, and the reserved exit codes consumed from the
//! privileged process.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod auth;
mod event;
mod respawn;
mod state;

pub use auth::{AuthKey, AuthKeyError, AUTH_KEY_LEN};
pub use event::{EventKind, InventoryRecord, ProcessEvent};
pub use respawn::RespawnPolicy;
pub use state::ProcessState;

/// Reserved exit codes consumed from the privileged process.
pub mod exit_codes {
    /// The privileged process asks the external launcher script to restart
    /// the whole controller. The controller shuts down and exits with this
    /// same code so the script can tell the two cases apart.
    pub const RESTART_FROM_LAUNCHER: i32 = 10;

    /// The privileged process aborted. The controller shuts down everything
    /// and exits 0; no respawn is attempted.
    pub const ABORT: i32 = 99;
}
