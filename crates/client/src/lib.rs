// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client facade for the warden lifecycle protocol.
//!
//! A [`ControllerClient`] holds one authenticated connection to the
//! daemon. Commands are fire-and-forget on the wire; where the protocol
//! answers with a broadcast event, the command returns a
//! [`LifecycleTask`] that completes when the matching event arrives.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod task;

pub use client::{ControllerClient, EventListener};
pub use task::LifecycleTask;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("codec error: {0}")]
    Codec(#[from] warden_wire::CodecError),
    #[error("timed out waiting for event")]
    TimedOut,
    #[error("connection closed")]
    ConnectionClosed,
}
