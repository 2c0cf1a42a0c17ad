// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Binary lifecycle protocol for the warden process controller.
//!
//! Frame format: 4-byte length prefix (big-endian) + payload. The first
//! payload byte is a command or event code; the rest is a code-specific
//! body built from length-prefixed UTF-8 strings, big-endian integers,
//! one-byte booleans, and fixed 16-byte key blobs.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod codec;
mod messages;
mod protocol;
mod server;
mod transport;

pub use codec::{
    read_bool, read_i32, read_key, read_string, read_u64, write_bool, write_i32, write_key,
    write_string, write_u64, CodecError,
};
pub use messages::{decode_event, encode_event, AuthRequest, ControllerRequest};
pub use protocol::{Command, EventCode, AUTH, PROTOCOL_VERSION};
pub use server::{FrameServer, HandlerFactory, TcpFrameConnection};
pub use transport::{read_message, write_message, ConnectionHandler, MessageConnection};
