// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command and event byte codes.

use crate::CodecError;

/// Protocol version carried in the AUTH handshake. Versions below 1 are
/// rejected.
pub const PROTOCOL_VERSION: u8 = 1;

/// The authentication code. Deliberately outside the command range: AUTH
/// is the only legal first message on a fresh connection and is never a
/// valid command afterwards.
pub const AUTH: u8 = 0xEE;

/// Inbound commands, peer -> controller.
///
/// Acted on only when the connection is the privileged peer; observers
/// receive no error, the command is dropped at trace level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    AddProcess = 0x10,
    StartProcess = 0x11,
    StopProcess = 0x12,
    RemoveProcess = 0x13,
    SendStdin = 0x14,
    RequestProcessInventory = 0x15,
    ReconnectProcess = 0x16,
    Shutdown = 0x17,
}

impl TryFrom<u8> for Command {
    type Error = CodecError;

    fn try_from(byte: u8) -> Result<Self, CodecError> {
        match byte {
            0x10 => Ok(Command::AddProcess),
            0x11 => Ok(Command::StartProcess),
            0x12 => Ok(Command::StopProcess),
            0x13 => Ok(Command::RemoveProcess),
            0x14 => Ok(Command::SendStdin),
            0x15 => Ok(Command::RequestProcessInventory),
            0x16 => Ok(Command::ReconnectProcess),
            0x17 => Ok(Command::Shutdown),
            other => Err(CodecError::UnknownCode(other)),
        }
    }
}

/// Outbound events, controller -> peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EventCode {
    ProcessAdded = 0x20,
    ProcessStarted = 0x21,
    ProcessStopped = 0x22,
    ProcessRemoved = 0x23,
    ProcessInventory = 0x24,
}

impl TryFrom<u8> for EventCode {
    type Error = CodecError;

    fn try_from(byte: u8) -> Result<Self, CodecError> {
        match byte {
            0x20 => Ok(EventCode::ProcessAdded),
            0x21 => Ok(EventCode::ProcessStarted),
            0x22 => Ok(EventCode::ProcessStopped),
            0x23 => Ok(EventCode::ProcessRemoved),
            0x24 => Ok(EventCode::ProcessInventory),
            other => Err(CodecError::UnknownCode(other)),
        }
    }
}
