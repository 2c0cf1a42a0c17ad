// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed encode/decode for whole protocol messages.
//!
//! Encoders and decoders are exact mirrors; the field order of each body
//! is part of the wire contract.

use std::collections::HashMap;
use std::io::{Cursor, Read};

use warden_core::{AuthKey, InventoryRecord, ProcessEvent};

use crate::codec::{
    read_bool, read_i32, read_key, read_string, read_u64, write_bool, write_i32, write_key,
    write_string, write_u64, CodecError,
};
use crate::protocol::{Command, EventCode, AUTH};

/// The AUTH handshake: one version byte plus the 16-byte key of the
/// process this connection speaks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRequest {
    pub version: u8,
    pub key: AuthKey,
}

impl AuthRequest {
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let mut buf = Vec::with_capacity(18);
        buf.push(AUTH);
        buf.push(self.version);
        write_key(&mut buf, &self.key)?;
        Ok(buf)
    }

    /// Decode an AUTH frame. The caller has already checked the leading
    /// code byte; `payload` is the full frame including it.
    pub fn decode(payload: &[u8]) -> Result<Self, CodecError> {
        let mut input = Cursor::new(payload);
        let code = read_byte(&mut input)?;
        if code != AUTH {
            return Err(CodecError::UnknownCode(code));
        }
        let version = read_byte(&mut input)?;
        let key = read_key(&mut input)?;
        expect_end(&mut input)?;
        Ok(Self { version, key })
    }
}

/// An inbound lifecycle command, peer -> controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerRequest {
    AddProcess {
        name: String,
        key: AuthKey,
        command: Vec<String>,
        env: HashMap<String, String>,
        working_dir: String,
    },
    StartProcess {
        name: String,
    },
    StopProcess {
        name: String,
    },
    RemoveProcess {
        name: String,
    },
    /// Bytes to pipe into the named process's stdin. The payload is the
    /// rest of the frame; the frame boundary delimits it.
    SendStdin {
        name: String,
        data: Vec<u8>,
    },
    RequestProcessInventory,
    /// Tell the named process to re-attach to its manager at a new address.
    ReconnectProcess {
        name: String,
        host: String,
        port: u16,
    },
    Shutdown,
}

impl ControllerRequest {
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let mut buf = Vec::with_capacity(64);
        match self {
            ControllerRequest::AddProcess { name, key, command, env, working_dir } => {
                buf.push(Command::AddProcess as u8);
                write_string(&mut buf, name)?;
                write_key(&mut buf, key)?;
                write_i32(&mut buf, command.len() as i32)?;
                for element in command {
                    write_string(&mut buf, element)?;
                }
                write_i32(&mut buf, env.len() as i32)?;
                for (k, v) in env {
                    write_string(&mut buf, k)?;
                    write_string(&mut buf, v)?;
                }
                write_string(&mut buf, working_dir)?;
            }
            ControllerRequest::StartProcess { name } => {
                buf.push(Command::StartProcess as u8);
                write_string(&mut buf, name)?;
            }
            ControllerRequest::StopProcess { name } => {
                buf.push(Command::StopProcess as u8);
                write_string(&mut buf, name)?;
            }
            ControllerRequest::RemoveProcess { name } => {
                buf.push(Command::RemoveProcess as u8);
                write_string(&mut buf, name)?;
            }
            ControllerRequest::SendStdin { name, data } => {
                buf.push(Command::SendStdin as u8);
                write_string(&mut buf, name)?;
                buf.extend_from_slice(data);
            }
            ControllerRequest::RequestProcessInventory => {
                buf.push(Command::RequestProcessInventory as u8);
            }
            ControllerRequest::ReconnectProcess { name, host, port } => {
                buf.push(Command::ReconnectProcess as u8);
                write_string(&mut buf, name)?;
                write_string(&mut buf, host)?;
                write_i32(&mut buf, i32::from(*port))?;
            }
            ControllerRequest::Shutdown => {
                buf.push(Command::Shutdown as u8);
            }
        }
        Ok(buf)
    }

    pub fn decode(payload: &[u8]) -> Result<Self, CodecError> {
        let mut input = Cursor::new(payload);
        let command = Command::try_from(read_byte(&mut input)?)?;
        let request = match command {
            Command::AddProcess => {
                let name = read_string(&mut input)?;
                let key = read_key(&mut input)?;
                let count = read_count(&mut input, STRING_MIN_LEN)?;
                let mut command = Vec::with_capacity(count);
                for _ in 0..count {
                    command.push(read_string(&mut input)?);
                }
                let env_count = read_count(&mut input, 2 * STRING_MIN_LEN)?;
                let mut env = HashMap::with_capacity(env_count);
                for _ in 0..env_count {
                    let k = read_string(&mut input)?;
                    let v = read_string(&mut input)?;
                    env.insert(k, v);
                }
                let working_dir = read_string(&mut input)?;
                ControllerRequest::AddProcess { name, key, command, env, working_dir }
            }
            Command::StartProcess => {
                ControllerRequest::StartProcess { name: read_string(&mut input)? }
            }
            Command::StopProcess => {
                ControllerRequest::StopProcess { name: read_string(&mut input)? }
            }
            Command::RemoveProcess => {
                ControllerRequest::RemoveProcess { name: read_string(&mut input)? }
            }
            Command::SendStdin => {
                let name = read_string(&mut input)?;
                let mut data = Vec::new();
                input.read_to_end(&mut data)?;
                return Ok(ControllerRequest::SendStdin { name, data });
            }
            Command::RequestProcessInventory => ControllerRequest::RequestProcessInventory,
            Command::ReconnectProcess => {
                let name = read_string(&mut input)?;
                let host = read_string(&mut input)?;
                let port = read_i32(&mut input)?;
                let port =
                    u16::try_from(port).map_err(|_| CodecError::NegativeLength(port))?;
                ControllerRequest::ReconnectProcess { name, host, port }
            }
            Command::Shutdown => ControllerRequest::Shutdown,
        };
        expect_end(&mut input)?;
        Ok(request)
    }
}

/// Encode an outbound lifecycle event, controller -> peer.
pub fn encode_event(event: &ProcessEvent) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::with_capacity(32);
    match event {
        ProcessEvent::Added { name } => {
            buf.push(EventCode::ProcessAdded as u8);
            write_string(&mut buf, name)?;
        }
        ProcessEvent::Started { name } => {
            buf.push(EventCode::ProcessStarted as u8);
            write_string(&mut buf, name)?;
        }
        ProcessEvent::Stopped { name, uptime_ms } => {
            buf.push(EventCode::ProcessStopped as u8);
            write_string(&mut buf, name)?;
            write_u64(&mut buf, *uptime_ms)?;
        }
        ProcessEvent::Removed { name } => {
            buf.push(EventCode::ProcessRemoved as u8);
            write_string(&mut buf, name)?;
        }
        ProcessEvent::Inventory { entries } => {
            buf.push(EventCode::ProcessInventory as u8);
            write_i32(&mut buf, entries.len() as i32)?;
            for entry in entries {
                write_string(&mut buf, &entry.name)?;
                write_key(&mut buf, &entry.key)?;
                write_bool(&mut buf, entry.running)?;
            }
        }
    }
    Ok(buf)
}

/// Decode an outbound lifecycle event on the receiving peer.
pub fn decode_event(payload: &[u8]) -> Result<ProcessEvent, CodecError> {
    let mut input = Cursor::new(payload);
    let code = EventCode::try_from(read_byte(&mut input)?)?;
    let event = match code {
        EventCode::ProcessAdded => ProcessEvent::Added { name: read_string(&mut input)? },
        EventCode::ProcessStarted => ProcessEvent::Started { name: read_string(&mut input)? },
        EventCode::ProcessStopped => {
            let name = read_string(&mut input)?;
            let uptime_ms = read_u64(&mut input)?;
            ProcessEvent::Stopped { name, uptime_ms }
        }
        EventCode::ProcessRemoved => ProcessEvent::Removed { name: read_string(&mut input)? },
        EventCode::ProcessInventory => {
            let count = read_count(&mut input, INVENTORY_ENTRY_MIN_LEN)?;
            let mut entries = Vec::with_capacity(count);
            for _ in 0..count {
                let name = read_string(&mut input)?;
                let key = read_key(&mut input)?;
                let running = read_bool(&mut input)?;
                entries.push(InventoryRecord { name, key, running });
            }
            ProcessEvent::Inventory { entries }
        }
    };
    expect_end(&mut input)?;
    Ok(event)
}

fn read_byte(input: &mut Cursor<&[u8]>) -> Result<u8, CodecError> {
    let mut buf = [0u8; 1];
    input.read_exact(&mut buf).map_err(|_| CodecError::EmptyMessage)?;
    Ok(buf[0])
}

/// Smallest possible encodings, used to sanity-check element counts.
const STRING_MIN_LEN: usize = 4;
const INVENTORY_ENTRY_MIN_LEN: usize = STRING_MIN_LEN + 16 + 1;

/// Read an element count and check it against the bytes left in the
/// frame. A count the remaining payload cannot possibly hold is corrupt
/// and must be rejected before any allocation is sized by it.
fn read_count(input: &mut Cursor<&[u8]>, min_element_len: usize) -> Result<usize, CodecError> {
    let count = read_i32(input)?;
    let count = usize::try_from(count).map_err(|_| CodecError::NegativeLength(count))?;
    let remaining = input.get_ref().len().saturating_sub(input.position() as usize);
    if count.saturating_mul(min_element_len) > remaining {
        return Err(CodecError::LengthTooLarge(count as i32));
    }
    Ok(count)
}

fn expect_end(input: &mut Cursor<&[u8]>) -> Result<(), CodecError> {
    let mut buf = [0u8; 1];
    match input.read(&mut buf)? {
        0 => Ok(()),
        _ => Err(CodecError::TrailingBytes),
    }
}

#[cfg(test)]
#[path = "messages_tests.rs"]
mod tests;
