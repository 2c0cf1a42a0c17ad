// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Primitive value encoding shared by every message body.
//!
//! Strings carry an i32 big-endian byte count followed by UTF-8 bytes.
//! Integers are fixed-width big-endian, booleans one byte, auth keys a
//! fixed 16-byte blob.

use std::io::{Read, Write};

use thiserror::Error;
use warden_core::{AuthKey, AUTH_KEY_LEN};

/// Errors reading or writing protocol values.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid UTF-8 in string field")]
    InvalidUtf8,

    #[error("negative length {0} for non-optional field")]
    NegativeLength(i32),

    #[error("declared length {0} exceeds frame budget")]
    LengthTooLarge(i32),

    #[error("invalid boolean byte {0:#04x}")]
    InvalidBool(u8),

    #[error("invalid auth key: {0}")]
    InvalidKey(#[from] warden_core::AuthKeyError),

    #[error("unknown code {0:#04x}")]
    UnknownCode(u8),

    #[error("trailing bytes after message body")]
    TrailingBytes,

    #[error("empty message")]
    EmptyMessage,
}

/// Per-field length cap. Frames are bounded by the transport; this guards
/// against a corrupt length prefix causing a huge allocation.
const MAX_FIELD_LEN: i32 = 1 << 20;

pub fn write_i32(out: &mut impl Write, value: i32) -> Result<(), CodecError> {
    out.write_all(&value.to_be_bytes())?;
    Ok(())
}

pub fn read_i32(input: &mut impl Read) -> Result<i32, CodecError> {
    let mut buf = [0u8; 4];
    input.read_exact(&mut buf)?;
    Ok(i32::from_be_bytes(buf))
}

pub fn write_u64(out: &mut impl Write, value: u64) -> Result<(), CodecError> {
    out.write_all(&value.to_be_bytes())?;
    Ok(())
}

pub fn read_u64(input: &mut impl Read) -> Result<u64, CodecError> {
    let mut buf = [0u8; 8];
    input.read_exact(&mut buf)?;
    Ok(u64::from_be_bytes(buf))
}

pub fn write_bool(out: &mut impl Write, value: bool) -> Result<(), CodecError> {
    out.write_all(&[u8::from(value)])?;
    Ok(())
}

pub fn read_bool(input: &mut impl Read) -> Result<bool, CodecError> {
    let mut buf = [0u8; 1];
    input.read_exact(&mut buf)?;
    match buf[0] {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(CodecError::InvalidBool(other)),
    }
}

pub fn write_string(out: &mut impl Write, value: &str) -> Result<(), CodecError> {
    let bytes = value.as_bytes();
    write_i32(out, bytes.len() as i32)?;
    out.write_all(bytes)?;
    Ok(())
}

pub fn read_string(input: &mut impl Read) -> Result<String, CodecError> {
    let len = read_i32(input)?;
    if len < 0 {
        return Err(CodecError::NegativeLength(len));
    }
    read_string_body(input, len)
}

fn read_string_body(input: &mut impl Read, len: i32) -> Result<String, CodecError> {
    if len > MAX_FIELD_LEN {
        return Err(CodecError::LengthTooLarge(len));
    }
    let mut buf = vec![0u8; len as usize];
    input.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|_| CodecError::InvalidUtf8)
}

pub fn write_key(out: &mut impl Write, key: &AuthKey) -> Result<(), CodecError> {
    out.write_all(key.as_bytes())?;
    Ok(())
}

pub fn read_key(input: &mut impl Read) -> Result<AuthKey, CodecError> {
    let mut buf = [0u8; AUTH_KEY_LEN];
    input.read_exact(&mut buf)?;
    Ok(AuthKey::from_bytes(&buf)?)
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
