// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-process authentication keys.
//!
//! Every managed process is assigned a random 16-byte key at creation.
//! The key is written to the child's stdin at launch and doubles as the
//! credential a protocol connection presents in its AUTH handshake.

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

/// Length of an authentication key in bytes.
pub const AUTH_KEY_LEN: usize = 16;

/// Errors constructing an [`AuthKey`].
#[derive(Debug, Error)]
pub enum AuthKeyError {
    #[error("auth key must be {AUTH_KEY_LEN} bytes, got {0}")]
    BadLength(usize),
}

/// A 16-byte per-process authentication key.
///
/// Keys are compared for exact equality and are unique within a registry;
/// `Display` renders hex for log lines only, never for the wire.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AuthKey([u8; AUTH_KEY_LEN]);

impl AuthKey {
    /// Generate a fresh random key.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().into_bytes())
    }

    /// Build a key from raw bytes read off the wire.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AuthKeyError> {
        let arr: [u8; AUTH_KEY_LEN] =
            bytes.try_into().map_err(|_| AuthKeyError::BadLength(bytes.len()))?;
        Ok(Self(arr))
    }

    /// The raw key bytes, for wire encoding and child-stdin handoff.
    pub fn as_bytes(&self) -> &[u8; AUTH_KEY_LEN] {
        &self.0
    }
}

impl fmt::Display for AuthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl fmt::Debug for AuthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthKey({})", self)
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
