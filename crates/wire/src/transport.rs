// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Framed-message transport seams.
//!
//! The controller core never touches sockets directly: it talks to a
//! [`MessageConnection`] (one call sends one whole frame) and receives
//! inbound frames through a per-connection [`ConnectionHandler`]. The TCP
//! implementation lives in `server`; tests substitute in-memory fakes.

use std::io::{self, Read, Write};

/// Frames larger than this are treated as a protocol violation.
const MAX_FRAME_LEN: u32 = 1 << 22;

/// One authenticated-or-not protocol connection, as seen by the core.
///
/// `send` writes one complete frame atomically; interleaving from
/// concurrent senders is the implementation's problem, not the caller's.
pub trait MessageConnection: Send + Sync {
    /// Stable identity for set membership while the connection lives.
    fn id(&self) -> u64;

    /// Send one whole message frame.
    fn send(&self, payload: &[u8]) -> io::Result<()>;

    /// Close the connection. Idempotent; in-flight reads on the
    /// connection's thread observe EOF or an error afterwards.
    fn close(&self);
}

/// Per-connection inbound dispatch. One handler instance per connection,
/// driven from that connection's read thread, so `&mut self` needs no
/// internal locking.
pub trait ConnectionHandler: Send {
    /// One inbound frame.
    fn on_message(&mut self, payload: &[u8]);

    /// The peer closed the connection cleanly.
    fn on_finished(&mut self);

    /// The connection failed mid-read.
    fn on_failure(&mut self, error: io::Error);
}

/// Read one length-prefixed frame. `Ok(None)` means clean EOF at a frame
/// boundary.
pub fn read_message(input: &mut impl Read) -> io::Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    match input.read_exact(&mut len_buf) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame length {} exceeds limit", len),
        ));
    }
    let mut payload = vec![0u8; len as usize];
    input.read_exact(&mut payload)?;
    Ok(Some(payload))
}

/// Write one length-prefixed frame.
pub fn write_message(output: &mut impl Write, payload: &[u8]) -> io::Result<()> {
    let len = u32::try_from(payload.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "frame too large"))?;
    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "frame too large"));
    }
    output.write_all(&len.to_be_bytes())?;
    output.write_all(payload)?;
    output.flush()
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;
