// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared output sinks for managed-process stdout/stderr.
//!
//! Every line a child writes is forwarded as `[name] line`, written
//! atomically so lines from different children never interleave.

use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;

/// A line-oriented sink shared by all drain threads writing to the same
/// stream.
#[derive(Clone)]
pub struct OutputSink {
    inner: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl OutputSink {
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self { inner: Arc::new(Mutex::new(writer)) }
    }

    /// The controller's own stdout, shared with prefixed child output.
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    /// The controller's own stderr, shared with prefixed child output.
    pub fn stderr() -> Self {
        Self::new(Box::new(std::io::stderr()))
    }

    /// Write one child output line, prefixed and atomic. Write failures
    /// on the sink are swallowed: a broken log pipe must not take down
    /// the drain thread.
    pub fn line(&self, name: &str, line: &str) {
        let mut writer = self.inner.lock();
        let _ = writeln!(writer, "[{}] {}", name, line);
        let _ = writer.flush();
    }
}

#[cfg(test)]
#[path = "sink_tests.rs"]
mod tests;
