// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OS process launching behind a trait, so lifecycle code can run against
//! fakes in tests.

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Everything needed to launch one child process.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    /// Full argv; the first element is the program.
    pub command: Vec<String>,
    /// Extra environment, merged over the controller's own.
    pub env: HashMap<String, String>,
    /// Working directory for the child.
    pub working_dir: PathBuf,
}

/// A launched child. Stdio handles are taken once by the lifecycle code;
/// `wait` consumes the handle on the reaper thread.
pub trait ChildHandle: Send {
    fn pid(&self) -> u32;

    /// Take the child's stdin. Returns `None` if already taken.
    fn take_stdin(&mut self) -> Option<Box<dyn Write + Send>>;

    /// Take the child's stdout. Returns `None` if already taken.
    fn take_stdout(&mut self) -> Option<Box<dyn Read + Send>>;

    /// Take the child's stderr. Returns `None` if already taken.
    fn take_stderr(&mut self) -> Option<Box<dyn Read + Send>>;

    /// Block until the child exits; yields the exit code.
    /// Signal-terminated children report -1.
    fn wait(self: Box<Self>) -> io::Result<i32>;
}

/// Launches child processes.
pub trait Launcher: Send + Sync {
    fn launch(&self, spec: &LaunchSpec) -> io::Result<Box<dyn ChildHandle>>;
}

/// The real launcher, backed by `std::process::Command` with piped stdio.
pub struct CommandLauncher;

impl Launcher for CommandLauncher {
    fn launch(&self, spec: &LaunchSpec) -> io::Result<Box<dyn ChildHandle>> {
        let program = spec
            .command
            .first()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command"))?;
        let child = Command::new(program)
            .args(&spec.command[1..])
            .envs(&spec.env)
            .current_dir(&spec.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        Ok(Box::new(OsChild { child }))
    }
}

struct OsChild {
    child: std::process::Child,
}

impl ChildHandle for OsChild {
    fn pid(&self) -> u32 {
        self.child.id()
    }

    fn take_stdin(&mut self) -> Option<Box<dyn Write + Send>> {
        self.child.stdin.take().map(|s| Box::new(s) as Box<dyn Write + Send>)
    }

    fn take_stdout(&mut self) -> Option<Box<dyn Read + Send>> {
        self.child.stdout.take().map(|s| Box::new(s) as Box<dyn Read + Send>)
    }

    fn take_stderr(&mut self) -> Option<Box<dyn Read + Send>> {
        self.child.stderr.take().map(|s| Box::new(s) as Box<dyn Read + Send>)
    }

    fn wait(mut self: Box<Self>) -> io::Result<i32> {
        let status = self.child.wait()?;
        Ok(status.code().unwrap_or(-1))
    }
}
