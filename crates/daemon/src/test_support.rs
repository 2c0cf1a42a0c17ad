// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fakes shared by the daemon's unit tests: a scripted launcher, a
//! recording connection, a recording exit hook, and a capture sink.

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use warden_core::RespawnPolicy;
use warden_wire::MessageConnection;

use crate::controller::{ExitHook, ProcessController};
use crate::sink::OutputSink;
use crate::spawn::{ChildHandle, LaunchSpec, Launcher};

/// Poll `check` until it holds or `timeout` elapses.
pub(crate) fn wait_until(timeout: Duration, check: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    check()
}

// ---- capture sink ----

#[derive(Clone)]
pub(crate) struct CaptureSink {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl CaptureSink {
    pub(crate) fn new() -> (OutputSink, CaptureSink) {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let writer = CaptureWriter { buf: Arc::clone(&buf) };
        (OutputSink::new(Box::new(writer)), CaptureSink { buf })
    }

    pub(crate) fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock()).into_owned()
    }
}

struct CaptureWriter {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl Write for CaptureWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.lock().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// ---- fake launcher ----

/// One scripted child's control block, shared with the test.
pub(crate) struct ChildControl {
    pid: u32,
    exit: Mutex<Option<i32>>,
    exit_cond: Condvar,
    stdin_data: Mutex<Vec<u8>>,
    stdin_closed: Mutex<bool>,
    /// Exit code the child reports when its stdin closes (a cooperative
    /// child honoring the stop signal). `None` keeps it running.
    exit_on_stdin_close: Mutex<Option<i32>>,
    stdout_data: Mutex<Option<Vec<u8>>>,
}

impl ChildControl {
    fn new(pid: u32) -> Arc<Self> {
        Arc::new(Self {
            pid,
            exit: Mutex::new(None),
            exit_cond: Condvar::new(),
            stdin_data: Mutex::new(Vec::new()),
            stdin_closed: Mutex::new(false),
            exit_on_stdin_close: Mutex::new(Some(0)),
            stdout_data: Mutex::new(None),
        })
    }

    /// Make the child exit with `code`, as if it crashed or finished.
    pub(crate) fn terminate(&self, code: i32) {
        *self.exit.lock() = Some(code);
        self.exit_cond.notify_all();
    }

    /// Everything written to the child's stdin so far.
    pub(crate) fn stdin_bytes(&self) -> Vec<u8> {
        self.stdin_data.lock().clone()
    }

    pub(crate) fn stdin_closed(&self) -> bool {
        *self.stdin_closed.lock()
    }

    /// Configure the exit code reported when stdin closes; `None` means
    /// the child ignores the stop signal.
    pub(crate) fn set_exit_on_stdin_close(&self, code: Option<i32>) {
        *self.exit_on_stdin_close.lock() = code;
    }
}

/// Test-side handle inspecting the fake launcher.
#[derive(Clone)]
pub(crate) struct LauncherControl {
    state: Arc<LauncherState>,
}

struct LauncherState {
    children: Mutex<Vec<Arc<ChildControl>>>,
    specs: Mutex<Vec<LaunchSpec>>,
    fail: Mutex<bool>,
    next_stdout: Mutex<Option<Vec<u8>>>,
}

impl LauncherControl {
    pub(crate) fn launch_count(&self) -> usize {
        self.state.children.lock().len()
    }

    pub(crate) fn child(&self, index: usize) -> Arc<ChildControl> {
        Arc::clone(&self.state.children.lock()[index])
    }

    pub(crate) fn last_child(&self) -> Arc<ChildControl> {
        let children = self.state.children.lock();
        Arc::clone(children.last().unwrap())
    }

    pub(crate) fn spec(&self, index: usize) -> LaunchSpec {
        self.state.specs.lock()[index].clone()
    }

    /// Make subsequent launches fail.
    pub(crate) fn set_fail(&self, fail: bool) {
        *self.state.fail.lock() = fail;
    }

    /// Bytes the next launched child emits on stdout before going quiet.
    pub(crate) fn set_next_stdout(&self, data: &[u8]) {
        *self.state.next_stdout.lock() = Some(data.to_vec());
    }
}

pub(crate) struct FakeLauncher {
    state: Arc<LauncherState>,
}

impl FakeLauncher {
    pub(crate) fn new() -> (Box<dyn Launcher>, LauncherControl) {
        let state = Arc::new(LauncherState {
            children: Mutex::new(Vec::new()),
            specs: Mutex::new(Vec::new()),
            fail: Mutex::new(false),
            next_stdout: Mutex::new(None),
        });
        (Box::new(FakeLauncher { state: Arc::clone(&state) }), LauncherControl { state })
    }
}

impl Launcher for FakeLauncher {
    fn launch(&self, spec: &LaunchSpec) -> io::Result<Box<dyn ChildHandle>> {
        if *self.state.fail.lock() {
            return Err(io::Error::new(io::ErrorKind::NotFound, "launch refused by test"));
        }
        let mut children = self.state.children.lock();
        let pid = 1000 + children.len() as u32;
        let control = ChildControl::new(pid);
        *control.stdout_data.lock() = self.state.next_stdout.lock().take();
        children.push(Arc::clone(&control));
        self.state.specs.lock().push(spec.clone());
        Ok(Box::new(FakeChild { control, stdin_taken: false, stdout_taken: false }))
    }
}

struct FakeChild {
    control: Arc<ChildControl>,
    stdin_taken: bool,
    stdout_taken: bool,
}

impl ChildHandle for FakeChild {
    fn pid(&self) -> u32 {
        self.control.pid
    }

    fn take_stdin(&mut self) -> Option<Box<dyn Write + Send>> {
        if self.stdin_taken {
            return None;
        }
        self.stdin_taken = true;
        Some(Box::new(FakeStdin { control: Arc::clone(&self.control) }))
    }

    fn take_stdout(&mut self) -> Option<Box<dyn Read + Send>> {
        if self.stdout_taken {
            return None;
        }
        self.stdout_taken = true;
        let data = self.control.stdout_data.lock().take()?;
        Some(Box::new(io::Cursor::new(data)))
    }

    fn take_stderr(&mut self) -> Option<Box<dyn Read + Send>> {
        None
    }

    fn wait(self: Box<Self>) -> io::Result<i32> {
        let mut exit = self.control.exit.lock();
        while exit.is_none() {
            self.control.exit_cond.wait(&mut exit);
        }
        Ok(exit.unwrap_or(-1))
    }
}

struct FakeStdin {
    control: Arc<ChildControl>,
}

impl Write for FakeStdin {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.control.stdin_data.lock().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for FakeStdin {
    fn drop(&mut self) {
        *self.control.stdin_closed.lock() = true;
        if let Some(code) = *self.control.exit_on_stdin_close.lock() {
            self.control.terminate(code);
        }
    }
}

// ---- fake connection ----

pub(crate) struct FakeConnection {
    id: u64,
    frames: Mutex<Vec<Vec<u8>>>,
    fail_sends: Mutex<bool>,
    closed: Mutex<bool>,
}

impl FakeConnection {
    pub(crate) fn new(id: u64) -> Arc<Self> {
        Arc::new(Self {
            id,
            frames: Mutex::new(Vec::new()),
            fail_sends: Mutex::new(false),
            closed: Mutex::new(false),
        })
    }

    pub(crate) fn sent_frames(&self) -> Vec<Vec<u8>> {
        self.frames.lock().clone()
    }

    /// Decoded lifecycle events sent over this connection.
    pub(crate) fn sent_events(&self) -> Vec<warden_core::ProcessEvent> {
        self.frames.lock().iter().filter_map(|f| warden_wire::decode_event(f).ok()).collect()
    }

    pub(crate) fn is_closed(&self) -> bool {
        *self.closed.lock()
    }

    pub(crate) fn set_fail_sends(&self, fail: bool) {
        *self.fail_sends.lock() = fail;
    }
}

impl MessageConnection for FakeConnection {
    fn id(&self) -> u64 {
        self.id
    }

    fn send(&self, payload: &[u8]) -> io::Result<()> {
        if *self.fail_sends.lock() {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "send refused by test"));
        }
        self.frames.lock().push(payload.to_vec());
        Ok(())
    }

    fn close(&self) {
        *self.closed.lock() = true;
    }
}

// ---- recording exit hook ----

pub(crate) struct RecordingExit {
    codes: Mutex<Vec<i32>>,
    cond: Condvar,
}

impl RecordingExit {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self { codes: Mutex::new(Vec::new()), cond: Condvar::new() })
    }

    /// Block until an exit code is recorded or `timeout` elapses.
    pub(crate) fn wait_for_exit(&self, timeout: Duration) -> Option<i32> {
        let deadline = Instant::now() + timeout;
        let mut codes = self.codes.lock();
        loop {
            if let Some(code) = codes.first() {
                return Some(*code);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            self.cond.wait_for(&mut codes, deadline - now);
        }
    }
}

impl ExitHook for Arc<RecordingExit> {
    fn exit(&self, code: i32) {
        self.codes.lock().push(code);
        self.cond.notify_all();
    }
}

// ---- controller fixture ----

pub(crate) struct ControllerFixture {
    pub(crate) controller: Arc<ProcessController>,
    pub(crate) launcher: LauncherControl,
    pub(crate) output: CaptureSink,
    pub(crate) exit: Arc<RecordingExit>,
}

pub(crate) fn controller_fixture() -> ControllerFixture {
    let (launcher, launcher_control) = FakeLauncher::new();
    let (stdout_sink, output) = CaptureSink::new();
    let (stderr_sink, _stderr) = CaptureSink::new();
    let exit = RecordingExit::new();
    let controller =
        ProcessController::new(launcher, stdout_sink, stderr_sink, Box::new(Arc::clone(&exit)));
    ControllerFixture { controller, launcher: launcher_control, output, exit }
}

/// Add a process with a one-element command and default-ish arguments.
pub(crate) fn add(
    fixture: &ControllerFixture,
    name: &str,
    privileged: bool,
    policy: RespawnPolicy,
) -> Option<warden_core::AuthKey> {
    fixture.controller.add_process(
        name,
        vec!["/bin/server".to_string()],
        HashMap::new(),
        PathBuf::from("/tmp"),
        privileged,
        policy,
    )
}
