//! Protocol boundary specs: authentication and observer restrictions.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serial_test::serial;
use warden_client::{ClientError, ControllerClient, EventListener};
use warden_core::{AuthKey, ProcessEvent, ProcessState};
use warden_wire::{read_message, write_message, AuthRequest, ControllerRequest, PROTOCOL_VERSION};

use crate::prelude::*;

struct Recorder {
    events: Mutex<Vec<ProcessEvent>>,
}

impl Recorder {
    fn new() -> Arc<Self> {
        Arc::new(Self { events: Mutex::new(Vec::new()) })
    }

    fn events(&self) -> Vec<ProcessEvent> {
        self.events.lock().clone()
    }
}

impl EventListener for Recorder {
    fn on_event(&self, event: &ProcessEvent) {
        self.events.lock().push(event.clone());
    }
}

/// True once the daemon has closed its side of `stream`.
fn closed_by_daemon(stream: &mut TcpStream) -> bool {
    match read_message(stream) {
        Ok(None) => true,
        Err(e) => matches!(e.kind(), ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted),
        Ok(Some(_)) => false,
    }
}

#[test]
#[serial]
fn non_auth_first_frame_closes_the_connection() {
    let daemon = daemon();
    daemon.bootstrap(quiet_child());

    let mut stream = TcpStream::connect(daemon.addr).unwrap();
    let frame = ControllerRequest::StartProcess { name: "manager".to_string() }.encode().unwrap();
    write_message(&mut stream, &frame).unwrap();

    assert!(closed_by_daemon(&mut stream));
    daemon.controller.shutdown();
}

#[test]
#[serial]
fn unknown_key_closes_without_a_reply() {
    let daemon = daemon();
    daemon.bootstrap(quiet_child());

    let mut stream = TcpStream::connect(daemon.addr).unwrap();
    let auth =
        AuthRequest { version: PROTOCOL_VERSION, key: AuthKey::generate() }.encode().unwrap();
    write_message(&mut stream, &auth).unwrap();

    assert!(closed_by_daemon(&mut stream));
    assert_eq!(daemon.controller.connection_count(), 0);
    daemon.controller.shutdown();
}

#[test]
#[serial]
fn stale_protocol_version_is_rejected() {
    let daemon = daemon();
    let key = daemon.bootstrap(quiet_child());

    let mut stream = TcpStream::connect(daemon.addr).unwrap();
    let auth = AuthRequest { version: 0, key }.encode().unwrap();
    write_message(&mut stream, &auth).unwrap();

    assert!(closed_by_daemon(&mut stream));
    daemon.controller.shutdown();
}

#[test]
#[serial]
fn observers_receive_broadcasts_but_cannot_mutate() {
    let daemon = daemon();
    let manager_key = daemon.bootstrap(quiet_child());
    let observer_key = daemon.add_observer("watcher");

    let observer = ControllerClient::connect(daemon.addr, observer_key).unwrap();
    let recorder = Recorder::new();
    observer.add_listener(Arc::clone(&recorder) as Arc<dyn EventListener>);

    // Commands from an observer are silently dropped.
    let task = observer.start_process("watcher").unwrap();
    assert!(matches!(task.wait(Duration::from_millis(400)), Err(ClientError::TimedOut)));
    assert_eq!(daemon.controller.process_state("watcher"), Some(ProcessState::Down));

    // Broadcasts still reach it.
    let privileged = ControllerClient::connect(daemon.addr, manager_key).unwrap();
    privileged
        .add_process("web", quiet_child(), HashMap::new(), &tmp())
        .unwrap()
        .wait(SPEC_WAIT)
        .unwrap();
    assert!(wait_for(SPEC_WAIT, || {
        recorder.events().contains(&ProcessEvent::Added { name: "web".to_string() })
    }));

    daemon.controller.shutdown();
}
