//! End-to-end lifecycle specs: a privileged peer driving real children.

use std::collections::HashMap;

use serial_test::serial;
use warden_client::ControllerClient;
use warden_core::{ProcessEvent, ProcessState};

use crate::prelude::*;

#[test]
#[serial]
fn privileged_peer_drives_a_full_lifecycle() {
    let daemon = daemon();
    let key = daemon.bootstrap(quiet_child());
    let client = ControllerClient::connect(daemon.addr, key).unwrap();

    let added = client
        .add_process("web", quiet_child(), HashMap::new(), &tmp())
        .unwrap()
        .wait(SPEC_WAIT)
        .unwrap();
    assert_eq!(added, ProcessEvent::Added { name: "web".to_string() });

    let started = client.start_process("web").unwrap().wait(SPEC_WAIT).unwrap();
    assert_eq!(started, ProcessEvent::Started { name: "web".to_string() });
    assert_eq!(daemon.controller.process_state("web"), Some(ProcessState::Started));
    assert!(daemon.controller.process_pid("web").is_some());

    let inventory = client.inventory(SPEC_WAIT).unwrap();
    let names: Vec<&str> = inventory.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["manager", "web"]);
    assert!(inventory.iter().all(|e| e.running));
    // The daemon-minted keys are published here for the peer.
    assert_eq!(inventory[1].key, daemon.controller.process_key("web").unwrap());

    let stopped = client.stop_process("web").unwrap().wait(SPEC_WAIT).unwrap();
    let ProcessEvent::Stopped { name, .. } = stopped else {
        panic!("expected stopped event, got {:?}", stopped);
    };
    assert_eq!(name, "web");
    assert_eq!(daemon.controller.process_state("web"), Some(ProcessState::Down));

    let removed = client.remove_process("web").unwrap().wait(SPEC_WAIT).unwrap();
    assert_eq!(removed, ProcessEvent::Removed { name: "web".to_string() });
    assert_eq!(daemon.controller.process_count(), 1);

    daemon.controller.shutdown();
}

#[test]
#[serial]
fn child_output_is_prefixed_with_its_name() {
    let daemon = daemon();
    let key = daemon.bootstrap(quiet_child());
    let client = ControllerClient::connect(daemon.addr, key).unwrap();

    client
        .add_process("chatty", sh("echo ready; cat > /dev/null"), HashMap::new(), &tmp())
        .unwrap()
        .wait(SPEC_WAIT)
        .unwrap();
    client.start_process("chatty").unwrap().wait(SPEC_WAIT).unwrap();

    assert!(wait_for(SPEC_WAIT, || daemon.output.contents().contains("[chatty] ready")));

    daemon.controller.shutdown();
}

#[test]
#[serial]
fn stdin_bytes_reach_the_child() {
    let daemon = daemon();
    let key = daemon.bootstrap(quiet_child());
    let client = ControllerClient::connect(daemon.addr, key).unwrap();

    // The child discards the 16 leading key bytes, then echoes stdin to
    // stdout where the capture sink sees it.
    client
        .add_process("echoer", sh("dd bs=16 count=1 > /dev/null 2>&1; cat"), HashMap::new(), &tmp())
        .unwrap()
        .wait(SPEC_WAIT)
        .unwrap();
    client.start_process("echoer").unwrap().wait(SPEC_WAIT).unwrap();

    client.send_stdin("echoer", b"ping\n").unwrap();
    assert!(wait_for(SPEC_WAIT, || daemon.output.contents().contains("ping")));

    daemon.controller.shutdown();
}

#[test]
#[serial]
fn shutdown_command_drains_everything_and_exits_zero() {
    let daemon = daemon();
    let key = daemon.bootstrap(quiet_child());
    let client = ControllerClient::connect(daemon.addr, key).unwrap();

    client
        .add_process("web", quiet_child(), HashMap::new(), &tmp())
        .unwrap()
        .wait(SPEC_WAIT)
        .unwrap();
    client.start_process("web").unwrap().wait(SPEC_WAIT).unwrap();

    client.shutdown().unwrap();

    assert_eq!(daemon.exit.wait_for_exit(SPEC_WAIT), Some(0));
    assert_eq!(daemon.controller.process_count(), 0);
}

#[test]
#[serial]
fn privileged_abort_code_shuts_the_daemon_down() {
    let daemon = daemon();
    daemon.bootstrap(sh("exit 99"));

    assert_eq!(daemon.exit.wait_for_exit(SPEC_WAIT), Some(0));
    assert_eq!(daemon.controller.process_count(), 0);
}

#[test]
#[serial]
fn privileged_restart_code_is_passed_to_the_launcher() {
    let daemon = daemon();
    daemon.bootstrap(sh("exit 10"));

    assert_eq!(daemon.exit.wait_for_exit(SPEC_WAIT), Some(10));
}
