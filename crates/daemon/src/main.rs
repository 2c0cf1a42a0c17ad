// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `wardend` - the warden process-controller daemon.
//!
//! Boots the registry, binds the lifecycle protocol server, registers the
//! initial privileged process from the command line, and starts it.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use warden_core::{ProcessState, RespawnPolicy};
use warden_daemon::{
    CommandLauncher, OutputSink, ProcessController, ServerHandler, SystemExit,
};
use warden_wire::{ConnectionHandler, FrameServer, HandlerFactory};

#[derive(Parser)]
#[command(name = "wardend", version, about = "Supervises managed child processes")]
struct Cli {
    /// Address the lifecycle protocol server listens on
    #[arg(long, default_value = "127.0.0.1:9970")]
    bind: SocketAddr,

    /// Name registered for the initial privileged process
    #[arg(long, default_value = "manager")]
    name: String,

    /// Working directory for the initial privileged process
    #[arg(long, default_value = ".")]
    working_dir: PathBuf,

    /// Command line of the initial privileged process
    #[arg(trailing_var_arg = true, required = true)]
    command: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let controller = ProcessController::new(
        Box::new(CommandLauncher),
        OutputSink::stdout(),
        OutputSink::stderr(),
        Box::new(SystemExit),
    );

    let server = FrameServer::bind(cli.bind)?;
    info!(addr = %server.local_addr()?, "lifecycle protocol server listening");

    let factory: HandlerFactory = {
        let controller = Arc::clone(&controller);
        Arc::new(move |conn| {
            Box::new(ServerHandler::new(Arc::clone(&controller), conn)) as Box<dyn ConnectionHandler>
        })
    };
    let accept = server.spawn(factory)?;

    let added = controller.add_process(
        &cli.name,
        cli.command,
        HashMap::new(),
        cli.working_dir,
        true,
        RespawnPolicy::Respawn,
    );
    if added.is_none() {
        bail!("failed to register privileged process {:?}", cli.name);
    }
    controller.start_process(&cli.name);
    if controller.process_state(&cli.name) != Some(ProcessState::Started) {
        bail!("failed to start privileged process {:?}", cli.name);
    }

    accept.join().map_err(|_| anyhow!("accept thread panicked"))
}
