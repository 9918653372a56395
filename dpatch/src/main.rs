//! `dpatch`: a small task-dispatch agent.
//!
//! Runs as the event-loop server by default, or as a one-shot CLI client
//! when invoked with the `run`/`set` subcommands (§6).

mod client;
mod config;
mod logging;
mod server;
mod task;
mod workspace;

use config::{AppSettings, RunMode};
use dpatch_common::DpatchError;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("dpatch: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), DpatchError> {
    let settings = AppSettings::assemble()?;
    logging::init(&settings, module_path!())
        .map_err(|e| DpatchError::Config(format!("failed to initialize logging: {}", e)))?;
    log::debug!("application settings:\n{:#?}", &settings);

    match &settings.run_mode {
        RunMode::Server => run_server(settings),
        RunMode::Run { .. } | RunMode::Set { .. } => client::run(&settings),
    }
}

fn run_server(settings: AppSettings) -> Result<(), DpatchError> {
    if settings.detached {
        server::daemon::daemonize()
            .map_err(|e| DpatchError::Config(format!("failed to daemonize: {}", e)))?;
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    register_signal_handlers(&shutdown)?;

    let server = server::Server::new(settings)?;
    server.run(shutdown)
}

/// Set a flag on `SIGINT`/`SIGTERM` that the event loop polls once per
/// tick, rather than handling the signal directly.
fn register_signal_handlers(shutdown: &Arc<AtomicBool>) -> Result<(), DpatchError> {
    for sig in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        signal_hook::flag::register(sig, Arc::clone(shutdown))
            .map_err(|e| DpatchError::Config(format!("failed to register signal handler: {}", e)))?;
    }
    Ok(())
}
