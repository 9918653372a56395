//! The multiplexer: a single long-lived `mio::Poll` instance, with the
//! listen socket, each accepted client, and each live child's stdout/
//! stderr pipe registered and deregistered as they come and go, polled
//! once per tick with the configured timeout.

use super::connection::ClientSlot;
use crate::config::AppSettings;
use crate::task::TaskProcess;
use mio::net::TcpListener;
use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Registry, Token};
use std::os::unix::io::AsRawFd;

/// Token for the listen socket. Client and pipe tokens are synthesized
/// above this so a readiness event maps straight back to a store index.
pub const LISTENER_TOKEN: Token = Token(0);

fn client_token(index: usize) -> Token {
    Token(1 + index)
}

fn process_token_base(settings: &AppSettings) -> usize {
    1 + settings.max_clients
}

fn stdout_token(settings: &AppSettings, index: usize) -> Token {
    Token(process_token_base(settings) + index * 2)
}

fn stderr_token(settings: &AppSettings, index: usize) -> Token {
    Token(process_token_base(settings) + index * 2 + 1)
}

/// What a readiness [`Token`] refers back to.
pub enum Readiness {
    Listener,
    Client(usize),
    ProcessOut(usize),
    ProcessErr(usize),
}

/// Map a readiness token back to the store entry it came from.
pub fn classify(settings: &AppSettings, token: Token) -> Readiness {
    if token == LISTENER_TOKEN {
        return Readiness::Listener;
    }
    let base = process_token_base(settings);
    if token.0 < base {
        return Readiness::Client(token.0 - 1);
    }
    let offset = token.0 - base;
    if offset % 2 == 0 {
        Readiness::ProcessOut(offset / 2)
    } else {
        Readiness::ProcessErr(offset / 2)
    }
}

/// Register the listen socket. Called once, at server startup.
pub fn register_listener(registry: &Registry, listener: &mut TcpListener) -> std::io::Result<()> {
    registry.register(listener, LISTENER_TOKEN, Interest::READABLE)
}

/// Register a freshly accepted client socket at `index`.
pub fn register_client(
    registry: &Registry,
    slot: &mut ClientSlot,
    index: usize,
) -> std::io::Result<()> {
    registry.register(&mut slot.stream, client_token(index), Interest::READABLE)
}

/// Deregister a client socket before its slot is freed.
pub fn deregister_client(registry: &Registry, slot: &mut ClientSlot) {
    if let Err(e) = registry.deregister(&mut slot.stream) {
        log::debug!("failed to deregister client socket: {}", e);
    }
}

/// Register a freshly spawned child's stdout/stderr pipes at `index`.
pub fn register_process(
    registry: &Registry,
    settings: &AppSettings,
    process: &TaskProcess,
    index: usize,
) {
    if let Some(stdout) = process.child.stdout.as_ref() {
        let fd = stdout.as_raw_fd();
        if let Err(e) = registry.register(
            &mut SourceFd(&fd),
            stdout_token(settings, index),
            Interest::READABLE,
        ) {
            log::debug!("failed to register task stdout pipe: {}", e);
        }
    }
    if let Some(stderr) = process.child.stderr.as_ref() {
        let fd = stderr.as_raw_fd();
        if let Err(e) = registry.register(
            &mut SourceFd(&fd),
            stderr_token(settings, index),
            Interest::READABLE,
        ) {
            log::debug!("failed to register task stderr pipe: {}", e);
        }
    }
}

/// Deregister a process's pipes before its slot is freed.
pub fn deregister_process(registry: &Registry, process: &TaskProcess) {
    if let Some(stdout) = process.child.stdout.as_ref() {
        let fd = stdout.as_raw_fd();
        let _ = registry.deregister(&mut SourceFd(&fd));
    }
    if let Some(stderr) = process.child.stderr.as_ref() {
        let fd = stderr.as_raw_fd();
        let _ = registry.deregister(&mut SourceFd(&fd));
    }
}

/// Wait for read-readiness on whatever is currently registered, for up to
/// `settings.tick_interval`.
pub fn poll_tick(poll: &mut Poll, settings: &AppSettings) -> std::io::Result<Events> {
    let mut events = Events::with_capacity(64);
    poll.poll(&mut events, Some(settings.tick_interval))?;
    Ok(events)
}
