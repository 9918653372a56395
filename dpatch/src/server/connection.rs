//! Listen socket setup and accepted-client bookkeeping.

use super::{mux, Server};
use dpatch_common::DpatchError;
use mio::net::TcpListener;
use socket2::{Domain, Socket, Type};
use std::net::{IpAddr, SocketAddr};

/// An accepted, not-yet-read client connection.
///
/// Closing a slot (removing it from the server's client store) is the only
/// way a socket stops being polled. There is no separate "half closed"
/// state.
pub struct ClientSlot {
    pub stream: mio::net::TcpStream,
}

/// Bind a listen socket per §4.9: `SO_REUSEADDR`, the configured backlog,
/// non-blocking, on all interfaces.
pub fn bind(address: IpAddr, port: u16, backlog: u32) -> Result<TcpListener, DpatchError> {
    let addr = SocketAddr::new(address, port);
    let domain = match address {
        IpAddr::V4(_) => Domain::IPV4,
        IpAddr::V6(_) => Domain::IPV6,
    };

    let socket = Socket::new(domain, Type::STREAM, None)
        .map_err(|e| DpatchError::AcceptFailed(format!("failed to create listen socket: {}", e)))?;
    socket
        .set_reuse_address(true)
        .map_err(|e| DpatchError::AcceptFailed(format!("failed to set SO_REUSEADDR: {}", e)))?;
    socket
        .bind(&addr.into())
        .map_err(|e| DpatchError::AcceptFailed(format!("failed to bind to {}: {}", addr, e)))?;
    socket
        .listen(backlog as i32)
        .map_err(|e| DpatchError::AcceptFailed(format!("failed to listen on {}: {}", addr, e)))?;
    socket
        .set_nonblocking(true)
        .map_err(|e| DpatchError::AcceptFailed(format!("failed to set non-blocking: {}", e)))?;

    Ok(TcpListener::from_std(socket.into()))
}

impl Server {
    /// Accept exactly one pending connection, per §4.6 step 4.
    ///
    /// Rejects (by immediate close) once the client store is full. Applies
    /// the configured receive/send timeouts via `socket2`, since `mio`'s
    /// socket types don't expose `SO_RCVTIMEO`/`SO_SNDTIMEO` directly.
    pub(super) fn accept(&mut self) {
        match self.listener.accept() {
            Ok((stream, addr)) => {
                if self.clients.is_full() {
                    log::debug!("rejecting connection from {}: client slots full", addr);
                    drop(stream);
                    return;
                }

                let sock = socket2::SockRef::from(&stream);
                if let Err(e) = sock.set_read_timeout(Some(self.settings.sock_timeout)) {
                    log::warn!("failed to set read timeout on {}: {}", addr, e);
                }
                if let Err(e) = sock.set_write_timeout(Some(self.settings.sock_timeout)) {
                    log::warn!("failed to set write timeout on {}: {}", addr, e);
                }

                log::debug!("new connection {}", addr);
                let index = match self.clients.push(ClientSlot { stream }) {
                    Some(index) => index,
                    None => unreachable!("checked is_full above"),
                };
                if let Some(slot) = self.clients.get_mut(index) {
                    if let Err(e) = mux::register_client(self.poll.registry(), slot, index) {
                        log::warn!("failed to register client {} for polling: {}", index, e);
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(e) => log::warn!("error accepting new connection: {}", e),
        }
    }

    /// Close every remaining accepted socket. Live task children are left
    /// running, per §4.9; they are reaped by the host init, not us.
    pub(super) fn drain_clients(&mut self) {
        for idx in (0..self.clients.capacity()).rev() {
            self.close_client(idx);
        }
    }
}
