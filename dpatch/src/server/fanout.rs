//! Fan-out writer: relay one message to every connected client.
//!
//! Per §4.8, a fan-out writes a single framed message to every used
//! client slot except an optional ignore target.

use super::Server;
use dpatch_common::{Message, MessageKind};
use std::io::Write;

impl Server {
    /// Send `kind "payload"` to every used client slot, skipping `ignore`
    /// if given.
    ///
    /// Per-socket failures are logged, never fatal. A socket that failed
    /// to write is left in place; the next read on it will observe the
    /// closure and remove it.
    pub(super) fn fanout(&mut self, kind: MessageKind, payload: &str, ignore: Option<usize>) {
        let message = Message::single(kind, payload);
        let encoded = dpatch_common::encode(&message);

        for (index, slot) in self.clients.iter_rev_mut() {
            if Some(index) == ignore {
                continue;
            }
            if let Err(e) = slot.stream.write_all(&encoded) {
                log::debug!("fan-out write to client {} failed: {}", index, e);
            }
        }
    }
}
