//! Outbound delivery from the engine to connections.

use std::collections::HashMap;

use hotseat_protocol::{ConnectionId, ServerEvent};
use tokio::sync::mpsc;

/// Channel sender for delivering server events to one connection handler.
pub type OutboundSender = mpsc::UnboundedSender<ServerEvent>;

/// Fire-and-forget delivery of server events.
///
/// Implementations must never block and must silently drop events for
/// connections that are gone.
pub trait Notifier {
    fn send_to(&mut self, conn: ConnectionId, event: ServerEvent);

    /// Sends `event` to every connection in `conns`.
    fn broadcast(&mut self, conns: &[ConnectionId], event: &ServerEvent) {
        for conn in conns {
            self.send_to(*conn, event.clone());
        }
    }
}

/// Delivers through per-connection unbounded channels.
#[derive(Debug, Default)]
pub struct ChannelNotifier {
    senders: HashMap<ConnectionId, OutboundSender>,
}

impl ChannelNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, conn: ConnectionId, sender: OutboundSender) {
        self.senders.insert(conn, sender);
    }

    pub fn unregister(&mut self, conn: ConnectionId) -> bool {
        self.senders.remove(&conn).is_some()
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}

impl Notifier for ChannelNotifier {
    fn send_to(&mut self, conn: ConnectionId, event: ServerEvent) {
        if let Some(sender) = self.senders.get(&conn) {
            if sender.send(event).is_err() {
                tracing::debug!(%conn, "outbound channel closed, dropping event");
            }
        }
    }
}
