//! Outbound delivery: one-to-one sends and fan-out to every connection.

use std::collections::BTreeMap;

use rookery_wire::ServerMessage;
use tokio::sync::mpsc;

use crate::registry::ConnectionId;

/// Delivery primitives the coordinator talks to.
///
/// Both operations are best-effort: a message for a connection that is gone
/// is dropped.
pub trait Broadcaster {
    /// Deliver to one connection.
    fn send_to(&mut self, connection: ConnectionId, message: ServerMessage);

    /// Deliver to every open connection, the sender included.
    fn broadcast_all(&mut self, message: ServerMessage);
}

/// Outbound queues for live socket connections.
///
/// Each connection gets an unbounded queue drained by its own writer task,
/// so pushing never blocks the coordinator.
#[derive(Debug)]
pub struct Hub {
    outboxes: BTreeMap<ConnectionId, mpsc::UnboundedSender<ServerMessage>>,
    next_connection_id: ConnectionId,
}

impl Default for Hub {
    fn default() -> Self {
        Self {
            outboxes: BTreeMap::new(),
            next_connection_id: 1,
        }
    }
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection's queue and allocate its identifier.
    pub fn register(&mut self, outbox: mpsc::UnboundedSender<ServerMessage>) -> ConnectionId {
        let connection = self.next_connection_id;
        self.next_connection_id += 1;
        self.outboxes.insert(connection, outbox);
        connection
    }

    /// Drop a connection's queue. Later sends to it are ignored.
    pub fn unregister(&mut self, connection: ConnectionId) {
        self.outboxes.remove(&connection);
    }

    pub fn connection_count(&self) -> usize {
        self.outboxes.len()
    }
}

impl Broadcaster for Hub {
    fn send_to(&mut self, connection: ConnectionId, message: ServerMessage) {
        let Some(outbox) = self.outboxes.get(&connection) else {
            tracing::debug!(
                connection,
                kind = message.kind(),
                "send to unknown connection skipped"
            );
            return;
        };
        if outbox.send(message).is_err() {
            tracing::warn!(connection, "outbound queue closed");
        }
    }

    fn broadcast_all(&mut self, message: ServerMessage) {
        tracing::trace!(kind = message.kind(), recipients = self.outboxes.len(), "broadcast");
        for (connection, outbox) in &self.outboxes {
            if outbox.send(message.clone()).is_err() {
                tracing::warn!(connection = *connection, "outbound queue closed");
            }
        }
    }
}
