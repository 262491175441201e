use std::{collections::HashMap, sync::Arc};

use jsdt_shared::{ConnectionId, Notification};

use crate::connection::ServerConnection;

/// Notifications produced while handling one request, sent in production
/// order once the state change is complete
#[derive(Default)]
pub(crate) struct Outbox {
    pending: Vec<(ConnectionId, Notification)>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, connection: ConnectionId, notification: Notification) {
        self.pending.push((connection, notification));
    }

    /// Queues `notification` once for every connection with at least one
    /// listener registered
    pub fn to_listeners<'a, I>(&mut self, listeners: I, notification: &Notification)
    where
        I: IntoIterator<Item = &'a ConnectionId>,
    {
        for connection in listeners {
            self.pending.push((*connection, notification.clone()));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn flush(self, connections: &HashMap<ConnectionId, Arc<ServerConnection>>) {
        for (id, notification) in self.pending {
            if let Some(connection) = connections.get(&id) {
                connection.notify(notification);
            }
        }
    }
}
