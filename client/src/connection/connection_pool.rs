use std::{
    collections::HashMap,
    net::IpAddr,
    sync::{Arc, Weak},
    time::Duration,
};

use log::{debug, info};
use parking_lot::Mutex;

use jsdt_shared::{
    resolve_host,
    transport::{Endpoint, Transport, TransportError},
    ConnectionEvent, JsdtError, Notification,
};

use super::{ClientConnection, ConnectionObserver};
use crate::{
    dispatcher::Dispatcher,
    listener::{isolated, same_listener, ConnectionListener},
};

type HostKey = (IpAddr, String);

/// Keeps one connection per endpoint, and tells ConnectionListeners when a
/// connection to their host fails.
///
/// A ConnectionListener is called at most once: it is forgotten as soon as
/// it has been told about a failure.
pub struct ConnectionPool {
    transport: Arc<dyn Transport>,
    timeout: Duration,
    dispatcher: Arc<Dispatcher>,
    connections: Mutex<HashMap<Endpoint, Arc<ClientConnection>>>,
    listeners: Mutex<HashMap<HostKey, Vec<Arc<dyn ConnectionListener>>>>,
    // Session handles open on each endpoint
    open_sessions: Mutex<HashMap<Endpoint, usize>>,
    this: Weak<ConnectionPool>,
}

impl ConnectionPool {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        timeout: Duration,
        dispatcher: Arc<Dispatcher>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            transport,
            timeout,
            dispatcher,
            connections: Mutex::new(HashMap::new()),
            listeners: Mutex::new(HashMap::new()),
            open_sessions: Mutex::new(HashMap::new()),
            this: this.clone(),
        })
    }

    /// Returns the open connection to `endpoint`, connecting if there is
    /// none yet. `host` is the name the endpoint was resolved from.
    pub fn get(
        &self,
        endpoint: &Endpoint,
        host: &str,
    ) -> Result<Arc<ClientConnection>, TransportError> {
        let mut connections = self.connections.lock();
        if let Some(connection) = connections.get(endpoint) {
            if !connection.is_closed() {
                return Ok(connection.clone());
            }
        }
        let link = self.transport.connect(endpoint)?;
        let observer = Arc::new(PoolObserver {
            pool: self.this.clone(),
        });
        let connection =
            ClientConnection::open(link, endpoint.clone(), host, self.timeout, observer);
        connections.insert(endpoint.clone(), connection.clone());
        Ok(connection)
    }

    pub fn is_connected(&self, endpoint: &Endpoint) -> bool {
        self.connections
            .lock()
            .get(endpoint)
            .map_or(false, |connection| !connection.is_closed())
    }

    pub(crate) fn session_opened(&self, endpoint: &Endpoint) {
        *self
            .open_sessions
            .lock()
            .entry(endpoint.clone())
            .or_insert(0) += 1;
    }

    /// Forgets one open Session on `endpoint`. Once no Session handle uses
    /// the endpoint any more, what was kept for its resources is dropped,
    /// and with `close_connection` the connection is torn down too.
    pub(crate) fn session_closed(&self, endpoint: &Endpoint, close_connection: bool) {
        let remaining = {
            let mut open_sessions = self.open_sessions.lock();
            let remaining = match open_sessions.get_mut(endpoint) {
                Some(count) => {
                    *count = count.saturating_sub(1);
                    *count
                }
                None => 0,
            };
            if remaining == 0 {
                open_sessions.remove(endpoint);
            }
            remaining
        };
        if remaining > 0 {
            return;
        }
        let closing = if close_connection {
            self.connections.lock().remove(endpoint)
        } else {
            None
        };
        match closing {
            Some(connection) => {
                debug!("no session left on {}, closing", endpoint);
                connection.close();
                self.dispatcher.connection_closed(endpoint);
            }
            None => self.dispatcher.forget_endpoint(endpoint),
        }
    }

    pub fn add_connection_listener(
        &self,
        host: &str,
        connection_type: &str,
        listener: Arc<dyn ConnectionListener>,
    ) -> Result<(), JsdtError> {
        let key = host_key(host, connection_type)?;
        self.listeners.lock().entry(key).or_default().push(listener);
        Ok(())
    }

    pub fn remove_connection_listener(
        &self,
        host: &str,
        connection_type: &str,
        listener: &Arc<dyn ConnectionListener>,
    ) -> Result<(), JsdtError> {
        let key = host_key(host, connection_type)?;
        let mut listeners = self.listeners.lock();
        let registered = listeners.get_mut(&key).ok_or(JsdtError::NoSuchListener)?;
        let index = registered
            .iter()
            .position(|candidate| same_listener(candidate, listener))
            .ok_or(JsdtError::NoSuchListener)?;
        registered.remove(index);
        if registered.is_empty() {
            listeners.remove(&key);
        }
        Ok(())
    }

    /// Closes every connection without telling any listener
    pub fn close_all(&self) {
        let connections: Vec<_> = self.connections.lock().drain().map(|(_, c)| c).collect();
        for connection in connections {
            connection.close();
            self.dispatcher.connection_closed(connection.endpoint());
        }
        self.open_sessions.lock().clear();
    }

    fn connection_failed(&self, connection: &Arc<ClientConnection>, reason: &str) {
        let endpoint = connection.endpoint();
        {
            let mut connections = self.connections.lock();
            if connections
                .get(endpoint)
                .map_or(false, |current| Arc::ptr_eq(current, connection))
            {
                connections.remove(endpoint);
            }
        }
        self.open_sessions.lock().remove(endpoint);

        let key = (endpoint.address, endpoint.connection_type.clone());
        let listeners = self.listeners.lock().remove(&key).unwrap_or_default();
        if !listeners.is_empty() {
            info!(
                "telling {} connection listener(s) that {} failed",
                listeners.len(),
                endpoint
            );
        }
        let event = ConnectionEvent {
            host: connection.host().to_string(),
            connection_type: endpoint.connection_type.clone(),
            reason: reason.to_string(),
        };
        for listener in listeners {
            isolated("connection listener", || listener.connection_failed(&event));
        }

        self.dispatcher.connection_failed(connection, reason);
    }
}

fn host_key(host: &str, connection_type: &str) -> Result<HostKey, JsdtError> {
    let address = resolve_host(host).ok_or_else(|| JsdtError::NoSuchHost {
        host: host.to_string(),
    })?;
    Ok((address, connection_type.to_string()))
}

struct PoolObserver {
    pool: Weak<ConnectionPool>,
}

impl ConnectionObserver for PoolObserver {
    fn notification(&self, connection: &Arc<ClientConnection>, notification: Notification) {
        if let Some(pool) = self.pool.upgrade() {
            pool.dispatcher.dispatch(connection.endpoint(), notification);
        }
    }

    fn failed(&self, connection: &Arc<ClientConnection>, reason: &str) {
        if let Some(pool) = self.pool.upgrade() {
            pool.connection_failed(connection, reason);
        }
    }
}
