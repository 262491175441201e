use std::{collections::HashMap, sync::Arc};

use log::{debug, trace};
use parking_lot::Mutex;

use jsdt_shared::{
    transport::Endpoint, ClientEvent, ClientEventKind, Data, EventKind, Notification,
    RegistryEvent, RegistryEventKind, ResourceKind, ResourcePath,
};

use crate::{
    connection::ClientConnection,
    listener::{
        isolated, same_listener, ByteArrayListener, ChannelConsumer, ChannelListener,
        ClientListener, ListenerSet, RegistryListener, SessionListener, TokenListener,
    },
    mailbox::Mailbox,
};

type Key = (Endpoint, ResourcePath);

/// Matches the key of `path` on `endpoint` or, for a Session, the keys of
/// the Session and everything in it
fn scope<'a>(endpoint: &'a Endpoint, path: &'a ResourcePath) -> impl Fn(&Key) -> bool + 'a {
    move |(candidate, candidate_path): &Key| {
        candidate == endpoint
            && if path.is_session() {
                candidate_path.session == path.session
            } else {
                candidate_path == path
            }
    }
}

/// Per-resource state shared by every handle of that resource in this
/// process.
///
/// An entry destroyed from this process is retired: new handles get a fresh
/// entry while the events announcing the destruction still reach the old
/// one.
pub(crate) struct Directory<T> {
    live: Mutex<HashMap<Key, Arc<T>>>,
    retired: Mutex<HashMap<Key, Arc<T>>>,
}

impl<T> Default for Directory<T> {
    fn default() -> Self {
        Self {
            live: Mutex::new(HashMap::new()),
            retired: Mutex::new(HashMap::new()),
        }
    }
}

impl<T: Default> Directory<T> {
    pub fn entry(&self, endpoint: &Endpoint, path: &ResourcePath) -> Arc<T> {
        self.live
            .lock()
            .entry((endpoint.clone(), path.clone()))
            .or_default()
            .clone()
    }
}

impl<T> Directory<T> {
    pub fn get(&self, endpoint: &Endpoint, path: &ResourcePath) -> Option<Arc<T>> {
        let key = (endpoint.clone(), path.clone());
        if let Some(retired) = self.retired.lock().get(&key) {
            return Some(retired.clone());
        }
        self.live.lock().get(&key).cloned()
    }

    pub fn in_session(&self, endpoint: &Endpoint, session: &str) -> Vec<Arc<T>> {
        self.live
            .lock()
            .iter()
            .filter(|((candidate, path), _)| candidate == endpoint && path.session == session)
            .map(|(_, entry)| entry.clone())
            .collect()
    }

    fn remove(&self, matches: &dyn Fn(&Key) -> bool) -> Vec<Arc<T>> {
        let mut live = self.live.lock();
        let keys: Vec<Key> = live.keys().filter(|key| matches(key)).cloned().collect();
        keys.iter().filter_map(|key| live.remove(key)).collect()
    }

    fn retire(&self, matches: &dyn Fn(&Key) -> bool) -> Vec<Arc<T>> {
        let mut live = self.live.lock();
        let mut retired = self.retired.lock();
        let keys: Vec<Key> = live.keys().filter(|key| matches(key)).cloned().collect();
        let mut moved = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(entry) = live.remove(&key) {
                moved.push(entry.clone());
                retired.insert(key, entry);
            }
        }
        moved
    }

    fn is_retired(&self, matches: &dyn Fn(&Key) -> bool) -> bool {
        self.retired.lock().keys().any(|key| matches(key))
    }

    fn drop_retired(&self, matches: &dyn Fn(&Key) -> bool) {
        self.retired.lock().retain(|key, _| !matches(key));
    }

    /// Drops live and retired entries of `endpoint`
    fn clear_endpoint(&self, endpoint: &Endpoint) -> Vec<Arc<T>> {
        self.retired.lock().retain(|(candidate, _), _| candidate != endpoint);
        self.remove(&|(candidate, _): &Key| candidate == endpoint)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.live.lock().len() + self.retired.lock().len()
    }
}

/// Listeners, consumers and receive mailboxes of one Channel
#[derive(Default)]
pub(crate) struct ChannelShared {
    pub listeners: ListenerSet<dyn ChannelListener>,
    consumers: Mutex<HashMap<String, Vec<Arc<dyn ChannelConsumer>>>>,
    mailboxes: Mutex<HashMap<String, Arc<Mailbox>>>,
}

impl ChannelShared {
    /// Returns whether `client` had no consumer before
    pub fn add_consumer(&self, client: &str, consumer: Arc<dyn ChannelConsumer>) -> bool {
        let mut consumers = self.consumers.lock();
        let registered = consumers.entry(client.to_string()).or_default();
        registered.push(consumer);
        registered.len() == 1
    }

    /// Returns whether `client` has no consumer left, or `None` if
    /// `consumer` was never added for it
    pub fn remove_consumer(
        &self,
        client: &str,
        consumer: &Arc<dyn ChannelConsumer>,
    ) -> Option<bool> {
        let mut consumers = self.consumers.lock();
        let registered = consumers.get_mut(client)?;
        let index = registered
            .iter()
            .position(|candidate| same_listener(candidate, consumer))?;
        registered.remove(index);
        let last = registered.is_empty();
        if last {
            consumers.remove(client);
        }
        Some(last)
    }

    /// Returns whether a new mailbox was opened
    pub fn open_mailbox(&self, client: &str) -> bool {
        let mut mailboxes = self.mailboxes.lock();
        if mailboxes.contains_key(client) {
            return false;
        }
        mailboxes.insert(client.to_string(), Arc::new(Mailbox::new()));
        true
    }

    pub fn mailbox(&self, client: &str) -> Option<Arc<Mailbox>> {
        self.mailboxes.lock().get(client).cloned()
    }

    pub fn close_mailbox(&self, client: &str) {
        if let Some(mailbox) = self.mailboxes.lock().remove(client) {
            mailbox.close();
        }
    }

    /// Drops the mailbox and consumers of a Client that is no longer a
    /// member, as its host has done already
    pub fn forget_client(&self, client: &str) {
        self.consumers.lock().remove(client);
        self.close_mailbox(client);
    }

    pub fn forget_clients(&self) {
        self.consumers.lock().clear();
        for (_, mailbox) in self.mailboxes.lock().drain() {
            mailbox.close();
        }
    }

    fn deliver(&self, receiver: &str, data: Data) {
        let consumers = self.consumers.lock().get(receiver).cloned();
        match consumers {
            Some(consumers) if !consumers.is_empty() => {
                for consumer in consumers {
                    isolated("channel consumer", || consumer.data_received(&data));
                }
            }
            _ => match self.mailbox(receiver) {
                Some(mailbox) => mailbox.push(data),
                None => debug!(
                    "dropping data for {:?}: no consumer and not receiving",
                    receiver
                ),
            },
        }
    }
}

/// Routes what servers push to this process to the listeners, consumers and
/// mailboxes registered for it
#[derive(Default)]
pub(crate) struct Dispatcher {
    pub sessions: Directory<ListenerSet<dyn SessionListener>>,
    pub channels: Directory<ChannelShared>,
    pub byte_arrays: Directory<ListenerSet<dyn ByteArrayListener>>,
    pub tokens: Directory<ListenerSet<dyn TokenListener>>,
    clients: Mutex<HashMap<String, Vec<Arc<dyn ClientListener>>>>,
    registries: Mutex<HashMap<Endpoint, Vec<Arc<dyn RegistryListener>>>>,
}

impl Dispatcher {
    pub fn dispatch(&self, endpoint: &Endpoint, notification: Notification) {
        trace!("{}: {:?}", endpoint, notification);
        match notification {
            Notification::Session(event) => {
                let path = ResourcePath::session(&event.session);
                if let Some(listeners) = self.sessions.get(endpoint, &path) {
                    listeners.notify(event.kind.mask(), |listener| listener.session_event(&event));
                }
                let destroyed = match (event.kind, &event.resource) {
                    (EventKind::Destroyed, _) => Some(path),
                    (EventKind::ByteArrayDestroyed, Some(name)) => {
                        Some(ResourcePath::child(&event.session, ResourceKind::ByteArray, name))
                    }
                    (EventKind::ChannelDestroyed, Some(name)) => {
                        Some(ResourcePath::child(&event.session, ResourceKind::Channel, name))
                    }
                    (EventKind::TokenDestroyed, Some(name)) => {
                        Some(ResourcePath::child(&event.session, ResourceKind::Token, name))
                    }
                    _ => None,
                };
                if let Some(path) = destroyed {
                    self.forget_destroyed(endpoint, &path);
                }
            }
            Notification::Channel(event) => {
                let path =
                    ResourcePath::child(&event.session, ResourceKind::Channel, &event.channel);
                if let Some(channel) = self.channels.get(endpoint, &path) {
                    channel
                        .listeners
                        .notify(event.kind.mask(), |listener| listener.channel_event(&event));
                }
                if event.kind == EventKind::Destroyed {
                    self.forget_destroyed(endpoint, &path);
                }
            }
            Notification::ByteArray(event) => {
                let path =
                    ResourcePath::child(&event.session, ResourceKind::ByteArray, &event.byte_array);
                if let Some(listeners) = self.byte_arrays.get(endpoint, &path) {
                    listeners.notify(event.kind.mask(), |listener| {
                        listener.byte_array_event(&event)
                    });
                }
                if event.kind == EventKind::Destroyed {
                    self.forget_destroyed(endpoint, &path);
                }
            }
            Notification::Token(event) => {
                let path = ResourcePath::child(&event.session, ResourceKind::Token, &event.token);
                if let Some(listeners) = self.tokens.get(endpoint, &path) {
                    listeners.notify(event.kind.mask(), |listener| listener.token_event(&event));
                }
                if event.kind == EventKind::Destroyed {
                    self.forget_destroyed(endpoint, &path);
                }
            }
            Notification::Client(event) => self.client_event(endpoint, event),
            Notification::Registry(event) => {
                let listeners = self.registries.lock().get(endpoint).cloned();
                for listener in listeners.unwrap_or_default() {
                    isolated("registry listener", || listener.registry_event(&event));
                }
            }
            Notification::Data {
                session,
                channel,
                receiver,
                data,
            } => {
                let path = ResourcePath::child(&session, ResourceKind::Channel, &channel);
                match self.channels.get(endpoint, &path) {
                    Some(shared) => shared.deliver(&receiver, data),
                    None => debug!("{}: data for unknown channel {:?}", endpoint, channel),
                }
            }
        }
    }

    fn client_event(&self, endpoint: &Endpoint, event: ClientEvent) {
        // An expelled client stops receiving on the channels it was
        // expelled from, and its consumers there are gone
        if event.kind == ClientEventKind::Expelled {
            match event.resource_kind {
                ResourceKind::Channel => {
                    let path =
                        ResourcePath::child(&event.session, ResourceKind::Channel, &event.resource);
                    if let Some(channel) = self.channels.get(endpoint, &path) {
                        channel.forget_client(&event.client);
                    }
                }
                ResourceKind::Session => {
                    for channel in self.channels.in_session(endpoint, &event.session) {
                        channel.forget_client(&event.client);
                    }
                }
                _ => {}
            }
        }

        let listeners = self.clients.lock().get(&event.client).cloned();
        for listener in listeners.unwrap_or_default() {
            isolated("client listener", || listener.client_event(&event));
        }
    }

    // Clients

    pub fn add_client_listener(&self, client: &str, listener: Arc<dyn ClientListener>) {
        self.clients
            .lock()
            .entry(client.to_string())
            .or_default()
            .push(listener);
    }

    pub fn remove_client_listener(
        &self,
        client: &str,
        listener: &Arc<dyn ClientListener>,
    ) -> bool {
        let mut clients = self.clients.lock();
        let Some(registered) = clients.get_mut(client) else {
            return false;
        };
        let Some(index) = registered
            .iter()
            .position(|candidate| same_listener(candidate, listener))
        else {
            return false;
        };
        registered.remove(index);
        if registered.is_empty() {
            clients.remove(client);
        }
        true
    }

    // Registries

    pub fn add_registry_listener(&self, endpoint: &Endpoint, listener: Arc<dyn RegistryListener>) {
        self.registries
            .lock()
            .entry(endpoint.clone())
            .or_default()
            .push(listener);
    }

    pub fn remove_registry_listener(
        &self,
        endpoint: &Endpoint,
        listener: &Arc<dyn RegistryListener>,
    ) -> bool {
        let mut registries = self.registries.lock();
        let Some(registered) = registries.get_mut(endpoint) else {
            return false;
        };
        let Some(index) = registered
            .iter()
            .position(|candidate| same_listener(candidate, listener))
        else {
            return false;
        };
        registered.remove(index);
        if registered.is_empty() {
            registries.remove(endpoint);
        }
        true
    }

    // Forgetting

    /// Called once `path` was destroyed from this process: new handles no
    /// longer share its state, and its Channels stop receiving. Events
    /// announcing the destruction are still delivered until
    /// [`Dispatcher::drop_retired`].
    pub fn retire(&self, endpoint: &Endpoint, path: &ResourcePath) {
        let matches = scope(endpoint, path);
        self.sessions.retire(&matches);
        for channel in self.channels.retire(&matches) {
            channel.forget_clients();
        }
        self.byte_arrays.retire(&matches);
        self.tokens.retire(&matches);
    }

    pub fn drop_retired(&self, endpoint: &Endpoint, path: &ResourcePath) {
        let matches = scope(endpoint, path);
        self.sessions.drop_retired(&matches);
        self.channels.drop_retired(&matches);
        self.byte_arrays.drop_retired(&matches);
        self.tokens.drop_retired(&matches);
    }

    /// Drops what this process keeps for a resource its host announced as
    /// destroyed, unless this process destroyed it and retired it already
    fn forget_destroyed(&self, endpoint: &Endpoint, path: &ResourcePath) {
        let session = ResourcePath::session(&path.session);
        let matches = scope(endpoint, path);
        let retired = self.sessions.is_retired(&scope(endpoint, &session))
            || self.channels.is_retired(&matches)
            || self.byte_arrays.is_retired(&matches)
            || self.tokens.is_retired(&matches);
        if retired {
            return;
        }
        debug!("{}: forgetting destroyed {}", endpoint, path);
        self.sessions.remove(&matches);
        for channel in self.channels.remove(&matches) {
            channel.forget_clients();
        }
        self.byte_arrays.remove(&matches);
        self.tokens.remove(&matches);
    }

    /// Drops what is kept for the resources served from `endpoint` once no
    /// Session handle uses them
    pub fn forget_endpoint(&self, endpoint: &Endpoint) {
        let matches = |(candidate, _): &Key| candidate == endpoint;
        let sessions = self.sessions.remove(&matches).len();
        for channel in self.channels.remove(&matches) {
            channel.forget_clients();
        }
        self.byte_arrays.remove(&matches);
        self.tokens.remove(&matches);
        debug!("{}: forgot {} session(s)", endpoint, sessions);
    }

    fn clear_endpoint(&self, endpoint: &Endpoint) {
        self.registries.lock().remove(endpoint);
        self.sessions.clear_endpoint(endpoint);
        for channel in self.channels.clear_endpoint(endpoint) {
            channel.forget_clients();
        }
        self.byte_arrays.clear_endpoint(endpoint);
        self.tokens.clear_endpoint(endpoint);
    }

    // Connections

    /// A connection was closed from this side: nothing more will arrive on it
    pub fn connection_closed(&self, endpoint: &Endpoint) {
        self.clear_endpoint(endpoint);
    }

    /// Registry listeners on a failed connection are told once and then
    /// forgotten
    pub fn connection_failed(&self, connection: &ClientConnection, reason: &str) {
        let endpoint = connection.endpoint();
        let listeners = self.registries.lock().remove(endpoint);
        if let Some(listeners) = listeners {
            debug!("{}: connection failed ({}), telling registry listeners", endpoint, reason);
            let event = RegistryEvent {
                kind: RegistryEventKind::ConnectionFailed,
                url: None,
                client: String::new(),
                address: endpoint.to_string(),
            };
            for listener in listeners {
                isolated("registry listener", || listener.registry_event(&event));
            }
        }
        self.clear_endpoint(endpoint);
    }
}
