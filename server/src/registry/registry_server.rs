use std::{
    collections::{hash_map::Entry, HashMap},
    sync::Arc,
};

use log::info;
use parking_lot::Mutex;

use jsdt_shared::{
    transport::{Endpoint, Transport, TransportError},
    AuthAction, AuthenticationInfo, ConnectionId, JsdtError, ManagerHandle, Notification,
    ObjectType, RegistryEvent, RegistryEventKind, Reply, Request, ResourceKind, ResourceUrl,
};

use crate::{
    connection::{ClientProxy, Host, RequestHandler, ServerConnection},
    outbox::Outbox,
    ServerConfig,
};

/// The naming Registry for one host:port. Keeps the bound Session and Client
/// URLs and tells registry listeners about changes.
pub struct RegistryServer {
    host: Host,
    registry: Arc<Registry>,
}

impl RegistryServer {
    /// Starts a Registry on `endpoint`. A Registry started without a manager
    /// stays unmanaged for its whole life.
    pub fn start(
        transport: Arc<dyn Transport>,
        endpoint: Endpoint,
        config: ServerConfig,
        manager: Option<ManagerHandle>,
    ) -> Result<Self, TransportError> {
        let registry = Arc::new(Registry {
            config,
            address: endpoint.to_string(),
            manager,
            state: Mutex::new(RegistryState::default()),
        });
        let host = Host::start(transport, endpoint, registry.clone())?;
        Ok(Self { host, registry })
    }

    pub fn endpoint(&self) -> &Endpoint {
        self.host.endpoint()
    }

    pub fn is_managed(&self) -> bool {
        self.registry.manager.is_some()
    }

    /// Every bound URL, in text order
    pub fn bound(&self) -> Vec<ResourceUrl> {
        self.registry.state.lock().sorted_urls()
    }

    pub fn stop(&self) {
        self.host.stop();
    }
}

#[derive(Default)]
struct RegistryState {
    // Bound URL keyed by its resolved form, valued by the text it was bound with
    bindings: HashMap<ResourceUrl, ResourceUrl>,
    // Listener registrations per connection
    listeners: HashMap<ConnectionId, usize>,
    connections: HashMap<ConnectionId, Arc<ServerConnection>>,
}

impl RegistryState {
    fn sorted_urls(&self) -> Vec<ResourceUrl> {
        let mut urls: Vec<ResourceUrl> = self.bindings.values().cloned().collect();
        urls.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        urls
    }
}

struct Registry {
    config: ServerConfig,
    address: String,
    manager: Option<ManagerHandle>,
    state: Mutex<RegistryState>,
}

impl Registry {
    fn authorize(
        &self,
        connection: &ServerConnection,
        client: &str,
        action: AuthAction,
        url: &ResourceUrl,
    ) -> Result<(), JsdtError> {
        let Some(manager) = &self.manager else {
            return Ok(());
        };
        let info = AuthenticationInfo::new("", action, url.object_name(), ResourceKind::Registry);
        let proxy = ClientProxy::new(client, connection, self.config.authentication_time);
        if proxy.authorize(manager, info) {
            Ok(())
        } else {
            Err(JsdtError::denied(format!(
                "registry manager refused {:?} of {} for {:?}",
                action, url, client
            )))
        }
    }

    fn event(&self, kind: RegistryEventKind, url: &ResourceUrl, client: &str) -> Notification {
        Notification::Registry(RegistryEvent {
            kind,
            url: Some(url.clone()),
            client: client.to_string(),
            address: self.address.clone(),
        })
    }

    fn bind(
        &self,
        connection: &ServerConnection,
        url: ResourceUrl,
        client: String,
    ) -> Result<Reply, JsdtError> {
        url.validated()?;
        if self.state.lock().bindings.contains_key(&url) {
            return Err(JsdtError::AlreadyBound {
                url: url.to_string(),
            });
        }

        let (action, kind) = match url.object_type() {
            ObjectType::Session => (AuthAction::CreateSession, RegistryEventKind::SessionCreated),
            ObjectType::Client => (AuthAction::CreateClient, RegistryEventKind::ClientCreated),
        };
        self.authorize(connection, &client, action, &url)?;

        let mut state = self.state.lock();
        match state.bindings.entry(url.clone()) {
            Entry::Occupied(_) => {
                return Err(JsdtError::AlreadyBound {
                    url: url.to_string(),
                })
            }
            Entry::Vacant(vacant) => {
                vacant.insert(url.clone());
            }
        }
        info!("{}: bound {} for {:?}", self.address, url, client);

        let mut outbox = Outbox::new();
        outbox.to_listeners(state.listeners.keys(), &self.event(kind, &url, &client));
        outbox.flush(&state.connections);
        Ok(Reply::Done)
    }

    fn unbind(
        &self,
        connection: &ServerConnection,
        url: ResourceUrl,
        client: String,
    ) -> Result<Reply, JsdtError> {
        url.validated()?;
        if !self.state.lock().bindings.contains_key(&url) {
            return Err(JsdtError::NotBound {
                url: url.to_string(),
            });
        }

        let (action, kind) = match url.object_type() {
            ObjectType::Session => (
                AuthAction::DestroySession,
                RegistryEventKind::SessionDestroyed,
            ),
            ObjectType::Client => (AuthAction::DestroyClient, RegistryEventKind::ClientDestroyed),
        };
        self.authorize(connection, &client, action, &url)?;

        let mut state = self.state.lock();
        if state.bindings.remove(&url).is_none() {
            return Err(JsdtError::NotBound {
                url: url.to_string(),
            });
        }
        info!("{}: unbound {} for {:?}", self.address, url, client);

        let mut outbox = Outbox::new();
        outbox.to_listeners(state.listeners.keys(), &self.event(kind, &url, &client));
        outbox.flush(&state.connections);
        Ok(Reply::Done)
    }

    fn lookup(&self, url: ResourceUrl) -> Result<Reply, JsdtError> {
        url.validated()?;
        let state = self.state.lock();
        let bound = state.bindings.get(&url).ok_or_else(|| JsdtError::NotBound {
            url: url.to_string(),
        })?;
        Ok(Reply::Url(bound.clone()))
    }
}

impl RequestHandler for Registry {
    fn connected(&self, connection: &Arc<ServerConnection>) {
        self.state
            .lock()
            .connections
            .insert(connection.id(), connection.clone());
    }

    fn handle(
        &self,
        connection: &Arc<ServerConnection>,
        request: Request,
    ) -> Result<Reply, JsdtError> {
        match request {
            Request::Ping => Ok(Reply::Pong { registry: true }),
            Request::Bind { url, client } => self.bind(connection, url, client),
            Request::Unbind { url, client } => self.unbind(connection, url, client),
            Request::Lookup { url } => self.lookup(url),
            Request::List => Ok(Reply::Urls(self.state.lock().sorted_urls())),
            Request::AddRegistryListener => {
                *self
                    .state
                    .lock()
                    .listeners
                    .entry(connection.id())
                    .or_insert(0) += 1;
                Ok(Reply::Done)
            }
            Request::RemoveRegistryListener => {
                let mut state = self.state.lock();
                match state.listeners.get_mut(&connection.id()) {
                    Some(count) => {
                        *count -= 1;
                        if *count == 0 {
                            state.listeners.remove(&connection.id());
                        }
                        Ok(Reply::Done)
                    }
                    None => Err(JsdtError::NoSuchListener),
                }
            }
            other => Err(JsdtError::connection(format!(
                "a registry cannot serve {} requests",
                other.name()
            ))),
        }
    }

    fn disconnected(&self, connection: ConnectionId) {
        let mut state = self.state.lock();
        state.listeners.remove(&connection);
        state.connections.remove(&connection);
    }
}
