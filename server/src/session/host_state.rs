use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::Arc,
};

use jsdt_shared::{
    AuthAction, ByteArrayEvent, ChannelEvent, ChannelMode, ChannelOptions, ConnectionId,
    EventKind, JsdtError, ManagerHandle, ManagerMask, Notification, ResourceKind, ResourcePath,
    SessionEvent, TokenEvent,
};

use super::token::{TokenChange, TokenMachine};
use crate::{connection::ServerConnection, outbox::Outbox};

/// The error reported when `path` names nothing
pub(crate) fn missing(path: &ResourcePath) -> JsdtError {
    match path.kind {
        ResourceKind::Session | ResourceKind::Registry => JsdtError::NoSuchSession {
            name: path.session.clone(),
        },
        ResourceKind::ByteArray => JsdtError::NoSuchByteArray {
            name: path.name.clone(),
        },
        ResourceKind::Channel => JsdtError::NoSuchChannel {
            name: path.name.clone(),
        },
        ResourceKind::Token => JsdtError::NoSuchToken {
            name: path.name.clone(),
        },
    }
}

pub(crate) fn no_such_client(name: &str) -> JsdtError {
    JsdtError::NoSuchClient {
        name: name.to_string(),
    }
}

pub(crate) struct Member {
    pub connection: ConnectionId,
    pub mode: ChannelMode,
}

/// What every manageable resource has: members, an optional manager and
/// the connections listening to it
pub(crate) struct Resource {
    pub path: ResourcePath,
    pub members: BTreeMap<String, Member>,
    pub manager: Option<ManagerHandle>,
    pub manager_mask: ManagerMask,
    // Listener registrations per connection
    pub listeners: HashMap<ConnectionId, usize>,
}

impl Resource {
    pub fn new(path: ResourcePath, manager: Option<ManagerHandle>) -> Self {
        Self {
            path,
            members: BTreeMap::new(),
            manager,
            manager_mask: ManagerMask::all(),
            listeners: HashMap::new(),
        }
    }

    pub fn is_member(&self, client: &str) -> bool {
        self.members.contains_key(client)
    }

    /// The manager to consult for `action`, if there is one and its event
    /// mask selects the action
    pub fn consulted(&self, action: AuthAction) -> Option<ManagerHandle> {
        self.manager
            .as_ref()
            .filter(|_| self.manager_mask.contains(action.mask()))
            .cloned()
    }

    /// Managers can only be attached when a resource is created. Asking for
    /// one on an existing resource fails unless it is the one attached.
    pub fn check_manager(&self, requested: Option<&ManagerHandle>) -> Result<(), JsdtError> {
        let Some(requested) = requested else {
            return Ok(());
        };
        match &self.manager {
            None => Err(JsdtError::denied(format!(
                "{} already exists without a manager",
                self.path
            ))),
            Some(existing) if existing.is_same(requested) => Ok(()),
            Some(_) => Err(JsdtError::ManagerExists {
                name: self.path.name.clone(),
            }),
        }
    }

    pub fn set_manager_events(
        &mut self,
        manager: &ManagerHandle,
        mask: ManagerMask,
        enable: bool,
    ) -> Result<(), JsdtError> {
        match &self.manager {
            Some(existing) if existing.is_same(manager) => {
                self.manager_mask.set(mask, enable);
                Ok(())
            }
            _ => Err(JsdtError::NoSuchManager {
                name: self.path.name.clone(),
            }),
        }
    }

    pub fn add_listener(&mut self, connection: ConnectionId) {
        *self.listeners.entry(connection).or_insert(0) += 1;
    }

    pub fn remove_listener(&mut self, connection: ConnectionId) -> Result<(), JsdtError> {
        let count = self
            .listeners
            .get_mut(&connection)
            .ok_or(JsdtError::NoSuchListener)?;
        *count -= 1;
        if *count == 0 {
            self.listeners.remove(&connection);
        }
        Ok(())
    }

    /// The resource event of `kind` caused by `client`
    pub fn event(&self, kind: EventKind, client: &str) -> Notification {
        let session = self.path.session.clone();
        let client = client.to_string();
        match self.path.kind {
            ResourceKind::Session | ResourceKind::Registry => Notification::Session(SessionEvent {
                session,
                client,
                kind,
                resource: None,
            }),
            ResourceKind::Channel => Notification::Channel(ChannelEvent {
                session,
                channel: self.path.name.clone(),
                client,
                kind,
            }),
            ResourceKind::ByteArray => Notification::ByteArray(ByteArrayEvent {
                session,
                byte_array: self.path.name.clone(),
                client,
                kind,
                value: None,
            }),
            ResourceKind::Token => Notification::Token(TokenEvent {
                session,
                token: self.path.name.clone(),
                client,
                kind,
                recipient: None,
            }),
        }
    }

    pub fn announce(&self, outbox: &mut Outbox, notification: Notification) {
        outbox.to_listeners(self.listeners.keys(), &notification);
    }

    /// Drops `client` from the members and tells listeners with `kind`.
    /// Returns false if it was not a member.
    pub fn evict(&mut self, client: &str, kind: EventKind, outbox: &mut Outbox) -> bool {
        if self.members.remove(client).is_none() {
            return false;
        }
        let event = self.event(kind, client);
        self.announce(outbox, event);
        true
    }
}

pub(crate) struct ByteArrayRecord {
    pub resource: Resource,
    pub value: Vec<u8>,
}

pub(crate) struct ChannelRecord {
    pub resource: Resource,
    pub options: ChannelOptions,
    // Members with at least one consumer registered
    pub consumers: BTreeSet<String>,
}

pub(crate) struct TokenRecord {
    pub resource: Resource,
    pub machine: TokenMachine,
}

impl TokenRecord {
    pub fn announce_change(&self, outbox: &mut Outbox, change: TokenChange) {
        let notification = Notification::Token(TokenEvent {
            session: self.resource.path.session.clone(),
            token: self.resource.path.name.clone(),
            client: change.client,
            kind: change.kind,
            recipient: change.recipient,
        });
        self.resource.announce(outbox, notification);
    }
}

pub(crate) struct SessionRecord {
    pub resource: Resource,
    pub byte_arrays: BTreeMap<String, ByteArrayRecord>,
    pub channels: BTreeMap<String, ChannelRecord>,
    pub tokens: BTreeMap<String, TokenRecord>,
}

impl SessionRecord {
    pub fn new(name: &str, manager: Option<ManagerHandle>) -> Self {
        Self {
            resource: Resource::new(ResourcePath::session(name), manager),
            byte_arrays: BTreeMap::new(),
            channels: BTreeMap::new(),
            tokens: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.resource.path.session
    }

    pub fn child(&self, kind: ResourceKind, name: &str) -> Option<&Resource> {
        match kind {
            ResourceKind::ByteArray => self.byte_arrays.get(name).map(|record| &record.resource),
            ResourceKind::Channel => self.channels.get(name).map(|record| &record.resource),
            ResourceKind::Token => self.tokens.get(name).map(|record| &record.resource),
            ResourceKind::Session | ResourceKind::Registry => None,
        }
    }

    pub fn child_mut(&mut self, kind: ResourceKind, name: &str) -> Option<&mut Resource> {
        match kind {
            ResourceKind::ByteArray => self
                .byte_arrays
                .get_mut(name)
                .map(|record| &mut record.resource),
            ResourceKind::Channel => self
                .channels
                .get_mut(name)
                .map(|record| &mut record.resource),
            ResourceKind::Token => self.tokens.get_mut(name).map(|record| &mut record.resource),
            ResourceKind::Session | ResourceKind::Registry => None,
        }
    }

    pub fn children(&self) -> impl Iterator<Item = &Resource> {
        self.byte_arrays
            .values()
            .map(|record| &record.resource)
            .chain(self.channels.values().map(|record| &record.resource))
            .chain(self.tokens.values().map(|record| &record.resource))
    }

    pub fn children_mut(&mut self) -> impl Iterator<Item = &mut Resource> {
        self.byte_arrays
            .values_mut()
            .map(|record| &mut record.resource)
            .chain(self.channels.values_mut().map(|record| &mut record.resource))
            .chain(self.tokens.values_mut().map(|record| &mut record.resource))
    }

    /// Sorted names of the children of `kind`
    pub fn names(&self, kind: ResourceKind) -> Vec<String> {
        match kind {
            ResourceKind::ByteArray => self.byte_arrays.keys().cloned().collect(),
            ResourceKind::Channel => self.channels.keys().cloned().collect(),
            ResourceKind::Token => self.tokens.keys().cloned().collect(),
            ResourceKind::Session | ResourceKind::Registry => Vec::new(),
        }
    }

    pub fn insert_child(
        &mut self,
        kind: ResourceKind,
        name: &str,
        options: ChannelOptions,
        manager: Option<ManagerHandle>,
    ) {
        let resource = Resource::new(ResourcePath::child(self.name(), kind, name), manager);
        match kind {
            ResourceKind::ByteArray => {
                self.byte_arrays.insert(
                    name.to_string(),
                    ByteArrayRecord {
                        resource,
                        value: vec![0],
                    },
                );
            }
            ResourceKind::Channel => {
                self.channels.insert(
                    name.to_string(),
                    ChannelRecord {
                        resource,
                        options,
                        consumers: BTreeSet::new(),
                    },
                );
            }
            ResourceKind::Token => {
                self.tokens.insert(
                    name.to_string(),
                    TokenRecord {
                        resource,
                        machine: TokenMachine::new(name),
                    },
                );
            }
            ResourceKind::Session | ResourceKind::Registry => {}
        }
    }

    pub fn remove_child(&mut self, kind: ResourceKind, name: &str) -> Option<Resource> {
        match kind {
            ResourceKind::ByteArray => self.byte_arrays.remove(name).map(|record| record.resource),
            ResourceKind::Channel => self.channels.remove(name).map(|record| record.resource),
            ResourceKind::Token => self.tokens.remove(name).map(|record| record.resource),
            ResourceKind::Session | ResourceKind::Registry => None,
        }
    }

    /// Session event announcing a child resource was created or destroyed
    pub fn child_event(&self, kind: EventKind, client: &str, child: &str) -> Notification {
        Notification::Session(SessionEvent {
            session: self.name().to_string(),
            client: client.to_string(),
            kind,
            resource: Some(child.to_string()),
        })
    }

    /// Removes `client` from one child resource, releasing whatever it held
    pub fn evict_from_child(
        &mut self,
        kind: ResourceKind,
        name: &str,
        client: &str,
        event: EventKind,
        outbox: &mut Outbox,
    ) -> Result<(), JsdtError> {
        let path = ResourcePath::child(self.name(), kind, name);
        let evicted = match kind {
            ResourceKind::ByteArray => {
                let record = self.byte_arrays.get_mut(name).ok_or_else(|| missing(&path))?;
                record.resource.evict(client, event, outbox)
            }
            ResourceKind::Channel => {
                let record = self.channels.get_mut(name).ok_or_else(|| missing(&path))?;
                record.consumers.remove(client);
                record.resource.evict(client, event, outbox)
            }
            ResourceKind::Token => {
                let record = self.tokens.get_mut(name).ok_or_else(|| missing(&path))?;
                if record.resource.is_member(client) {
                    if let Some(change) = record.machine.remove_client(client) {
                        record.announce_change(outbox, change);
                    }
                }
                record.resource.evict(client, event, outbox)
            }
            ResourceKind::Session | ResourceKind::Registry => return Err(missing(&path)),
        };
        if evicted {
            Ok(())
        } else {
            Err(no_such_client(client))
        }
    }

    /// Removes `client` from the Session and from every child it joined
    pub fn evict(&mut self, client: &str, event: EventKind, outbox: &mut Outbox) -> bool {
        if !self.resource.is_member(client) {
            return false;
        }
        let joined: Vec<(ResourceKind, String)> = self
            .children()
            .filter(|child| child.is_member(client))
            .map(|child| (child.path.kind, child.path.name.clone()))
            .collect();
        for (kind, name) in joined {
            let _ = self.evict_from_child(kind, &name, client, event, outbox);
        }
        self.resource.evict(client, event, outbox)
    }
}

/// Everything a Session host serves
#[derive(Default)]
pub(crate) struct HostState {
    pub sessions: HashMap<String, SessionRecord>,
    // Clients registered through the client factory
    pub clients: HashMap<String, ConnectionId>,
    pub connections: HashMap<ConnectionId, Arc<ServerConnection>>,
}

impl HostState {
    pub fn session(&self, name: &str) -> Result<&SessionRecord, JsdtError> {
        self.sessions
            .get(name)
            .ok_or_else(|| missing(&ResourcePath::session(name)))
    }

    pub fn session_mut(&mut self, name: &str) -> Result<&mut SessionRecord, JsdtError> {
        self.sessions
            .get_mut(name)
            .ok_or_else(|| missing(&ResourcePath::session(name)))
    }

    pub fn resource(&self, path: &ResourcePath) -> Result<&Resource, JsdtError> {
        let session = self.session(&path.session)?;
        if path.is_session() {
            return Ok(&session.resource);
        }
        session.child(path.kind, &path.name).ok_or_else(|| missing(path))
    }

    pub fn resource_mut(&mut self, path: &ResourcePath) -> Result<&mut Resource, JsdtError> {
        let session = self.session_mut(&path.session)?;
        if path.is_session() {
            return Ok(&mut session.resource);
        }
        session
            .child_mut(path.kind, &path.name)
            .ok_or_else(|| missing(path))
    }

    /// The connection a Client can be reached on: where it registered, or
    /// where it joined the Session from
    pub fn locate_client(&self, session: &str, client: &str) -> Option<ConnectionId> {
        self.clients.get(client).copied().or_else(|| {
            self.sessions
                .get(session)
                .and_then(|record| record.resource.members.get(client))
                .map(|member| member.connection)
        })
    }

    pub fn flush(&self, outbox: Outbox) {
        outbox.flush(&self.connections);
    }
}
