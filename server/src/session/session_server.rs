use std::{
    collections::hash_map::Entry,
    sync::{Arc, Weak},
};

use log::{debug, info};
use parking_lot::Mutex;

use jsdt_shared::{
    transport::{Endpoint, Transport, TransportError},
    AuthAction, AuthenticationInfo, ChannelOptions, ConnectionId, EventKind, JsdtError,
    ManagerHandle, Reply, Request, ResourceKind, ResourcePath,
};

use super::host_state::{no_such_client, HostState, SessionRecord};
use crate::{
    connection::{ClientProxy, Host, RequestHandler, ServerConnection},
    outbox::Outbox,
    ServerConfig,
};

/// Hosts Sessions and their ByteArrays, Channels and Tokens. This is the
/// single authority for every resource it serves: clients only ever change
/// them by sending requests here.
pub struct SessionServer {
    host: Host,
    sessions: Arc<SessionHost>,
}

impl SessionServer {
    pub fn start(
        transport: Arc<dyn Transport>,
        endpoint: Endpoint,
        config: ServerConfig,
    ) -> Result<Self, TransportError> {
        let address = endpoint.to_string();
        let sessions = Arc::new_cyclic(|this| SessionHost {
            config,
            address,
            state: Mutex::new(HostState::default()),
            this: this.clone(),
        });
        let host = Host::start(transport, endpoint, sessions.clone())?;
        Ok(Self { host, sessions })
    }

    pub fn endpoint(&self) -> &Endpoint {
        self.host.endpoint()
    }

    pub fn connection_count(&self) -> usize {
        self.host.connection_count()
    }

    pub fn stop(&self) {
        self.host.stop();
    }
}

pub(super) struct SessionHost {
    pub(super) config: ServerConfig,
    pub(super) address: String,
    pub(super) state: Mutex<HostState>,
    pub(super) this: Weak<SessionHost>,
}

impl SessionHost {
    /// Runs every manager in `managers` against `client`. All of them have
    /// to grant the action.
    pub(super) fn authorize(
        &self,
        connection: &ServerConnection,
        client: &str,
        managers: Vec<ManagerHandle>,
        info: AuthenticationInfo,
    ) -> Result<(), JsdtError> {
        if managers.is_empty() {
            return Ok(());
        }
        let proxy = ClientProxy::new(client, connection, self.config.authentication_time);
        for manager in managers {
            if !proxy.authorize(&manager, info.clone()) {
                return Err(JsdtError::denied(format!(
                    "{:?} of {} {:?} refused for {:?}",
                    info.action(),
                    info.kind(),
                    info.name(),
                    client
                )));
            }
        }
        Ok(())
    }

    // Clients

    fn register_client(
        &self,
        connection: &ServerConnection,
        client: String,
    ) -> Result<Reply, JsdtError> {
        let mut state = self.state.lock();
        match state.clients.entry(client) {
            Entry::Occupied(entry) if *entry.get() != connection.id() => {
                Err(JsdtError::NameInUse {
                    name: entry.key().clone(),
                })
            }
            Entry::Occupied(_) => Ok(Reply::Done),
            Entry::Vacant(entry) => {
                debug!("{}: registered client {:?}", self.address, entry.key());
                entry.insert(connection.id());
                Ok(Reply::Done)
            }
        }
    }

    fn unregister_client(
        &self,
        connection: &ServerConnection,
        client: String,
    ) -> Result<Reply, JsdtError> {
        let mut state = self.state.lock();
        match state.clients.get(&client) {
            Some(owner) if *owner == connection.id() => {
                state.clients.remove(&client);
                Ok(Reply::Done)
            }
            _ => Err(no_such_client(&client)),
        }
    }

    // Creation

    fn create_session(
        &self,
        session: String,
        client: String,
        manager: Option<ManagerHandle>,
    ) -> Result<Reply, JsdtError> {
        let mut state = self.state.lock();
        match state.sessions.entry(session) {
            Entry::Occupied(entry) => {
                entry.get().resource.check_manager(manager.as_ref())?;
                Ok(Reply::Created { existed: true })
            }
            Entry::Vacant(entry) => {
                info!(
                    "{}: session {:?} created by {:?}{}",
                    self.address,
                    entry.key(),
                    client,
                    if manager.is_some() { " (managed)" } else { "" }
                );
                let record = SessionRecord::new(entry.key(), manager);
                entry.insert(record);
                Ok(Reply::Created { existed: false })
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn create_resource(
        &self,
        connection: &ServerConnection,
        session: String,
        kind: ResourceKind,
        name: String,
        client: String,
        options: ChannelOptions,
        manager: Option<ManagerHandle>,
    ) -> Result<Reply, JsdtError> {
        let path = ResourcePath::child(&session, kind, &name);
        let consulted = {
            let state = self.state.lock();
            let record = state.session(&session)?;
            if !record.resource.is_member(&client) {
                return Err(no_such_client(&client));
            }
            if let Some(existing) = record.child(kind, &name) {
                existing.check_manager(manager.as_ref())?;
                return Ok(Reply::Created { existed: true });
            }
            record.resource.consulted(AuthAction::create(kind))
        };

        if let Some(session_manager) = consulted {
            let info = AuthenticationInfo::new(&session, AuthAction::create(kind), &name, kind);
            self.authorize(connection, &client, vec![session_manager], info)?;
        }

        let mut state = self.state.lock();
        let record = state.session_mut(&session)?;
        if !record.resource.is_member(&client) {
            return Err(no_such_client(&client));
        }
        // A racing creator may have won while the manager was consulted
        if let Some(existing) = record.child(kind, &name) {
            existing.check_manager(manager.as_ref())?;
            return Ok(Reply::Created { existed: true });
        }

        info!(
            "{}: {} created by {:?}{}",
            self.address,
            path,
            client,
            if manager.is_some() { " (managed)" } else { "" }
        );
        record.insert_child(kind, &name, options, manager);

        let mut outbox = Outbox::new();
        if let Some(created) = EventKind::created(kind) {
            let event = record.child_event(created, &client, &name);
            record.resource.announce(&mut outbox, event);
        }
        state.flush(outbox);
        Ok(Reply::Created { existed: false })
    }

    // Queries

    fn exists(&self, path: &ResourcePath) -> Result<Reply, JsdtError> {
        let state = self.state.lock();
        if path.is_session() {
            return Ok(Reply::Flag(state.sessions.contains_key(&path.session)));
        }
        let record = state.session(&path.session)?;
        Ok(Reply::Flag(record.child(path.kind, &path.name).is_some()))
    }

    fn joined_names(
        &self,
        session: &str,
        kind: ResourceKind,
        client: &str,
    ) -> Result<Reply, JsdtError> {
        let state = self.state.lock();
        let record = state.session(session)?;
        let names = record
            .children()
            .filter(|child| child.path.kind == kind && child.is_member(client))
            .map(|child| child.path.name.clone())
            .collect();
        Ok(Reply::Names(names))
    }

    // Give timeouts

    pub(super) fn schedule_give_timeout(&self, session: &str, token: &str, generation: u64) {
        let host = self.this.clone();
        let give_time = self.config.give_time;
        let session = session.to_string();
        let token = token.to_string();
        std::thread::spawn(move || {
            std::thread::sleep(give_time);
            if let Some(host) = host.upgrade() {
                host.give_timed_out(&session, &token, generation);
            }
        });
    }

    fn give_timed_out(&self, session: &str, token: &str, generation: u64) {
        let mut state = self.state.lock();
        let Some(record) = state
            .sessions
            .get_mut(session)
            .and_then(|record| record.tokens.get_mut(token))
        else {
            return;
        };
        if record.machine.revert_give(generation) {
            info!(
                "{}: give of token {:?} in session {:?} timed out, returned to {:?}",
                self.address,
                token,
                session,
                record.machine.holders()
            );
        }
    }
}

impl RequestHandler for SessionHost {
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
            Request::Ping => Ok(Reply::Pong { registry: false }),

            // Clients
            Request::RegisterClient { client } => self.register_client(connection, client),
            Request::UnregisterClient { client } => self.unregister_client(connection, client),

            // Creation
            Request::CreateSession {
                session,
                client,
                manager,
            } => self.create_session(session, client, manager),
            Request::CreateResource {
                session,
                kind,
                name,
                client,
                options,
                manager,
            } => self.create_resource(connection, session, kind, name, client, options, manager),

            // Queries
            Request::Exists { path } => self.exists(&path),
            Request::IsManaged { path } => {
                let state = self.state.lock();
                Ok(Reply::Flag(state.resource(&path)?.manager.is_some()))
            }
            Request::ListNames { session, kind } => {
                let state = self.state.lock();
                Ok(Reply::Names(state.session(&session)?.names(kind)))
            }
            Request::JoinedNames {
                session,
                kind,
                client,
            } => self.joined_names(&session, kind, &client),

            // Manageable
            Request::Join { path, client, mode } => self.join(connection, path, client, mode),
            Request::Leave { path, client } => self.leave(path, client),
            Request::Invite {
                path,
                client,
                invitees,
            } => self.invite(path, client, invitees),
            Request::Expel {
                path,
                client,
                expellees,
            } => self.expel(path, client, expellees),
            Request::Destroy { path, client } => self.destroy(connection, path, client),
            Request::ListClients { path } => {
                let state = self.state.lock();
                let members = state.resource(&path)?.members.keys().cloned().collect();
                Ok(Reply::Names(members))
            }
            Request::AddListener { path } => {
                self.state.lock().resource_mut(&path)?.add_listener(connection.id());
                Ok(Reply::Done)
            }
            Request::RemoveListener { path } => {
                self.state
                    .lock()
                    .resource_mut(&path)?
                    .remove_listener(connection.id())?;
                Ok(Reply::Done)
            }
            Request::SetManagerEvents {
                path,
                manager,
                mask,
                enable,
            } => {
                self.state
                    .lock()
                    .resource_mut(&path)?
                    .set_manager_events(&manager, mask, enable)?;
                Ok(Reply::Done)
            }

            // Channel
            Request::ChannelOptions { session, channel } => self.channel_options(session, channel),
            Request::Send {
                session,
                channel,
                sender,
                delivery,
                data,
            } => self.send(session, channel, sender, delivery, data),
            Request::AddConsumer {
                session,
                channel,
                client,
            } => self.add_consumer(session, channel, client),
            Request::RemoveConsumer {
                session,
                channel,
                client,
            } => self.remove_consumer(session, channel, client),

            // ByteArray
            Request::GetValue { session, name } => self.get_value(session, name),
            Request::SetValue {
                session,
                name,
                client,
                value,
            } => self.set_value(session, name, client, value),

            // Token
            Request::Grab {
                session,
                token,
                client,
                exclusive,
            } => self.grab(session, token, client, exclusive),
            Request::Release {
                session,
                token,
                client,
            } => self.release(session, token, client),
            Request::Give {
                session,
                token,
                client,
                recipient,
            } => self.give(session, token, client, recipient),
            Request::RequestToken {
                session,
                token,
                client,
            } => self.request(session, token, client),
            Request::Test { session, token } => self.test(session, token),
            Request::ListHolders { session, token } => self.list_holders(session, token),

            other => Err(JsdtError::connection(format!(
                "a session host cannot serve {} requests",
                other.name()
            ))),
        }
    }

    fn disconnected(&self, connection: ConnectionId) {
        let mut state = self.state.lock();
        let mut outbox = Outbox::new();

        state.clients.retain(|_, owner| *owner != connection);
        for record in state.sessions.values_mut() {
            let departed: Vec<String> = record
                .resource
                .members
                .iter()
                .filter(|(_, member)| member.connection == connection)
                .map(|(name, _)| name.clone())
                .collect();
            for client in departed {
                debug!(
                    "{}: {:?} left session {:?} on disconnect",
                    self.address,
                    client,
                    record.name()
                );
                record.evict(&client, EventKind::Left, &mut outbox);
            }
            record.resource.listeners.remove(&connection);
            for child in record.children_mut() {
                child.listeners.remove(&connection);
            }
        }

        state.connections.remove(&connection);
        state.flush(outbox);
    }
}
