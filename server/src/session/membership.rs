use std::{collections::BTreeSet, sync::Arc};

use log::info;

use jsdt_shared::{
    AuthAction, AuthenticationInfo, ChannelMode, ClientEvent, ClientEventKind, ConnectionId,
    EventKind, JsdtError, ManagerHandle, Notification, Reply, ResourcePath,
};

use super::{
    host_state::{missing, no_such_client, Member},
    session_server::SessionHost,
};
use crate::{connection::ServerConnection, outbox::Outbox};

fn client_event(
    path: &ResourcePath,
    client: &str,
    from: &str,
    kind: ClientEventKind,
) -> Notification {
    Notification::Client(ClientEvent {
        session: path.session.clone(),
        resource: path.name.clone(),
        resource_kind: path.kind,
        client: client.to_string(),
        from: from.to_string(),
        kind,
    })
}

impl SessionHost {
    pub(super) fn join(
        &self,
        connection: &Arc<ServerConnection>,
        path: ResourcePath,
        client: String,
        mode: ChannelMode,
    ) -> Result<Reply, JsdtError> {
        let manager = {
            let state = self.state.lock();
            let resource = state.resource(&path)?;
            if !path.is_session() && !state.session(&path.session)?.resource.is_member(&client) {
                return Err(no_such_client(&client));
            }
            if resource.is_member(&client) {
                return Err(JsdtError::NameInUse { name: client });
            }
            resource.consulted(AuthAction::Join)
        };

        if let Some(manager) = manager {
            let info =
                AuthenticationInfo::new(&path.session, AuthAction::Join, &path.name, path.kind);
            self.authorize(connection, &client, vec![manager], info)?;
        }

        let mut state = self.state.lock();
        if !path.is_session() && !state.session(&path.session)?.resource.is_member(&client) {
            return Err(no_such_client(&client));
        }
        let resource = state.resource_mut(&path)?;
        if resource.is_member(&client) {
            return Err(JsdtError::NameInUse { name: client });
        }
        resource.members.insert(
            client.clone(),
            Member {
                connection: connection.id(),
                mode,
            },
        );
        info!("{}: {:?} joined {}", self.address, client, path);

        let mut outbox = Outbox::new();
        let event = resource.event(EventKind::Joined, &client);
        resource.announce(&mut outbox, event);
        state.flush(outbox);
        Ok(Reply::Done)
    }

    pub(super) fn leave(&self, path: ResourcePath, client: String) -> Result<Reply, JsdtError> {
        let mut state = self.state.lock();
        let mut outbox = Outbox::new();
        let record = state.session_mut(&path.session)?;
        if path.is_session() {
            if !record.evict(&client, EventKind::Left, &mut outbox) {
                return Err(no_such_client(&client));
            }
        } else {
            record.evict_from_child(path.kind, &path.name, &client, EventKind::Left, &mut outbox)?;
        }
        info!("{}: {:?} left {}", self.address, client, path);
        state.flush(outbox);
        Ok(Reply::Done)
    }

    pub(super) fn invite(
        &self,
        path: ResourcePath,
        client: String,
        invitees: Vec<String>,
    ) -> Result<Reply, JsdtError> {
        let state = self.state.lock();
        let resource = state.resource(&path)?;
        let mut targets: Vec<(String, ConnectionId)> = Vec::with_capacity(invitees.len());
        for invitee in invitees {
            let connection = state
                .locate_client(&path.session, &invitee)
                .ok_or_else(|| no_such_client(&invitee))?;
            targets.push((invitee, connection));
        }

        let mut outbox = Outbox::new();
        for (invitee, connection) in targets {
            resource.announce(&mut outbox, resource.event(EventKind::Invited, &invitee));
            outbox.push(
                connection,
                client_event(&path, &invitee, &client, ClientEventKind::Invited),
            );
        }
        state.flush(outbox);
        Ok(Reply::Done)
    }

    pub(super) fn expel(
        &self,
        path: ResourcePath,
        client: String,
        expellees: Vec<String>,
    ) -> Result<Reply, JsdtError> {
        let expellees: BTreeSet<String> = expellees.into_iter().collect();
        let mut state = self.state.lock();
        let targets: Vec<(String, ConnectionId)> = {
            let resource = state.resource(&path)?;
            let mut targets = Vec::with_capacity(expellees.len());
            for expellee in expellees {
                let member = resource
                    .members
                    .get(&expellee)
                    .ok_or_else(|| no_such_client(&expellee))?;
                let connection = member.connection;
                targets.push((expellee, connection));
            }
            targets
        };

        let mut outbox = Outbox::new();
        let record = state.session_mut(&path.session)?;
        for (expellee, connection) in targets {
            if path.is_session() {
                record.evict(&expellee, EventKind::Expelled, &mut outbox);
            } else {
                record.evict_from_child(
                    path.kind,
                    &path.name,
                    &expellee,
                    EventKind::Expelled,
                    &mut outbox,
                )?;
            }
            outbox.push(
                connection,
                client_event(&path, &expellee, &client, ClientEventKind::Expelled),
            );
            info!("{}: {:?} expelled {:?} from {}", self.address, client, expellee, path);
        }
        state.flush(outbox);
        Ok(Reply::Done)
    }

    pub(super) fn destroy(
        &self,
        connection: &Arc<ServerConnection>,
        path: ResourcePath,
        client: String,
    ) -> Result<Reply, JsdtError> {
        let action = AuthAction::destroy(path.kind);
        let managers = {
            let state = self.state.lock();
            let session = state.session(&path.session)?;
            let resource = state.resource(&path)?;
            let mut managers: Vec<ManagerHandle> = Vec::new();
            managers.extend(resource.consulted(action));
            if !path.is_session() {
                if !session.resource.is_member(&client) {
                    return Err(no_such_client(&client));
                }
                if let Some(session_manager) = session.resource.consulted(action) {
                    if !managers.iter().any(|manager| manager.is_same(&session_manager)) {
                        managers.push(session_manager);
                    }
                }
            }
            managers
        };

        let info = AuthenticationInfo::new(&path.session, action, &path.name, path.kind);
        self.authorize(connection, &client, managers, info)?;

        let mut state = self.state.lock();
        let mut outbox = Outbox::new();
        if path.is_session() {
            let record = state
                .sessions
                .remove(&path.session)
                .ok_or_else(|| missing(&path))?;
            for child in record.children() {
                child.announce(&mut outbox, child.event(EventKind::Destroyed, &client));
            }
            record
                .resource
                .announce(&mut outbox, record.resource.event(EventKind::Destroyed, &client));
        } else {
            let record = state.session_mut(&path.session)?;
            let resource = record
                .remove_child(path.kind, &path.name)
                .ok_or_else(|| missing(&path))?;
            resource.announce(&mut outbox, resource.event(EventKind::Destroyed, &client));
            if let Some(destroyed) = EventKind::destroyed(path.kind) {
                let event = record.child_event(destroyed, &client, &path.name);
                record.resource.announce(&mut outbox, event);
            }
        }
        info!("{}: {} destroyed by {:?}", self.address, path, client);
        state.flush(outbox);
        Ok(Reply::Done)
    }
}
