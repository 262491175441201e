use log::{debug, trace};

use jsdt_shared::{
    ByteArrayEvent, ClientEvent, ClientEventKind, ConnectionId, Data, Delivery, EventKind,
    JsdtError, Notification, Reply, ResourceKind, ResourcePath, TokenStatus,
};

use super::{
    host_state::{missing, no_such_client, HostState, TokenRecord},
    session_server::SessionHost,
};
use crate::outbox::Outbox;

fn token<'a>(
    state: &'a mut HostState,
    session: &str,
    token: &str,
) -> Result<&'a mut TokenRecord, JsdtError> {
    state
        .session_mut(session)?
        .tokens
        .get_mut(token)
        .ok_or_else(|| missing(&ResourcePath::child(session, ResourceKind::Token, token)))
}

fn no_such_channel(session: &str, channel: &str) -> JsdtError {
    missing(&ResourcePath::child(session, ResourceKind::Channel, channel))
}

fn no_such_byte_array(session: &str, name: &str) -> JsdtError {
    missing(&ResourcePath::child(session, ResourceKind::ByteArray, name))
}

/// Like [`token`], but the acting client has to have joined the Token
fn joined_token<'a>(
    state: &'a mut HostState,
    session: &str,
    name: &str,
    client: &str,
) -> Result<&'a mut TokenRecord, JsdtError> {
    let record = token(state, session, name)?;
    if !record.resource.is_member(client) {
        return Err(no_such_client(client));
    }
    Ok(record)
}

impl SessionHost {
    // Channel

    pub(super) fn channel_options(
        &self,
        session: String,
        channel: String,
    ) -> Result<Reply, JsdtError> {
        let state = self.state.lock();
        let record = state
            .session(&session)?
            .channels
            .get(&channel)
            .ok_or_else(|| no_such_channel(&session, &channel))?;
        Ok(Reply::Options(record.options))
    }

    pub(super) fn send(
        &self,
        session: String,
        channel: String,
        sender: String,
        delivery: Delivery,
        data: Data,
    ) -> Result<Reply, JsdtError> {
        let state = self.state.lock();
        let record = state
            .session(&session)?
            .channels
            .get(&channel)
            .ok_or_else(|| no_such_channel(&session, &channel))?;
        let members = &record.resource.members;
        let member = members.get(&sender).ok_or_else(|| no_such_client(&sender))?;
        if !member.mode.can_write() {
            return Err(JsdtError::denied(format!(
                "{:?} joined channel {:?} without write access",
                sender, channel
            )));
        }

        let mut targets: Vec<(&String, ConnectionId)> = match &delivery {
            Delivery::All => members
                .iter()
                .filter(|(_, member)| member.mode.can_read())
                .map(|(name, member)| (name, member.connection))
                .collect(),
            Delivery::Others => members
                .iter()
                .filter(|(name, member)| **name != sender && member.mode.can_read())
                .map(|(name, member)| (name, member.connection))
                .collect(),
            Delivery::Client(target) => {
                let (name, member) = members
                    .get_key_value(target)
                    .ok_or_else(|| no_such_client(target))?;
                if !record.consumers.contains(target) {
                    return Err(JsdtError::NoSuchConsumer {
                        client: target.clone(),
                    });
                }
                if member.mode.can_read() {
                    vec![(name, member.connection)]
                } else {
                    Vec::new()
                }
            }
        };
        if !record.options.ordered {
            fastrand::shuffle(&mut targets);
        }

        let data = data.stamped(&sender, &channel);
        trace!(
            "{}: {:?} sent {} bytes on channel {:?} to {} receiver(s)",
            self.address,
            sender,
            data.len(),
            channel,
            targets.len()
        );
        let mut outbox = Outbox::new();
        for (receiver, connection) in targets {
            outbox.push(
                connection,
                Notification::Data {
                    session: session.clone(),
                    channel: channel.clone(),
                    receiver: receiver.clone(),
                    data: data.clone(),
                },
            );
        }
        state.flush(outbox);
        Ok(Reply::Done)
    }

    pub(super) fn add_consumer(
        &self,
        session: String,
        channel: String,
        client: String,
    ) -> Result<Reply, JsdtError> {
        let mut state = self.state.lock();
        let record = state
            .session_mut(&session)?
            .channels
            .get_mut(&channel)
            .ok_or_else(|| no_such_channel(&session, &channel))?;
        if !record.resource.is_member(&client) {
            return Err(no_such_client(&client));
        }
        let mut outbox = Outbox::new();
        if record.consumers.insert(client.clone()) {
            let event = record.resource.event(EventKind::ConsumerAdded, &client);
            record.resource.announce(&mut outbox, event);
        }
        state.flush(outbox);
        Ok(Reply::Done)
    }

    pub(super) fn remove_consumer(
        &self,
        session: String,
        channel: String,
        client: String,
    ) -> Result<Reply, JsdtError> {
        let mut state = self.state.lock();
        let record = state
            .session_mut(&session)?
            .channels
            .get_mut(&channel)
            .ok_or_else(|| no_such_channel(&session, &channel))?;
        if !record.consumers.remove(&client) {
            return Err(JsdtError::NoSuchConsumer { client });
        }
        let mut outbox = Outbox::new();
        let event = record.resource.event(EventKind::ConsumerRemoved, &client);
        record.resource.announce(&mut outbox, event);
        state.flush(outbox);
        Ok(Reply::Done)
    }

    // ByteArray

    pub(super) fn get_value(&self, session: String, name: String) -> Result<Reply, JsdtError> {
        let state = self.state.lock();
        let record = state
            .session(&session)?
            .byte_arrays
            .get(&name)
            .ok_or_else(|| no_such_byte_array(&session, &name))?;
        Ok(Reply::Value(record.value.clone()))
    }

    pub(super) fn set_value(
        &self,
        session: String,
        name: String,
        client: String,
        value: Vec<u8>,
    ) -> Result<Reply, JsdtError> {
        let mut state = self.state.lock();
        let record = state
            .session_mut(&session)?
            .byte_arrays
            .get_mut(&name)
            .ok_or_else(|| no_such_byte_array(&session, &name))?;
        if !record.resource.is_member(&client) {
            return Err(no_such_client(&client));
        }
        record.value = value.clone();

        let mut outbox = Outbox::new();
        let event = Notification::ByteArray(ByteArrayEvent {
            session,
            byte_array: name,
            client,
            kind: EventKind::ValueChanged,
            value: Some(value),
        });
        record.resource.announce(&mut outbox, event);
        state.flush(outbox);
        Ok(Reply::Done)
    }

    // Token

    pub(super) fn grab(
        &self,
        session: String,
        name: String,
        client: String,
        exclusive: bool,
    ) -> Result<Reply, JsdtError> {
        let mut state = self.state.lock();
        let record = joined_token(&mut state, &session, &name, &client)?;
        let (outcome, change) = record.machine.grab(&client, exclusive);
        debug!(
            "{}: {:?} grab of token {:?} (exclusive: {}): {:?}",
            self.address, client, name, exclusive, outcome
        );
        let mut outbox = Outbox::new();
        if let Some(change) = change {
            record.announce_change(&mut outbox, change);
        }
        state.flush(outbox);
        Ok(Reply::Grab(outcome))
    }

    pub(super) fn release(
        &self,
        session: String,
        name: String,
        client: String,
    ) -> Result<Reply, JsdtError> {
        let mut state = self.state.lock();
        let record = joined_token(&mut state, &session, &name, &client)?;
        let change = record.machine.release(&client)?;
        let status = record.machine.status();
        let mut outbox = Outbox::new();
        if let Some(change) = change {
            record.announce_change(&mut outbox, change);
        }
        debug!("{}: {:?} released token {:?}", self.address, client, name);
        state.flush(outbox);
        Ok(Reply::Status(status))
    }

    pub(super) fn give(
        &self,
        session: String,
        name: String,
        client: String,
        recipient: String,
    ) -> Result<Reply, JsdtError> {
        let mut state = self.state.lock();
        let record = joined_token(&mut state, &session, &name, &client)?;
        let recipient_connection = record
            .resource
            .members
            .get(&recipient)
            .map(|member| member.connection)
            .ok_or_else(|| no_such_client(&recipient))?;
        let generation = record.machine.give(&client, &recipient)?;
        debug!(
            "{}: {:?} is giving token {:?} to {:?}",
            self.address, client, name, recipient
        );

        let mut outbox = Outbox::new();
        outbox.push(
            recipient_connection,
            Notification::Client(ClientEvent {
                session: session.clone(),
                resource: name.clone(),
                resource_kind: ResourceKind::Token,
                client: recipient,
                from: client,
                kind: ClientEventKind::TokenGiven,
            }),
        );
        state.flush(outbox);
        drop(state);

        self.schedule_give_timeout(&session, &name, generation);
        Ok(Reply::Status(TokenStatus::Giving))
    }

    pub(super) fn request(
        &self,
        session: String,
        name: String,
        client: String,
    ) -> Result<Reply, JsdtError> {
        let mut state = self.state.lock();
        let record = joined_token(&mut state, &session, &name, &client)?;
        let status = record.machine.status();

        let mut outbox = Outbox::new();
        for holder in record.machine.holders() {
            let Some(member) = record.resource.members.get(&holder) else {
                continue;
            };
            outbox.push(
                member.connection,
                Notification::Client(ClientEvent {
                    session: session.clone(),
                    resource: name.clone(),
                    resource_kind: ResourceKind::Token,
                    client: holder,
                    from: client.clone(),
                    kind: ClientEventKind::TokenRequested,
                }),
            );
        }
        let event = record.resource.event(EventKind::Requested, &client);
        record.resource.announce(&mut outbox, event);
        state.flush(outbox);
        Ok(Reply::Status(status))
    }

    pub(super) fn test(&self, session: String, name: String) -> Result<Reply, JsdtError> {
        let mut state = self.state.lock();
        Ok(Reply::Status(token(&mut state, &session, &name)?.machine.status()))
    }

    pub(super) fn list_holders(&self, session: String, name: String) -> Result<Reply, JsdtError> {
        let mut state = self.state.lock();
        Ok(Reply::Names(
            token(&mut state, &session, &name)?.machine.holders(),
        ))
    }
}
