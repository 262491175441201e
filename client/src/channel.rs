use std::{sync::Arc, time::Duration};

use jsdt_shared::{
    ChannelMode, ChannelOptions, Client, Data, Delivery, EventMask, JsdtError, Request,
};

use crate::{
    dispatcher::ChannelShared,
    listener::{ChannelConsumer, ChannelListener},
    mailbox::Mailbox,
    manageable::{manageable_via_core, ResourceCore},
};

/// A group-communication channel inside a Session.
///
/// Data sent to a Client goes to its consumers, or, if it has none, is
/// queued for [`Channel::receive`]. From one sender at one priority, Data
/// arrives in the order it was sent on an ordered Channel. Consumers of a
/// Client are called from the delivery thread of the connection the Data
/// arrived on; a consumer shared between Channels on different connections
/// has to serialize itself.
pub struct Channel {
    core: ResourceCore,
    shared: Arc<ChannelShared>,
    options: ChannelOptions,
}

impl Channel {
    pub(crate) fn new(
        core: ResourceCore,
        shared: Arc<ChannelShared>,
        options: ChannelOptions,
    ) -> Self {
        Self {
            core,
            shared,
            options,
        }
    }

    pub fn session_name(&self) -> &str {
        &self.core.path.session
    }

    pub fn is_reliable(&self) -> bool {
        self.options.reliable
    }

    pub fn is_ordered(&self) -> bool {
        self.options.ordered
    }

    /// Joins with the given capability: read-only members never send,
    /// write-only members never receive
    pub fn join_with_mode(
        &self,
        client: &Arc<dyn Client>,
        mode: ChannelMode,
    ) -> Result<(), JsdtError> {
        let opened = self.shared.open_mailbox(client.name());
        let joined = self.core.join(client, mode);
        if joined.is_err() && opened {
            self.shared.close_mailbox(client.name());
        }
        joined
    }

    // Consumers

    pub fn add_consumer(
        &self,
        client: &Arc<dyn Client>,
        consumer: Arc<dyn ChannelConsumer>,
    ) -> Result<(), JsdtError> {
        if !self.shared.add_consumer(client.name(), consumer.clone()) {
            return Ok(());
        }
        let added = self
            .core
            .request(Request::AddConsumer {
                session: self.core.path.session.clone(),
                channel: self.core.path.name.clone(),
                client: client.name().to_string(),
            })
            .and_then(|reply| reply.into_done());
        if added.is_err() {
            self.shared.remove_consumer(client.name(), &consumer);
        }
        added
    }

    pub fn remove_consumer(
        &self,
        client: &Arc<dyn Client>,
        consumer: &Arc<dyn ChannelConsumer>,
    ) -> Result<(), JsdtError> {
        let last = self
            .shared
            .remove_consumer(client.name(), consumer)
            .ok_or_else(|| JsdtError::NoSuchConsumer {
                client: client.name().to_string(),
            })?;
        if !last {
            return Ok(());
        }
        self.core
            .request(Request::RemoveConsumer {
                session: self.core.path.session.clone(),
                channel: self.core.path.name.clone(),
                client: client.name().to_string(),
            })?
            .into_done()
    }

    // Sending

    pub fn send_to_all(&self, sender: &Arc<dyn Client>, data: Data) -> Result<(), JsdtError> {
        self.send(sender, Delivery::All, data)
    }

    pub fn send_to_others(&self, sender: &Arc<dyn Client>, data: Data) -> Result<(), JsdtError> {
        self.send(sender, Delivery::Others, data)
    }

    /// Fails with `NoSuchConsumer` if `receiver` has no consumer on this
    /// Channel
    pub fn send_to_client(
        &self,
        sender: &Arc<dyn Client>,
        receiver: &str,
        data: Data,
    ) -> Result<(), JsdtError> {
        self.send(sender, Delivery::Client(receiver.to_string()), data)
    }

    /// The host replies once the send is accepted, before anything is
    /// delivered, so a refused send fails here on any Channel
    fn send(
        &self,
        sender: &Arc<dyn Client>,
        delivery: Delivery,
        data: Data,
    ) -> Result<(), JsdtError> {
        self.core
            .request(Request::Send {
                session: self.core.path.session.clone(),
                channel: self.core.path.name.clone(),
                sender: sender.name().to_string(),
                delivery,
                data,
            })?
            .into_done()
    }

    // Receiving

    /// Blocks until Data for `client` arrives
    pub fn receive(&self, client: &Arc<dyn Client>) -> Result<Data, JsdtError> {
        self.mailbox(client)?
            .wait(None)?
            .ok_or_else(|| JsdtError::timed_out("receive"))
    }

    /// Waits at most `timeout` for Data for `client`; `None` if none came
    pub fn receive_within(
        &self,
        client: &Arc<dyn Client>,
        timeout: Duration,
    ) -> Result<Option<Data>, JsdtError> {
        self.mailbox(client)?.wait(Some(timeout))
    }

    /// Whether `receive` would return without blocking
    pub fn data_available(&self, client: &Arc<dyn Client>) -> Result<bool, JsdtError> {
        Ok(!self.mailbox(client)?.is_empty())
    }

    fn mailbox(&self, client: &Arc<dyn Client>) -> Result<Arc<Mailbox>, JsdtError> {
        self.shared
            .mailbox(client.name())
            .ok_or_else(|| JsdtError::NoSuchClient {
                name: client.name().to_string(),
            })
    }

    // Listeners

    pub fn add_listener(&self, listener: Arc<dyn ChannelListener>) -> Result<(), JsdtError> {
        self.core
            .add_listener(&self.shared.listeners, listener, EventMask::all())
    }

    pub fn remove_listener(&self, listener: &Arc<dyn ChannelListener>) -> Result<(), JsdtError> {
        self.core.remove_listener(&self.shared.listeners, listener)
    }

    pub fn enable_listener_events(
        &self,
        listener: &Arc<dyn ChannelListener>,
        mask: EventMask,
    ) -> Result<(), JsdtError> {
        self.shared.listeners.set_events(listener, mask, true)
    }

    pub fn disable_listener_events(
        &self,
        listener: &Arc<dyn ChannelListener>,
        mask: EventMask,
    ) -> Result<(), JsdtError> {
        self.shared.listeners.set_events(listener, mask, false)
    }

    fn join_client(&self, client: &Arc<dyn Client>) -> Result<(), JsdtError> {
        self.join_with_mode(client, ChannelMode::ReadWrite)
    }

    fn leave_client(&self, client: &Arc<dyn Client>) -> Result<(), JsdtError> {
        self.core.leave(client)?;
        self.shared.forget_client(client.name());
        Ok(())
    }

    fn destroy_by(&self, client: &Arc<dyn Client>) -> Result<(), JsdtError> {
        self.core.destroy(client)
    }
}

manageable_via_core!(Channel);
