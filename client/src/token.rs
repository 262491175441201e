use std::sync::Arc;

use jsdt_shared::{ChannelMode, Client, EventMask, GrabOutcome, JsdtError, Request, TokenStatus};

use crate::{
    listener::{ListenerSet, TokenListener},
    manageable::{manageable_via_core, ResourceCore},
};

/// A distributed lock inside a Session.
///
/// A Token is either free, grabbed exclusively by one Client, inhibited by
/// any number of non-exclusive holders, or being given from its exclusive
/// holder to another Client. A give completes when the recipient grabs the
/// Token; if that does not happen within the host's give time, the Token
/// goes back to the giver.
pub struct Token {
    core: ResourceCore,
    listeners: Arc<ListenerSet<dyn TokenListener>>,
}

impl Token {
    pub(crate) fn new(core: ResourceCore, listeners: Arc<ListenerSet<dyn TokenListener>>) -> Self {
        Self { core, listeners }
    }

    pub fn session_name(&self) -> &str {
        &self.core.path.session
    }

    /// Tries to take the Token, exclusively or as one of several inhibitors.
    /// A refused grab is not an error; the outcome says what happened.
    pub fn grab(
        &self,
        client: &Arc<dyn Client>,
        exclusive: bool,
    ) -> Result<GrabOutcome, JsdtError> {
        self.core
            .request(Request::Grab {
                session: self.core.path.session.clone(),
                token: self.core.path.name.clone(),
                client: client.name().to_string(),
                exclusive,
            })?
            .into_grab()
    }

    /// Fails with `ClientNotGrabbing` if `client` holds no claim on the
    /// Token
    pub fn release(&self, client: &Arc<dyn Client>) -> Result<TokenStatus, JsdtError> {
        self.core
            .request(Request::Release {
                session: self.core.path.session.clone(),
                token: self.core.path.name.clone(),
                client: client.name().to_string(),
            })?
            .into_status()
    }

    /// Offers the exclusively held Token to `recipient`. The recipient's
    /// ClientListeners are told; it accepts by grabbing.
    pub fn give(
        &self,
        client: &Arc<dyn Client>,
        recipient: &str,
    ) -> Result<TokenStatus, JsdtError> {
        self.core
            .request(Request::Give {
                session: self.core.path.session.clone(),
                token: self.core.path.name.clone(),
                client: client.name().to_string(),
                recipient: recipient.to_string(),
            })?
            .into_status()
    }

    /// Asks the current holders, through their ClientListeners, to give up
    /// the Token
    pub fn request(&self, client: &Arc<dyn Client>) -> Result<TokenStatus, JsdtError> {
        self.core
            .request(Request::RequestToken {
                session: self.core.path.session.clone(),
                token: self.core.path.name.clone(),
                client: client.name().to_string(),
            })?
            .into_status()
    }

    pub fn test(&self) -> Result<TokenStatus, JsdtError> {
        self.core
            .request(Request::Test {
                session: self.core.path.session.clone(),
                token: self.core.path.name.clone(),
            })?
            .into_status()
    }

    /// Current holders, sorted
    pub fn list_holder_names(&self) -> Result<Vec<String>, JsdtError> {
        self.core
            .request(Request::ListHolders {
                session: self.core.path.session.clone(),
                token: self.core.path.name.clone(),
            })?
            .into_names()
    }

    pub fn add_listener(&self, listener: Arc<dyn TokenListener>) -> Result<(), JsdtError> {
        self.core
            .add_listener(&self.listeners, listener, EventMask::all())
    }

    pub fn remove_listener(&self, listener: &Arc<dyn TokenListener>) -> Result<(), JsdtError> {
        self.core.remove_listener(&self.listeners, listener)
    }

    pub fn enable_listener_events(
        &self,
        listener: &Arc<dyn TokenListener>,
        mask: EventMask,
    ) -> Result<(), JsdtError> {
        self.listeners.set_events(listener, mask, true)
    }

    pub fn disable_listener_events(
        &self,
        listener: &Arc<dyn TokenListener>,
        mask: EventMask,
    ) -> Result<(), JsdtError> {
        self.listeners.set_events(listener, mask, false)
    }

    fn join_client(&self, client: &Arc<dyn Client>) -> Result<(), JsdtError> {
        self.core.join(client, ChannelMode::ReadWrite)
    }

    fn leave_client(&self, client: &Arc<dyn Client>) -> Result<(), JsdtError> {
        self.core.leave(client)
    }

    fn destroy_by(&self, client: &Arc<dyn Client>) -> Result<(), JsdtError> {
        self.core.destroy(client)
    }
}

manageable_via_core!(Token);
