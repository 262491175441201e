use std::sync::Arc;

use log::debug;

use jsdt_shared::{
    ChannelMode, ChannelOptions, Client, EventMask, JsdtError, ManagerHandle, Request,
    ResourceKind, ResourcePath, ResourceUrl,
};

use crate::{
    byte_array::ByteArray,
    channel::Channel,
    dispatcher::ChannelShared,
    listener::{ListenerSet, SessionListener},
    manageable::{manageable_via_core, Manageable, ResourceCore},
    token::Token,
    Toolkit,
};

/// A named group of Clients and the ByteArrays, Channels and Tokens they
/// share.
///
/// Creating a ByteArray, Channel or Token that already exists returns a
/// handle to the existing one. Asking for a manager on an existing
/// resource only succeeds if it is that resource's manager already.
pub struct Session {
    core: ResourceCore,
    url: ResourceUrl,
    listeners: Arc<ListenerSet<dyn SessionListener>>,
    toolkit: Toolkit,
}

impl Session {
    pub(crate) fn new(core: ResourceCore, url: ResourceUrl, toolkit: Toolkit) -> Self {
        let listeners = toolkit
            .inner
            .dispatcher
            .sessions
            .entry(core.connection.endpoint(), &core.path);
        Self {
            core,
            url,
            listeners,
            toolkit,
        }
    }

    pub fn url(&self) -> &ResourceUrl {
        &self.url
    }

    /// Whether this handle has not been closed or destroyed
    pub fn is_open(&self) -> bool {
        self.core.is_open()
    }

    // ByteArrays

    pub fn create_byte_array(
        &self,
        client: &Arc<dyn Client>,
        name: &str,
        auto_join: bool,
    ) -> Result<ByteArray, JsdtError> {
        self.create_child(client, ResourceKind::ByteArray, name, ChannelOptions::default(), None)?;
        let byte_array = self.byte_array(name);
        auto_joined(&byte_array, client, auto_join)?;
        Ok(byte_array)
    }

    pub fn create_byte_array_managed(
        &self,
        client: &Arc<dyn Client>,
        name: &str,
        auto_join: bool,
        manager: &ManagerHandle,
    ) -> Result<ByteArray, JsdtError> {
        self.create_child(
            client,
            ResourceKind::ByteArray,
            name,
            ChannelOptions::default(),
            Some(manager),
        )?;
        let byte_array = self.byte_array(name);
        auto_joined(&byte_array, client, auto_join)?;
        Ok(byte_array)
    }

    pub fn byte_array_exists(&self, name: &str) -> Result<bool, JsdtError> {
        self.child_exists(ResourceKind::ByteArray, name)
    }

    pub fn byte_array_managed(&self, name: &str) -> Result<bool, JsdtError> {
        self.child_managed(ResourceKind::ByteArray, name)
    }

    pub fn list_byte_array_names(&self) -> Result<Vec<String>, JsdtError> {
        self.list_names(ResourceKind::ByteArray)
    }

    /// ByteArrays `client` has joined
    pub fn get_byte_arrays_joined(
        &self,
        client: &Arc<dyn Client>,
    ) -> Result<Vec<ByteArray>, JsdtError> {
        Ok(self
            .joined_names(ResourceKind::ByteArray, client)?
            .iter()
            .map(|name| self.byte_array(name))
            .collect())
    }

    fn byte_array(&self, name: &str) -> ByteArray {
        let core = self.core.child(ResourceKind::ByteArray, name);
        let listeners = self
            .toolkit
            .inner
            .dispatcher
            .byte_arrays
            .entry(core.connection.endpoint(), &core.path);
        ByteArray::new(core, listeners)
    }

    // Channels

    pub fn create_channel(
        &self,
        client: &Arc<dyn Client>,
        name: &str,
        reliable: bool,
        ordered: bool,
        auto_join: bool,
    ) -> Result<Channel, JsdtError> {
        let options = ChannelOptions { reliable, ordered };
        self.create_channel_with(client, name, options, auto_join, None)
    }

    pub fn create_channel_managed(
        &self,
        client: &Arc<dyn Client>,
        name: &str,
        reliable: bool,
        ordered: bool,
        auto_join: bool,
        manager: &ManagerHandle,
    ) -> Result<Channel, JsdtError> {
        self.create_channel_with(
            client,
            name,
            ChannelOptions { reliable, ordered },
            auto_join,
            Some(manager),
        )
    }

    /// Creates or looks up a Channel. An existing Channel keeps the options
    /// it was created with.
    pub fn create_channel_with(
        &self,
        client: &Arc<dyn Client>,
        name: &str,
        options: ChannelOptions,
        auto_join: bool,
        manager: Option<&ManagerHandle>,
    ) -> Result<Channel, JsdtError> {
        let existed = self.create_child(client, ResourceKind::Channel, name, options, manager)?;
        let channel = if existed {
            self.channel(name)?
        } else {
            self.channel_with(name, options)
        };
        if auto_join {
            match channel.join_with_mode(client, ChannelMode::ReadWrite) {
                Ok(()) | Err(JsdtError::NameInUse { .. }) => {}
                Err(error) => return Err(error),
            }
        }
        Ok(channel)
    }

    pub fn channel_exists(&self, name: &str) -> Result<bool, JsdtError> {
        self.child_exists(ResourceKind::Channel, name)
    }

    pub fn channel_managed(&self, name: &str) -> Result<bool, JsdtError> {
        self.child_managed(ResourceKind::Channel, name)
    }

    pub fn list_channel_names(&self) -> Result<Vec<String>, JsdtError> {
        self.list_names(ResourceKind::Channel)
    }

    pub fn get_channels_joined(
        &self,
        client: &Arc<dyn Client>,
    ) -> Result<Vec<Channel>, JsdtError> {
        self.joined_names(ResourceKind::Channel, client)?
            .iter()
            .map(|name| self.channel(name))
            .collect()
    }

    fn channel(&self, name: &str) -> Result<Channel, JsdtError> {
        let options = self
            .core
            .request(Request::ChannelOptions {
                session: self.core.path.session.clone(),
                channel: name.to_string(),
            })?
            .into_options()?;
        Ok(self.channel_with(name, options))
    }

    fn channel_with(&self, name: &str, options: ChannelOptions) -> Channel {
        let core = self.core.child(ResourceKind::Channel, name);
        let shared = self
            .toolkit
            .inner
            .dispatcher
            .channels
            .entry(core.connection.endpoint(), &core.path);
        Channel::new(core, shared, options)
    }

    // Tokens

    pub fn create_token(
        &self,
        client: &Arc<dyn Client>,
        name: &str,
        auto_join: bool,
    ) -> Result<Token, JsdtError> {
        self.create_child(client, ResourceKind::Token, name, ChannelOptions::default(), None)?;
        let token = self.token(name);
        auto_joined(&token, client, auto_join)?;
        Ok(token)
    }

    pub fn create_token_managed(
        &self,
        client: &Arc<dyn Client>,
        name: &str,
        auto_join: bool,
        manager: &ManagerHandle,
    ) -> Result<Token, JsdtError> {
        self.create_child(
            client,
            ResourceKind::Token,
            name,
            ChannelOptions::default(),
            Some(manager),
        )?;
        let token = self.token(name);
        auto_joined(&token, client, auto_join)?;
        Ok(token)
    }

    pub fn token_exists(&self, name: &str) -> Result<bool, JsdtError> {
        self.child_exists(ResourceKind::Token, name)
    }

    pub fn token_managed(&self, name: &str) -> Result<bool, JsdtError> {
        self.child_managed(ResourceKind::Token, name)
    }

    pub fn list_token_names(&self) -> Result<Vec<String>, JsdtError> {
        self.list_names(ResourceKind::Token)
    }

    pub fn get_tokens_joined(&self, client: &Arc<dyn Client>) -> Result<Vec<Token>, JsdtError> {
        Ok(self
            .joined_names(ResourceKind::Token, client)?
            .iter()
            .map(|name| self.token(name))
            .collect())
    }

    fn token(&self, name: &str) -> Token {
        let core = self.core.child(ResourceKind::Token, name);
        let listeners = self
            .toolkit
            .inner
            .dispatcher
            .tokens
            .entry(core.connection.endpoint(), &core.path);
        Token::new(core, listeners)
    }

    // Shared by every kind

    /// Returns whether the resource existed already
    fn create_child(
        &self,
        client: &Arc<dyn Client>,
        kind: ResourceKind,
        name: &str,
        options: ChannelOptions,
        manager: Option<&ManagerHandle>,
    ) -> Result<bool, JsdtError> {
        let _registration = self.core.connection.register_client(client);
        let existed = self
            .core
            .request(Request::CreateResource {
                session: self.core.path.session.clone(),
                kind,
                name: name.to_string(),
                client: client.name().to_string(),
                options,
                manager: manager.cloned(),
            })?
            .into_created()?;
        if !existed {
            debug!(
                "created {}",
                ResourcePath::child(&self.core.path.session, kind, name)
            );
        }
        Ok(existed)
    }

    fn child_exists(&self, kind: ResourceKind, name: &str) -> Result<bool, JsdtError> {
        self.core
            .request(Request::Exists {
                path: ResourcePath::child(&self.core.path.session, kind, name),
            })?
            .into_flag()
    }

    /// Fails with the kind's `NoSuch*` error if there is no such resource
    fn child_managed(&self, kind: ResourceKind, name: &str) -> Result<bool, JsdtError> {
        self.core
            .request(Request::IsManaged {
                path: ResourcePath::child(&self.core.path.session, kind, name),
            })?
            .into_flag()
    }

    fn list_names(&self, kind: ResourceKind) -> Result<Vec<String>, JsdtError> {
        self.core
            .request(Request::ListNames {
                session: self.core.path.session.clone(),
                kind,
            })?
            .into_names()
    }

    fn joined_names(
        &self,
        kind: ResourceKind,
        client: &Arc<dyn Client>,
    ) -> Result<Vec<String>, JsdtError> {
        self.core
            .request(Request::JoinedNames {
                session: self.core.path.session.clone(),
                kind,
                client: client.name().to_string(),
            })?
            .into_names()
    }

    // Lifecycle

    /// Invalidates this handle and the handles created from it. With
    /// `close_connection`, the connection to the Session host is closed too
    /// once no other open Session uses it.
    pub fn close(&self, close_connection: bool) {
        if self.core.close() {
            debug!("closed session handle for {}", self.url);
            self.toolkit
                .inner
                .pool
                .session_closed(self.core.connection.endpoint(), close_connection);
        }
    }

    // Listeners

    pub fn add_listener(&self, listener: Arc<dyn SessionListener>) -> Result<(), JsdtError> {
        self.core
            .add_listener(&self.listeners, listener, EventMask::all())
    }

    pub fn remove_listener(&self, listener: &Arc<dyn SessionListener>) -> Result<(), JsdtError> {
        self.core.remove_listener(&self.listeners, listener)
    }

    pub fn enable_listener_events(
        &self,
        listener: &Arc<dyn SessionListener>,
        mask: EventMask,
    ) -> Result<(), JsdtError> {
        self.listeners.set_events(listener, mask, true)
    }

    pub fn disable_listener_events(
        &self,
        listener: &Arc<dyn SessionListener>,
        mask: EventMask,
    ) -> Result<(), JsdtError> {
        self.listeners.set_events(listener, mask, false)
    }

    fn join_client(&self, client: &Arc<dyn Client>) -> Result<(), JsdtError> {
        self.core.join(client, ChannelMode::ReadWrite)
    }

    fn channels(&self) -> Vec<Arc<ChannelShared>> {
        self.toolkit
            .inner
            .dispatcher
            .channels
            .in_session(self.core.connection.endpoint(), &self.core.path.session)
    }

    /// Leaving a Session leaves its Channels too
    fn leave_client(&self, client: &Arc<dyn Client>) -> Result<(), JsdtError> {
        self.core.leave(client)?;
        for channel in self.channels() {
            channel.forget_client(client.name());
        }
        Ok(())
    }

    /// Destroys the Session on its host, unbinds it and closes this handle
    fn destroy_by(&self, client: &Arc<dyn Client>) -> Result<(), JsdtError> {
        self.core.destroy(client)?;
        match self.toolkit.naming().unbind(&self.url, client) {
            Ok(()) | Err(JsdtError::NotBound { .. }) => {}
            Err(error) => return Err(error),
        }
        self.close(false);
        Ok(())
    }
}

manageable_via_core!(Session);

/// Joins `client` when asked to; being a member already is fine
fn auto_joined<M: Manageable>(
    resource: &M,
    client: &Arc<dyn Client>,
    auto_join: bool,
) -> Result<(), JsdtError> {
    if !auto_join {
        return Ok(());
    }
    match resource.join(client) {
        Ok(()) | Err(JsdtError::NameInUse { .. }) => Ok(()),
        Err(error) => Err(error),
    }
}
