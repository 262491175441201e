use std::sync::Arc;

use jsdt_shared::{ChannelMode, Client, Codec, EventMask, JsdtError, Request};

use crate::{
    listener::{ByteArrayListener, ListenerSet},
    manageable::{manageable_via_core, ResourceCore},
};

/// A shared value inside a Session. Every successful set is announced to the
/// ByteArray's listeners with the new value.
pub struct ByteArray {
    core: ResourceCore,
    listeners: Arc<ListenerSet<dyn ByteArrayListener>>,
}

impl ByteArray {
    pub(crate) fn new(
        core: ResourceCore,
        listeners: Arc<ListenerSet<dyn ByteArrayListener>>,
    ) -> Self {
        Self { core, listeners }
    }

    pub fn session_name(&self) -> &str {
        &self.core.path.session
    }

    pub fn get_value_as_bytes(&self) -> Result<Vec<u8>, JsdtError> {
        self.core
            .request(Request::GetValue {
                session: self.core.path.session.clone(),
                name: self.core.path.name.clone(),
            })?
            .into_value()
    }

    pub fn get_value_as_string(&self) -> Result<String, JsdtError> {
        self.get_value_as_object()
    }

    pub fn get_value_as_object<T: Codec>(&self) -> Result<T, JsdtError> {
        T::decode(&self.get_value_as_bytes()?)
    }

    pub fn set_value(&self, client: &Arc<dyn Client>, value: &[u8]) -> Result<(), JsdtError> {
        self.core
            .request(Request::SetValue {
                session: self.core.path.session.clone(),
                name: self.core.path.name.clone(),
                client: client.name().to_string(),
                value: value.to_vec(),
            })?
            .into_done()
    }

    /// Sets the value to `length` bytes of `value` starting at `offset`
    pub fn set_value_range(
        &self,
        client: &Arc<dyn Client>,
        value: &[u8],
        offset: usize,
        length: usize,
    ) -> Result<(), JsdtError> {
        let range = offset
            .checked_add(length)
            .and_then(|end| value.get(offset..end))
            .ok_or_else(|| JsdtError::InvalidData {
                reason: format!(
                    "range {}+{} is outside a value of {} bytes",
                    offset,
                    length,
                    value.len()
                ),
            })?;
        self.set_value(client, range)
    }

    pub fn set_value_string(&self, client: &Arc<dyn Client>, value: &str) -> Result<(), JsdtError> {
        self.set_value(client, value.as_bytes())
    }

    pub fn set_value_object<T: Codec>(
        &self,
        client: &Arc<dyn Client>,
        value: &T,
    ) -> Result<(), JsdtError> {
        self.set_value(client, &value.encode())
    }

    pub fn add_listener(&self, listener: Arc<dyn ByteArrayListener>) -> Result<(), JsdtError> {
        self.core
            .add_listener(&self.listeners, listener, EventMask::all())
    }

    pub fn remove_listener(&self, listener: &Arc<dyn ByteArrayListener>) -> Result<(), JsdtError> {
        self.core.remove_listener(&self.listeners, listener)
    }

    pub fn enable_listener_events(
        &self,
        listener: &Arc<dyn ByteArrayListener>,
        mask: EventMask,
    ) -> Result<(), JsdtError> {
        self.listeners.set_events(listener, mask, true)
    }

    pub fn disable_listener_events(
        &self,
        listener: &Arc<dyn ByteArrayListener>,
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

manageable_via_core!(ByteArray);
