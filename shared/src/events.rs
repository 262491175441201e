use bitflags::bitflags;

use crate::{ResourceKind, ResourceUrl};

bitflags! {
    /// Selects which event kinds a listener is told about
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct EventMask: u32 {
        const JOINED = 1 << 0;
        const LEFT = 1 << 1;
        const INVITED = 1 << 2;
        const EXPELLED = 1 << 3;
        const DESTROYED = 1 << 4;
        const BYTE_ARRAY_CREATED = 1 << 5;
        const BYTE_ARRAY_DESTROYED = 1 << 6;
        const CHANNEL_CREATED = 1 << 7;
        const CHANNEL_DESTROYED = 1 << 8;
        const TOKEN_CREATED = 1 << 9;
        const TOKEN_DESTROYED = 1 << 10;
        const CONSUMER_ADDED = 1 << 11;
        const CONSUMER_REMOVED = 1 << 12;
        const VALUE_CHANGED = 1 << 13;
        const GRABBED = 1 << 14;
        const INHIBITED = 1 << 15;
        const RELEASED = 1 << 16;
        const GIVEN = 1 << 17;
        const REQUESTED = 1 << 18;
    }
}

bitflags! {
    /// Selects which privileged actions consult a resource's manager
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ManagerMask: u8 {
        const JOIN = 1 << 0;
        const CREATE = 1 << 1;
        const DESTROY = 1 << 2;
    }
}

/// Every kind of Session, Channel, ByteArray and Token event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Joined,
    Left,
    Invited,
    Expelled,
    Destroyed,
    ByteArrayCreated,
    ByteArrayDestroyed,
    ChannelCreated,
    ChannelDestroyed,
    TokenCreated,
    TokenDestroyed,
    ConsumerAdded,
    ConsumerRemoved,
    ValueChanged,
    Grabbed,
    Inhibited,
    Released,
    Given,
    Requested,
}

impl EventKind {
    pub fn mask(self) -> EventMask {
        match self {
            EventKind::Joined => EventMask::JOINED,
            EventKind::Left => EventMask::LEFT,
            EventKind::Invited => EventMask::INVITED,
            EventKind::Expelled => EventMask::EXPELLED,
            EventKind::Destroyed => EventMask::DESTROYED,
            EventKind::ByteArrayCreated => EventMask::BYTE_ARRAY_CREATED,
            EventKind::ByteArrayDestroyed => EventMask::BYTE_ARRAY_DESTROYED,
            EventKind::ChannelCreated => EventMask::CHANNEL_CREATED,
            EventKind::ChannelDestroyed => EventMask::CHANNEL_DESTROYED,
            EventKind::TokenCreated => EventMask::TOKEN_CREATED,
            EventKind::TokenDestroyed => EventMask::TOKEN_DESTROYED,
            EventKind::ConsumerAdded => EventMask::CONSUMER_ADDED,
            EventKind::ConsumerRemoved => EventMask::CONSUMER_REMOVED,
            EventKind::ValueChanged => EventMask::VALUE_CHANGED,
            EventKind::Grabbed => EventMask::GRABBED,
            EventKind::Inhibited => EventMask::INHIBITED,
            EventKind::Released => EventMask::RELEASED,
            EventKind::Given => EventMask::GIVEN,
            EventKind::Requested => EventMask::REQUESTED,
        }
    }

    /// Session event announcing that a child resource was created
    pub fn created(kind: ResourceKind) -> Option<Self> {
        match kind {
            ResourceKind::ByteArray => Some(EventKind::ByteArrayCreated),
            ResourceKind::Channel => Some(EventKind::ChannelCreated),
            ResourceKind::Token => Some(EventKind::TokenCreated),
            ResourceKind::Session | ResourceKind::Registry => None,
        }
    }

    /// Session event announcing that a child resource was destroyed
    pub fn destroyed(kind: ResourceKind) -> Option<Self> {
        match kind {
            ResourceKind::ByteArray => Some(EventKind::ByteArrayDestroyed),
            ResourceKind::Channel => Some(EventKind::ChannelDestroyed),
            ResourceKind::Token => Some(EventKind::TokenDestroyed),
            ResourceKind::Session | ResourceKind::Registry => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionEvent {
    pub session: String,
    pub client: String,
    pub kind: EventKind,
    /// Name of the ByteArray, Channel or Token for creation/destruction events
    pub resource: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelEvent {
    pub session: String,
    pub channel: String,
    pub client: String,
    pub kind: EventKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ByteArrayEvent {
    pub session: String,
    pub byte_array: String,
    pub client: String,
    pub kind: EventKind,
    /// The new value, set for `ValueChanged`
    pub value: Option<Vec<u8>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenEvent {
    pub session: String,
    pub token: String,
    pub client: String,
    pub kind: EventKind,
    /// The Client that received the Token, set for `Given`
    pub recipient: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClientEventKind {
    Invited,
    Expelled,
    TokenGiven,
    TokenRequested,
}

/// Addressed to one Client rather than to a resource's listeners
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientEvent {
    pub session: String,
    pub resource: String,
    pub resource_kind: ResourceKind,
    /// The Client being told about the event
    pub client: String,
    /// The Client that caused the event
    pub from: String,
    pub kind: ClientEventKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RegistryEventKind {
    SessionCreated,
    SessionDestroyed,
    ClientCreated,
    ClientDestroyed,
    ConnectionFailed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistryEvent {
    pub kind: RegistryEventKind,
    /// The bound identifier, absent for `ConnectionFailed`
    pub url: Option<ResourceUrl>,
    pub client: String,
    /// Address of the Registry the event concerns
    pub address: String,
}

/// Delivered exactly once to each ConnectionListener when a connection to
/// a host fails
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionEvent {
    pub host: String,
    pub connection_type: String,
    pub reason: String,
}
