//! # Jsdt Shared
//! Common functionality shared between jsdt-server & jsdt-client crates:
//! resource identifiers, data envelopes, authentication payloads, events,
//! configuration, the wire protocol and the transport collaborator traits.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod auth;
mod config;
mod data;
mod error;
mod events;
mod protocol;
mod types;
mod url;

pub mod transport;

pub use auth::{AuthAction, AuthenticationInfo, Client, ManagerHandle, ResourceManager};
pub use config::{Config, Properties};
pub use data::{Codec, Data, Priority};
pub use error::{ErrorKind, JsdtError};
pub use events::{
    ByteArrayEvent, ChannelEvent, ClientEvent, ClientEventKind, ConnectionEvent, EventKind,
    EventMask, ManagerMask, RegistryEvent, RegistryEventKind, SessionEvent, TokenEvent,
};
pub use protocol::{Frame, Notification, Reply, Request};
pub use types::{
    ChannelMode, ChannelOptions, ConnectionId, Delivery, GrabOutcome, RequestId, ResourceKind,
    ResourcePath, TokenStatus,
};
pub use url::{resolve_host, ObjectType, ResourceUrl, URL_SCHEME};

pub mod properties {
    pub use crate::config::{
        AUTHENTICATION_TIME, CONNECTION_TYPE, GIVE_TIME, REGISTRY_HOST, REGISTRY_PORT,
        REGISTRY_TIME, TIMEOUT_PERIOD,
    };
}
