//! # Jsdt Client
//! Application API of the shared-data toolkit. A [`Toolkit`] creates or
//! looks up Sessions by URL; a [`Session`] hands out [`Channel`]s,
//! [`ByteArray`]s and [`Token`]s. Every state change is applied by the
//! serving host and comes back to listeners as events.

#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces
)]

pub mod connection;
pub mod listener;

mod byte_array;
mod channel;
mod dispatcher;
mod factory;
mod mailbox;
mod manageable;
mod naming;
mod session;
mod token;
mod toolkit;

pub use byte_array::ByteArray;
pub use channel::Channel;
pub use connection::{ClientConnection, ConnectionPool};
pub use listener::{
    ByteArrayListener, ChannelConsumer, ChannelListener, ClientListener, ConnectionListener,
    RegistryListener, SessionListener, TokenListener,
};
pub use manageable::Manageable;
pub use naming::Naming;
pub use session::Session;
pub use token::Token;
pub use toolkit::Toolkit;

pub use jsdt_shared as shared;
