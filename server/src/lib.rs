//! # Jsdt Server
//! Authoritative hosts for the shared-data toolkit. A [`RegistryServer`]
//! keeps the naming table for one host:port; a [`SessionServer`] serves
//! Sessions, Channels, ByteArrays and Tokens, applies every state change
//! itself and pushes the resulting events to listening connections.

#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces
)]

pub mod connection;

mod outbox;
mod registry;
mod server_config;
mod session;

pub use registry::RegistryServer;
pub use server_config::ServerConfig;
pub use session::{SessionServer, TokenChange, TokenMachine, TokenState};
