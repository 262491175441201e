//! Entry points on [`crate::Toolkit`] for creating and finding Sessions and
//! Clients, and for running Registries.

mod client_factory;
mod registry_factory;
mod session_factory;
