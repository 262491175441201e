mod client_connection;
mod connection_pool;

pub use client_connection::ClientConnection;
pub use connection_pool::ConnectionPool;

pub(crate) use client_connection::ConnectionObserver;
