mod client_proxy;
mod host;
mod server_connection;

pub use client_proxy::ClientProxy;
pub use host::{Host, RequestHandler};
pub use server_connection::ServerConnection;
