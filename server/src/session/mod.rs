mod data_ops;
mod host_state;
mod membership;
mod session_server;
mod token;

pub use session_server::SessionServer;
pub use token::{TokenChange, TokenMachine, TokenState};
