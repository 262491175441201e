pub mod deployment;
pub mod event_log;
pub mod test_client;
pub mod test_manager;

pub use deployment::{Deployment, CONNECTION_TYPE, HOST, REGISTRY_PORT, SESSION_PORT, WAIT};
pub use event_log::{wait_until, EventLog};
pub use test_client::TestClient;
pub use test_manager::{DenyAll, PasswordManager};
