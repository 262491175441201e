use std::{
    panic::{self, AssertUnwindSafe},
    time::Duration,
};

use log::{info, warn};

use jsdt_shared::{AuthenticationInfo, Client, ManagerHandle};

use super::ServerConnection;

/// Stands in for a remote Client while its manager authenticates it. Each
/// `authenticate` call becomes a challenge round-trip over the connection
/// the Client's request arrived on.
pub struct ClientProxy<'a> {
    name: &'a str,
    connection: &'a ServerConnection,
    timeout: Duration,
}

impl<'a> ClientProxy<'a> {
    pub fn new(name: &'a str, connection: &'a ServerConnection, timeout: Duration) -> Self {
        Self {
            name,
            connection,
            timeout,
        }
    }

    /// Runs `manager` against this Client. A panic in the manager, or a
    /// failed round-trip, counts as a denial.
    pub fn authorize(&self, manager: &ManagerHandle, mut info: AuthenticationInfo) -> bool {
        let action = info.action();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            manager.manager().authorize(&mut info, self)
        }));
        match outcome {
            Ok(granted) => {
                info!(
                    "{:?} of {} {:?} by {:?}: {}",
                    action,
                    info.kind(),
                    info.name(),
                    self.name,
                    if granted { "granted" } else { "denied" }
                );
                granted
            }
            Err(_) => {
                warn!(
                    "manager panicked while authorizing {:?} for {:?}, treating as denied",
                    action, self.name
                );
                false
            }
        }
    }
}

impl Client for ClientProxy<'_> {
    fn name(&self) -> &str {
        self.name
    }

    fn authenticate(&self, info: &AuthenticationInfo) -> Option<Vec<u8>> {
        match self.connection.challenge(self.name, info, self.timeout) {
            Ok(response) => response,
            Err(error) => {
                warn!("challenge to {:?} failed: {}", self.name, error);
                None
            }
        }
    }
}
