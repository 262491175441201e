use std::{
    thread,
    time::{Duration, Instant},
};

use log::{debug, info};

use jsdt_server::RegistryServer;
use jsdt_shared::{transport::TransportError, JsdtError, ManagerHandle, Reply, Request};

use crate::Toolkit;

const READY_POLL: Duration = Duration::from_millis(50);

impl Toolkit {
    /// Starts an unmanaged Registry on the configured registry port
    pub fn start_registry(&self) -> Result<(), JsdtError> {
        self.start_registry_on(self.config().registry_port, None)
    }

    /// Starts a Registry whose binds and unbinds `manager` authorizes
    pub fn start_registry_managed(&self, manager: &ManagerHandle) -> Result<(), JsdtError> {
        self.start_registry_on(self.config().registry_port, Some(manager.clone()))
    }

    /// Starts a Registry on `port` of the configured registry host and
    /// waits up to `registryTime` for it to answer.
    ///
    /// Fails with `RegistryExists` if a Registry already answers there, with
    /// `PortInUse` if something else listens on the port, and with
    /// `NoRegistry` if the new Registry never answers.
    pub fn start_registry_on(
        &self,
        port: u16,
        manager: Option<ManagerHandle>,
    ) -> Result<(), JsdtError> {
        let host = self.config().registry_host.clone();
        if self.registry_exists_on(&host, port)? {
            return Err(JsdtError::RegistryExists { port });
        }

        let endpoint = self.naming().registry_endpoint_on(&host, port)?;
        let server = match RegistryServer::start(
            self.inner.transport.clone(),
            endpoint.clone(),
            self.server_config(),
            manager,
        ) {
            Ok(server) => server,
            Err(TransportError::AddressInUse { .. }) => return Err(JsdtError::PortInUse { port }),
            Err(error) => return Err(error.into()),
        };
        self.inner.registries.lock().insert(port, server);

        let deadline = Instant::now() + self.config().registry_time;
        loop {
            if self.registry_exists_on(&host, port)? {
                info!("registry running on {}", endpoint);
                return Ok(());
            }
            if Instant::now() >= deadline {
                if let Some(server) = self.inner.registries.lock().remove(&port) {
                    server.stop();
                }
                return Err(JsdtError::NoRegistry {
                    address: endpoint.to_string(),
                });
            }
            thread::sleep(READY_POLL);
        }
    }

    /// Stops the Registry this process runs on `port`
    pub fn stop_registry(&self, port: u16) -> Result<(), JsdtError> {
        let server = self.inner.registries.lock().remove(&port);
        match server {
            Some(server) => {
                info!("stopping registry on {}", server.endpoint());
                server.stop();
                Ok(())
            }
            None => Err(JsdtError::NoRegistry {
                address: format!("{}:{}", self.config().registry_host, port),
            }),
        }
    }

    /// Whether a Registry answers on the configured registry host and port
    pub fn registry_exists(&self) -> Result<bool, JsdtError> {
        let host = self.config().registry_host.clone();
        self.registry_exists_on(&host, self.config().registry_port)
    }

    /// Whether a Registry answers on `port` of `host`. Something else
    /// listening there does not count.
    pub fn registry_exists_on(&self, host: &str, port: u16) -> Result<bool, JsdtError> {
        let endpoint = self.naming().registry_endpoint_on(host, port)?;
        let connection = match self.connection_pool().get(&endpoint, host) {
            Ok(connection) => connection,
            Err(error) => {
                debug!("no registry on {}: {}", endpoint, error);
                return Ok(false);
            }
        };
        Ok(matches!(
            connection.request(Request::Ping),
            Ok(Reply::Pong { registry: true })
        ))
    }
}
