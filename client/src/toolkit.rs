use std::{collections::HashMap, sync::Arc};

use log::info;
use parking_lot::Mutex;

use jsdt_server::{RegistryServer, ServerConfig, SessionServer};
use jsdt_shared::{
    transport::{Endpoint, Transport, TransportError},
    Config, JsdtError, Properties,
};

use crate::{connection::ConnectionPool, dispatcher::Dispatcher, naming::Naming};

/// The context every toolkit operation runs in: configuration, the
/// transport, the connection pool, naming, and whatever Registries and
/// Session hosts this process serves itself.
///
/// Cloning is cheap and yields a handle to the same context. Once the last
/// handle (including those held by Sessions) is dropped, connections are
/// closed and served hosts are stopped.
#[derive(Clone)]
pub struct Toolkit {
    pub(crate) inner: Arc<ToolkitInner>,
}

pub(crate) struct ToolkitInner {
    pub config: Config,
    pub transport: Arc<dyn Transport>,
    pub dispatcher: Arc<Dispatcher>,
    pub pool: Arc<ConnectionPool>,
    pub naming: Naming,
    pub session_servers: Mutex<HashMap<Endpoint, SessionServer>>,
    pub registries: Mutex<HashMap<u16, RegistryServer>>,
}

impl Toolkit {
    pub fn new(transport: Arc<dyn Transport>, properties: &Properties) -> Self {
        Self::with_config(transport, properties.to_config())
    }

    pub fn with_config(transport: Arc<dyn Transport>, config: Config) -> Self {
        let dispatcher = Arc::new(Dispatcher::default());
        let pool =
            ConnectionPool::new(transport.clone(), config.timeout_period, dispatcher.clone());
        let naming = Naming::new(config.clone(), pool.clone(), dispatcher.clone());
        Self {
            inner: Arc::new(ToolkitInner {
                config,
                transport,
                dispatcher,
                pool,
                naming,
                session_servers: Mutex::new(HashMap::new()),
                registries: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn naming(&self) -> &Naming {
        &self.inner.naming
    }

    pub fn connection_pool(&self) -> &Arc<ConnectionPool> {
        &self.inner.pool
    }

    pub(crate) fn server_config(&self) -> ServerConfig {
        ServerConfig::from(&self.inner.config)
    }

    /// Starts serving Sessions on `endpoint` from this process, unless
    /// something already listens there
    pub(crate) fn host_sessions(&self, endpoint: &Endpoint) -> Result<(), JsdtError> {
        let mut servers = self.inner.session_servers.lock();
        if servers.contains_key(endpoint) {
            return Ok(());
        }
        match SessionServer::start(
            self.inner.transport.clone(),
            endpoint.clone(),
            self.server_config(),
        ) {
            Ok(server) => {
                info!("hosting sessions on {}", endpoint);
                servers.insert(endpoint.clone(), server);
                Ok(())
            }
            // Another process got there first
            Err(TransportError::AddressInUse { .. }) => Ok(()),
            Err(error) => Err(error.into()),
        }
    }

    /// Endpoints this process hosts Sessions on
    pub fn hosted_endpoints(&self) -> Vec<Endpoint> {
        let mut endpoints: Vec<Endpoint> =
            self.inner.session_servers.lock().keys().cloned().collect();
        endpoints.sort();
        endpoints
    }
}

impl Drop for ToolkitInner {
    fn drop(&mut self) {
        self.pool.close_all();
        for (_, server) in self.session_servers.get_mut().drain() {
            server.stop();
        }
        for (_, registry) in self.registries.get_mut().drain() {
            registry.stop();
        }
    }
}
