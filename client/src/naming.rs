use std::sync::Arc;

use log::debug;

use jsdt_shared::{
    resolve_host,
    transport::{Endpoint, TransportError},
    Client, Config, JsdtError, Request, ResourceUrl,
};

use crate::{
    connection::{ClientConnection, ConnectionPool},
    dispatcher::Dispatcher,
    listener::{ConnectionListener, RegistryListener},
};

/// Binds, unbinds and looks up Session and Client URLs in the Registry of
/// the URL's host.
///
/// Registry connections come from the shared [`ConnectionPool`], so there
/// is one per registry host and port, opened on first use.
pub struct Naming {
    config: Config,
    pool: Arc<ConnectionPool>,
    dispatcher: Arc<Dispatcher>,
}

impl Naming {
    pub(crate) fn new(
        config: Config,
        pool: Arc<ConnectionPool>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        Self {
            config,
            pool,
            dispatcher,
        }
    }

    /// The endpoint the Registry of `host` listens on
    pub fn registry_endpoint(&self, host: &str) -> Result<Endpoint, JsdtError> {
        self.registry_endpoint_on(host, self.config.registry_port)
    }

    pub(crate) fn registry_endpoint_on(
        &self,
        host: &str,
        port: u16,
    ) -> Result<Endpoint, JsdtError> {
        let address = resolve_host(host).ok_or_else(|| JsdtError::NoSuchHost {
            host: host.to_string(),
        })?;
        Ok(Endpoint::new(address, port, &self.config.connection_type))
    }

    fn registry(&self, host: &str) -> Result<Arc<ClientConnection>, JsdtError> {
        let endpoint = self.registry_endpoint(host)?;
        self.pool.get(&endpoint, host).map_err(|error| match error {
            TransportError::NotListening { endpoint } => {
                JsdtError::NoRegistry { address: endpoint }
            }
            other => other.into(),
        })
    }

    /// Binds `url`; fails with `AlreadyBound` if it is taken. A managed
    /// Registry may challenge `client` first.
    pub fn bind(&self, url: &ResourceUrl, client: &Arc<dyn Client>) -> Result<(), JsdtError> {
        url.validated()?;
        let registry = self.registry(url.host())?;
        let _registration = registry.register_client(client);
        registry
            .request(Request::Bind {
                url: url.clone(),
                client: client.name().to_string(),
            })?
            .into_done()?;
        debug!("bound {}", url);
        Ok(())
    }

    pub fn unbind(&self, url: &ResourceUrl, client: &Arc<dyn Client>) -> Result<(), JsdtError> {
        url.validated()?;
        let registry = self.registry(url.host())?;
        let _registration = registry.register_client(client);
        registry
            .request(Request::Unbind {
                url: url.clone(),
                client: client.name().to_string(),
            })?
            .into_done()?;
        debug!("unbound {}", url);
        Ok(())
    }

    /// Returns the URL as it was bound, or `NotBound`
    pub fn lookup(&self, url: &ResourceUrl) -> Result<ResourceUrl, JsdtError> {
        url.validated()?;
        self.registry(url.host())?
            .request(Request::Lookup { url: url.clone() })?
            .into_url()
    }

    /// Everything bound in the default Registry
    pub fn list(&self) -> Result<Vec<ResourceUrl>, JsdtError> {
        self.registry(&self.config.registry_host)?
            .request(Request::List)?
            .into_urls()
    }

    /// Everything bound in the Registry of `host` with the given connection
    /// type
    pub fn list_on(
        &self,
        host: &str,
        connection_type: &str,
    ) -> Result<Vec<ResourceUrl>, JsdtError> {
        let urls = self.registry(host)?.request(Request::List)?.into_urls()?;
        Ok(urls
            .into_iter()
            .filter(|url| url.connection_type() == connection_type)
            .collect())
    }

    pub fn add_registry_listener(
        &self,
        host: &str,
        listener: Arc<dyn RegistryListener>,
    ) -> Result<(), JsdtError> {
        let registry = self.registry(host)?;
        self.dispatcher
            .add_registry_listener(registry.endpoint(), listener.clone());
        if let Err(error) = registry
            .request(Request::AddRegistryListener)
            .and_then(|reply| reply.into_done())
        {
            self.dispatcher
                .remove_registry_listener(registry.endpoint(), &listener);
            return Err(error);
        }
        Ok(())
    }

    pub fn remove_registry_listener(
        &self,
        host: &str,
        listener: &Arc<dyn RegistryListener>,
    ) -> Result<(), JsdtError> {
        let registry = self.registry(host)?;
        if !self
            .dispatcher
            .remove_registry_listener(registry.endpoint(), listener)
        {
            return Err(JsdtError::NoSuchListener);
        }
        registry
            .request(Request::RemoveRegistryListener)?
            .into_done()
    }

    /// `listener` is told once when a connection to `host` with this
    /// connection type fails, and then forgotten
    pub fn add_connection_listener(
        &self,
        host: &str,
        connection_type: &str,
        listener: Arc<dyn ConnectionListener>,
    ) -> Result<(), JsdtError> {
        self.pool
            .add_connection_listener(host, connection_type, listener)
    }

    pub fn remove_connection_listener(
        &self,
        host: &str,
        connection_type: &str,
        listener: &Arc<dyn ConnectionListener>,
    ) -> Result<(), JsdtError> {
        self.pool
            .remove_connection_listener(host, connection_type, listener)
    }
}
