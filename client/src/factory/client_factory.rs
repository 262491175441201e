use std::sync::Arc;

use log::info;

use jsdt_shared::{Client, JsdtError, ObjectType, Request, ResourceUrl};

use crate::{listener::ClientListener, Toolkit};

fn client_url<'a>(
    url: &'a ResourceUrl,
    client: Option<&dyn Client>,
) -> Result<&'a ResourceUrl, JsdtError> {
    let url = url.validated()?;
    if url.object_type() != ObjectType::Client {
        return Err(JsdtError::InvalidUrl {
            url: url.to_string(),
        });
    }
    if let Some(client) = client {
        if client.name() != url.object_name() {
            return Err(JsdtError::InvalidClient {
                reason: format!(
                    "client {:?} cannot be bound as {:?}",
                    client.name(),
                    url.object_name()
                ),
            });
        }
    }
    Ok(url)
}

impl Toolkit {
    /// Registers `client` with the Session host named by `url` and binds
    /// the URL, so the Client can be found and invited. Fails with
    /// `AlreadyBound` if the URL is taken.
    pub fn create_client(
        &self,
        client: &Arc<dyn Client>,
        url: &ResourceUrl,
    ) -> Result<(), JsdtError> {
        let url = client_url(url, Some(client.as_ref()))?;
        let endpoint = url.endpoint()?;
        let connection = self.connect_host(&endpoint, url.host(), true)?;
        let _registration = connection.register_client(client);
        connection
            .request(Request::RegisterClient {
                client: client.name().to_string(),
            })?
            .into_done()?;

        if let Err(error) = self.naming().bind(url, client) {
            let _ = connection.request(Request::UnregisterClient {
                client: client.name().to_string(),
            });
            return Err(error);
        }
        info!("created client {}", url);
        Ok(())
    }

    /// Returns the bound Client URL, or `NotBound`
    pub fn lookup_client(&self, url: &ResourceUrl) -> Result<ResourceUrl, JsdtError> {
        let url = client_url(url, None)?;
        self.naming().lookup(url)
    }

    pub fn destroy_client(
        &self,
        client: &Arc<dyn Client>,
        url: &ResourceUrl,
    ) -> Result<(), JsdtError> {
        let url = client_url(url, Some(client.as_ref()))?;
        self.naming().unbind(url, client)?;
        let endpoint = url.endpoint()?;
        if let Ok(connection) = self.connection_pool().get(&endpoint, url.host()) {
            match connection.request(Request::UnregisterClient {
                client: client.name().to_string(),
            }) {
                Ok(_) | Err(JsdtError::NoSuchClient { .. }) => {}
                Err(error) => return Err(error),
            }
        }
        info!("destroyed client {}", url);
        Ok(())
    }

    /// `listener` is told about invitations, expulsions and Token gives and
    /// requests addressed to the Client named `client`
    pub fn add_client_listener(&self, client: &str, listener: Arc<dyn ClientListener>) {
        self.inner.dispatcher.add_client_listener(client, listener);
    }

    pub fn remove_client_listener(
        &self,
        client: &str,
        listener: &Arc<dyn ClientListener>,
    ) -> Result<(), JsdtError> {
        if self.inner.dispatcher.remove_client_listener(client, listener) {
            Ok(())
        } else {
            Err(JsdtError::NoSuchListener)
        }
    }
}
