use std::sync::Arc;

use log::{debug, info, warn};

use jsdt_shared::{
    transport::{Endpoint, TransportError},
    Client, JsdtError, ManagerHandle, ObjectType, Request, ResourcePath, ResourceUrl,
};

use crate::{
    connection::ClientConnection,
    manageable::{Manageable, ResourceCore},
    Session, Toolkit,
};

fn session_url(url: &ResourceUrl) -> Result<&ResourceUrl, JsdtError> {
    let url = url.validated()?;
    if url.object_type() != ObjectType::Session {
        return Err(JsdtError::InvalidUrl {
            url: url.to_string(),
        });
    }
    Ok(url)
}

impl Toolkit {
    /// Creates the Session named by `url`, or returns a handle to it if it
    /// exists already. If nothing serves the URL's endpoint and the Session
    /// is not bound, this process starts hosting Sessions there.
    pub fn create_session(
        &self,
        client: &Arc<dyn Client>,
        url: &ResourceUrl,
        auto_join: bool,
    ) -> Result<Session, JsdtError> {
        self.open_session(client, url, auto_join, None)
    }

    /// Like [`Toolkit::create_session`], with `manager` guarding the new
    /// Session. An existing Session only accepts its own manager.
    pub fn create_session_managed(
        &self,
        client: &Arc<dyn Client>,
        url: &ResourceUrl,
        auto_join: bool,
        manager: &ManagerHandle,
    ) -> Result<Session, JsdtError> {
        self.open_session(client, url, auto_join, Some(manager))
    }

    /// Whether `url` is bound in its Registry
    pub fn session_exists(&self, url: &ResourceUrl) -> Result<bool, JsdtError> {
        session_url(url)?;
        match self.naming().lookup(url) {
            Ok(_) => Ok(true),
            Err(JsdtError::NotBound { .. }) => Ok(false),
            Err(error) => Err(error),
        }
    }

    pub fn session_managed(&self, url: &ResourceUrl) -> Result<bool, JsdtError> {
        let url = session_url(url)?;
        let connection = self.session_connection(url)?;
        connection
            .request(Request::IsManaged {
                path: ResourcePath::session(url.object_name()),
            })?
            .into_flag()
    }

    fn session_connection(&self, url: &ResourceUrl) -> Result<Arc<ClientConnection>, JsdtError> {
        let endpoint = url.endpoint()?;
        self.connection_pool()
            .get(&endpoint, url.host())
            .map_err(|error| match error {
                TransportError::NotListening { .. } => JsdtError::NoSuchSession {
                    name: url.object_name().to_string(),
                },
                other => other.into(),
            })
    }

    /// Connects to `endpoint`, hosting Sessions there first if nothing
    /// listens and `may_host`
    pub(crate) fn connect_host(
        &self,
        endpoint: &Endpoint,
        host: &str,
        may_host: bool,
    ) -> Result<Arc<ClientConnection>, JsdtError> {
        match self.connection_pool().get(endpoint, host) {
            Ok(connection) => Ok(connection),
            Err(TransportError::NotListening { .. }) if may_host => {
                self.host_sessions(endpoint)?;
                Ok(self.connection_pool().get(endpoint, host)?)
            }
            Err(error) => Err(error.into()),
        }
    }

    fn open_session(
        &self,
        client: &Arc<dyn Client>,
        url: &ResourceUrl,
        auto_join: bool,
        manager: Option<&ManagerHandle>,
    ) -> Result<Session, JsdtError> {
        let url = session_url(url)?;
        let name = url.object_name();
        let bound = match self.naming().lookup(url) {
            Ok(_) => true,
            Err(JsdtError::NotBound { .. }) => false,
            Err(error) => return Err(error),
        };

        let endpoint = url.endpoint()?;
        let connection = self.connect_host(&endpoint, url.host(), !bound)?;
        let _registration = connection.register_client(client);
        let existed = connection
            .request(Request::CreateSession {
                session: name.to_string(),
                client: client.name().to_string(),
                manager: manager.cloned(),
            })?
            .into_created()?;
        if !existed {
            info!("created session {}", url);
        }

        if !existed || !bound {
            match self.naming().bind(url, client) {
                Ok(()) => {}
                Err(JsdtError::AlreadyBound { .. }) => debug!("{} was bound concurrently", url),
                Err(error) => {
                    if !existed {
                        warn!("could not bind {}, destroying it again: {}", url, error);
                        let _ = connection.request(Request::Destroy {
                            path: ResourcePath::session(name),
                            client: client.name().to_string(),
                        });
                    }
                    return Err(error);
                }
            }
        }

        self.connection_pool().session_opened(&endpoint);
        let session = Session::new(
            ResourceCore::session(connection, self.inner.dispatcher.clone(), name),
            url.clone(),
            self.clone(),
        );
        if auto_join {
            match session.join(client) {
                Ok(()) | Err(JsdtError::NameInUse { .. }) => {}
                Err(error) => {
                    session.close(false);
                    return Err(error);
                }
            }
        }
        Ok(session)
    }
}
