use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use jsdt_shared::{
    ChannelMode, Client, EventMask, JsdtError, ManagerHandle, ManagerMask, Reply, Request,
    ResourceKind, ResourcePath,
};

use crate::{connection::ClientConnection, dispatcher::Dispatcher, listener::ListenerSet};

/// The operations every shared object supports: membership, invitations,
/// expulsion, destruction and manager control.
///
/// `invite` and `expel` are meant for a resource's manager but anyone
/// holding a handle may call them.
pub trait Manageable {
    fn name(&self) -> &str;

    fn kind(&self) -> ResourceKind;

    /// Adds `client` to the members. A managed resource first asks its
    /// manager, which may challenge the client.
    fn join(&self, client: &Arc<dyn Client>) -> Result<(), JsdtError>;

    fn leave(&self, client: &Arc<dyn Client>) -> Result<(), JsdtError>;

    /// Tells each invitee, through its ClientListeners, that `client`
    /// invited it
    fn invite(&self, client: &Arc<dyn Client>, invitees: &[&str]) -> Result<(), JsdtError>;

    /// Removes each expellee from the members
    fn expel(&self, client: &Arc<dyn Client>, expellees: &[&str]) -> Result<(), JsdtError>;

    /// Destroys the resource. Its listeners are told before it goes away.
    fn destroy(&self, client: &Arc<dyn Client>) -> Result<(), JsdtError>;

    fn is_managed(&self) -> Result<bool, JsdtError>;

    /// Names of the current members, sorted
    fn list_client_names(&self) -> Result<Vec<String>, JsdtError>;

    /// Has `manager` consulted for the actions in `mask` again
    fn enable_manager_events(
        &self,
        manager: &ManagerHandle,
        mask: ManagerMask,
    ) -> Result<(), JsdtError>;

    /// Stops consulting `manager` for the actions in `mask`
    fn disable_manager_events(
        &self,
        manager: &ManagerHandle,
        mask: ManagerMask,
    ) -> Result<(), JsdtError>;
}

/// What every handle holds: the resource's path, the connection to the host
/// serving it, and whether its Session handle is still open
#[derive(Clone)]
pub(crate) struct ResourceCore {
    pub connection: Arc<ClientConnection>,
    pub path: ResourcePath,
    dispatcher: Arc<Dispatcher>,
    session_open: Arc<AtomicBool>,
}

impl ResourceCore {
    pub fn session(
        connection: Arc<ClientConnection>,
        dispatcher: Arc<Dispatcher>,
        name: &str,
    ) -> Self {
        Self {
            connection,
            path: ResourcePath::session(name),
            dispatcher,
            session_open: Arc::new(AtomicBool::new(true)),
        }
    }

    /// The core of a resource living in the same Session
    pub fn child(&self, kind: ResourceKind, name: &str) -> Self {
        Self {
            connection: self.connection.clone(),
            path: ResourcePath::child(&self.path.session, kind, name),
            dispatcher: self.dispatcher.clone(),
            session_open: self.session_open.clone(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.session_open.load(Ordering::SeqCst)
    }

    pub fn close(&self) -> bool {
        self.session_open.swap(false, Ordering::SeqCst)
    }

    /// Sends `request` over this resource's connection, unless the Session
    /// handle has been closed
    pub fn request(&self, request: Request) -> Result<Reply, JsdtError> {
        if !self.is_open() {
            return Err(JsdtError::NoSuchSession {
                name: self.path.session.clone(),
            });
        }
        self.connection.request(request)
    }

    pub fn join(&self, client: &Arc<dyn Client>, mode: ChannelMode) -> Result<(), JsdtError> {
        let _registration = self.connection.register_client(client);
        self.request(Request::Join {
            path: self.path.clone(),
            client: client.name().to_string(),
            mode,
        })?
        .into_done()
    }

    pub fn leave(&self, client: &Arc<dyn Client>) -> Result<(), JsdtError> {
        self.request(Request::Leave {
            path: self.path.clone(),
            client: client.name().to_string(),
        })?
        .into_done()
    }

    pub fn invite(&self, client: &Arc<dyn Client>, invitees: &[&str]) -> Result<(), JsdtError> {
        self.request(Request::Invite {
            path: self.path.clone(),
            client: client.name().to_string(),
            invitees: invitees.iter().map(|name| name.to_string()).collect(),
        })?
        .into_done()
    }

    pub fn expel(&self, client: &Arc<dyn Client>, expellees: &[&str]) -> Result<(), JsdtError> {
        self.request(Request::Expel {
            path: self.path.clone(),
            client: client.name().to_string(),
            expellees: expellees.iter().map(|name| name.to_string()).collect(),
        })?
        .into_done()
    }

    /// Destroys the resource on its host. What this process keeps for it
    /// is dropped once the events announcing the destruction are delivered.
    pub fn destroy(&self, client: &Arc<dyn Client>) -> Result<(), JsdtError> {
        let _registration = self.connection.register_client(client);
        self.request(Request::Destroy {
            path: self.path.clone(),
            client: client.name().to_string(),
        })?
        .into_done()?;

        let endpoint = self.connection.endpoint().clone();
        self.dispatcher.retire(&endpoint, &self.path);
        let dispatcher = self.dispatcher.clone();
        let path = self.path.clone();
        self.connection
            .after_deliveries(move || dispatcher.drop_retired(&endpoint, &path));
        Ok(())
    }

    pub fn is_managed(&self) -> Result<bool, JsdtError> {
        self.request(Request::IsManaged {
            path: self.path.clone(),
        })?
        .into_flag()
    }

    pub fn list_client_names(&self) -> Result<Vec<String>, JsdtError> {
        self.request(Request::ListClients {
            path: self.path.clone(),
        })?
        .into_names()
    }

    pub fn set_manager_events(
        &self,
        manager: &ManagerHandle,
        mask: ManagerMask,
        enable: bool,
    ) -> Result<(), JsdtError> {
        self.request(Request::SetManagerEvents {
            path: self.path.clone(),
            manager: manager.clone(),
            mask,
            enable,
        })?
        .into_done()
    }

    /// Registers `listener` locally, then with the host. The local
    /// registration is undone if the host refuses.
    pub fn add_listener<L: ?Sized>(
        &self,
        listeners: &ListenerSet<L>,
        listener: Arc<L>,
        mask: EventMask,
    ) -> Result<(), JsdtError> {
        listeners.add(listener.clone(), mask);
        let registered = self
            .request(Request::AddListener {
                path: self.path.clone(),
            })
            .and_then(Reply::into_done);
        if registered.is_err() {
            let _ = listeners.remove(&listener);
        }
        registered
    }

    pub fn remove_listener<L: ?Sized>(
        &self,
        listeners: &ListenerSet<L>,
        listener: &Arc<L>,
    ) -> Result<(), JsdtError> {
        listeners.remove(listener)?;
        self.request(Request::RemoveListener {
            path: self.path.clone(),
        })?
        .into_done()
    }
}

/// Implements [`Manageable`] for a handle with a `core: ResourceCore`
/// field and its own `join_client`, `leave_client` and `destroy_by`
macro_rules! manageable_via_core {
    ($handle:ty) => {
        impl $crate::manageable::Manageable for $handle {
            fn name(&self) -> &str {
                &self.core.path.name
            }

            fn kind(&self) -> jsdt_shared::ResourceKind {
                self.core.path.kind
            }

            fn join(
                &self,
                client: &std::sync::Arc<dyn jsdt_shared::Client>,
            ) -> Result<(), jsdt_shared::JsdtError> {
                self.join_client(client)
            }

            fn leave(
                &self,
                client: &std::sync::Arc<dyn jsdt_shared::Client>,
            ) -> Result<(), jsdt_shared::JsdtError> {
                self.leave_client(client)
            }

            fn invite(
                &self,
                client: &std::sync::Arc<dyn jsdt_shared::Client>,
                invitees: &[&str],
            ) -> Result<(), jsdt_shared::JsdtError> {
                self.core.invite(client, invitees)
            }

            fn expel(
                &self,
                client: &std::sync::Arc<dyn jsdt_shared::Client>,
                expellees: &[&str],
            ) -> Result<(), jsdt_shared::JsdtError> {
                self.core.expel(client, expellees)
            }

            fn destroy(
                &self,
                client: &std::sync::Arc<dyn jsdt_shared::Client>,
            ) -> Result<(), jsdt_shared::JsdtError> {
                self.destroy_by(client)
            }

            fn is_managed(&self) -> Result<bool, jsdt_shared::JsdtError> {
                self.core.is_managed()
            }

            fn list_client_names(&self) -> Result<Vec<String>, jsdt_shared::JsdtError> {
                self.core.list_client_names()
            }

            fn enable_manager_events(
                &self,
                manager: &jsdt_shared::ManagerHandle,
                mask: jsdt_shared::ManagerMask,
            ) -> Result<(), jsdt_shared::JsdtError> {
                self.core.set_manager_events(manager, mask, true)
            }

            fn disable_manager_events(
                &self,
                manager: &jsdt_shared::ManagerHandle,
                mask: jsdt_shared::ManagerMask,
            ) -> Result<(), jsdt_shared::JsdtError> {
                self.core.set_manager_events(manager, mask, false)
            }
        }
    };
}

pub(crate) use manageable_via_core;
