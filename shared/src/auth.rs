use std::{fmt, sync::Arc};

use crate::{ManagerMask, ResourceKind};

/// Privileged actions a manager may be asked to authorize
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AuthAction {
    CreateByteArray,
    CreateChannel,
    CreateToken,
    CreateSession,
    CreateClient,
    DestroyByteArray,
    DestroyChannel,
    DestroyToken,
    DestroySession,
    DestroyClient,
    Join,
}

impl AuthAction {
    pub fn create(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::ByteArray => AuthAction::CreateByteArray,
            ResourceKind::Channel => AuthAction::CreateChannel,
            ResourceKind::Token => AuthAction::CreateToken,
            ResourceKind::Session | ResourceKind::Registry => AuthAction::CreateSession,
        }
    }

    pub fn destroy(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::ByteArray => AuthAction::DestroyByteArray,
            ResourceKind::Channel => AuthAction::DestroyChannel,
            ResourceKind::Token => AuthAction::DestroyToken,
            ResourceKind::Session | ResourceKind::Registry => AuthAction::DestroySession,
        }
    }

    /// The manager event bit that decides whether this action is checked
    pub fn mask(self) -> ManagerMask {
        match self {
            AuthAction::Join => ManagerMask::JOIN,
            AuthAction::CreateByteArray
            | AuthAction::CreateChannel
            | AuthAction::CreateToken
            | AuthAction::CreateSession
            | AuthAction::CreateClient => ManagerMask::CREATE,
            AuthAction::DestroyByteArray
            | AuthAction::DestroyChannel
            | AuthAction::DestroyToken
            | AuthAction::DestroySession
            | AuthAction::DestroyClient => ManagerMask::DESTROY,
        }
    }
}

/// Describes a privileged action to the manager guarding it, and carries
/// the manager's challenge to the Client being authenticated. Challenges and
/// responses are opaque bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticationInfo {
    session: String,
    action: AuthAction,
    name: String,
    kind: ResourceKind,
    challenge: Option<Vec<u8>>,
}

impl AuthenticationInfo {
    pub fn new(session: &str, action: AuthAction, name: &str, kind: ResourceKind) -> Self {
        Self {
            session: session.to_string(),
            action,
            name: name.to_string(),
            kind,
            challenge: None,
        }
    }

    pub fn session_name(&self) -> &str {
        &self.session
    }

    pub fn action(&self) -> AuthAction {
        self.action
    }

    /// Name of the object the action targets
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn challenge(&self) -> Option<&[u8]> {
        self.challenge.as_deref()
    }

    pub fn set_challenge(&mut self, challenge: impl Into<Vec<u8>>) {
        self.challenge = Some(challenge.into());
    }
}

/// An application identity taking part in sessions.
///
/// `authenticate` is called when a manager challenges this Client; the
/// returned bytes are handed back to the manager unchanged.
pub trait Client: Send + Sync {
    fn name(&self) -> &str;

    fn authenticate(&self, info: &AuthenticationInfo) -> Option<Vec<u8>>;
}

/// Authority guarding the privileged operations of one resource.
///
/// The manager may set a challenge on `info` and forward it with
/// `client.authenticate(info)`; it returns whether the action is allowed.
pub trait ResourceManager: Send + Sync {
    fn authorize(&self, info: &mut AuthenticationInfo, client: &dyn Client) -> bool;
}

/// A shareable manager reference. Two handles are the same manager when
/// they point at the same object.
#[derive(Clone)]
pub struct ManagerHandle(Arc<dyn ResourceManager>);

impl ManagerHandle {
    pub fn new(manager: Arc<dyn ResourceManager>) -> Self {
        Self(manager)
    }

    pub fn manager(&self) -> &dyn ResourceManager {
        self.0.as_ref()
    }

    pub fn is_same(&self, other: &ManagerHandle) -> bool {
        Arc::as_ptr(&self.0) as *const () == Arc::as_ptr(&other.0) as *const ()
    }
}

impl From<Arc<dyn ResourceManager>> for ManagerHandle {
    fn from(manager: Arc<dyn ResourceManager>) -> Self {
        Self::new(manager)
    }
}

impl fmt::Debug for ManagerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ManagerHandle({:p})", Arc::as_ptr(&self.0) as *const ())
    }
}
