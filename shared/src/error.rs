use thiserror::Error;

/// Broad category of a [`JsdtError`], used by callers that only care about
/// how to react to a failure rather than which resource it concerned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Unauthorized,
    InvalidInput,
    Timeout,
    ConnectivityFailure,
    ProtocolViolation,
}

/// Every failure the toolkit reports to the calling application
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JsdtError {
    /// The named Session does not exist (or has been destroyed)
    #[error("Session {name:?} does not exist")]
    NoSuchSession { name: String },

    /// The named Channel does not exist within its Session
    #[error("Channel {name:?} does not exist")]
    NoSuchChannel { name: String },

    /// The named ByteArray does not exist within its Session
    #[error("ByteArray {name:?} does not exist")]
    NoSuchByteArray { name: String },

    /// The named Token does not exist within its Session
    #[error("Token {name:?} does not exist")]
    NoSuchToken { name: String },

    /// The Client is unknown to the resource it is acting upon
    #[error("Client {name:?} is not known to this resource")]
    NoSuchClient { name: String },

    /// The Client has no Channel consumer registered
    #[error("Client {client:?} has no consumer registered on this channel")]
    NoSuchConsumer { client: String },

    /// The listener was never registered with this resource
    #[error("Listener is not registered with this resource")]
    NoSuchListener,

    /// The manager is not the manager of this resource
    #[error("Manager is not attached to {name:?}")]
    NoSuchManager { name: String },

    /// The host name could not be resolved
    #[error("Host {host:?} could not be resolved")]
    NoSuchHost { host: String },

    /// No Registry answers at the given address
    #[error("No registry is running at {address}")]
    NoRegistry { address: String },

    /// The identifier is already bound in the Registry
    #[error("{url} is already bound in the registry")]
    AlreadyBound { url: String },

    /// The identifier is not bound in the Registry
    #[error("{url} is not bound in the registry")]
    NotBound { url: String },

    /// A Client with this name is already a member
    #[error("Name {name:?} is already in use")]
    NameInUse { name: String },

    /// The resource already has a manager attached
    #[error("{name:?} already has a manager attached")]
    ManagerExists { name: String },

    /// The operation was refused by the resource's manager or by policy
    #[error("Permission denied: {reason}")]
    PermissionDenied { reason: String },

    /// The resource identifier failed to parse
    #[error("Invalid URL {url:?}")]
    InvalidUrl { url: String },

    /// The Client cannot be used for this operation
    #[error("Invalid client: {reason}")]
    InvalidClient { reason: String },

    /// A payload could not be decoded into the requested type
    #[error("Invalid data: {reason}")]
    InvalidData { reason: String },

    /// A blocking operation did not complete in time
    #[error("{operation} timed out")]
    TimedOut { operation: String },

    /// The underlying transport failed
    #[error("Connection error: {reason}")]
    ConnectionError { reason: String },

    /// The port is already used by something other than a Registry
    #[error("Port {port} is already in use")]
    PortInUse { port: u16 },

    /// A Registry is already running on the port
    #[error("A registry is already running on port {port}")]
    RegistryExists { port: u16 },

    /// The Client does not hold the Token
    #[error("Client {client:?} is not holding token {token:?}")]
    ClientNotGrabbing { client: String, token: String },

    /// The Client still holds the Token
    #[error("Client {client:?} has not released token {token:?}")]
    ClientNotReleased { client: String, token: String },
}

impl JsdtError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            JsdtError::NoSuchSession { .. }
            | JsdtError::NoSuchChannel { .. }
            | JsdtError::NoSuchByteArray { .. }
            | JsdtError::NoSuchToken { .. }
            | JsdtError::NoSuchClient { .. }
            | JsdtError::NoSuchConsumer { .. }
            | JsdtError::NoSuchListener
            | JsdtError::NoSuchManager { .. }
            | JsdtError::NoSuchHost { .. }
            | JsdtError::NotBound { .. } => ErrorKind::NotFound,
            JsdtError::AlreadyBound { .. }
            | JsdtError::NameInUse { .. }
            | JsdtError::ManagerExists { .. } => ErrorKind::Conflict,
            JsdtError::PermissionDenied { .. } => ErrorKind::Unauthorized,
            JsdtError::InvalidUrl { .. }
            | JsdtError::InvalidClient { .. }
            | JsdtError::InvalidData { .. } => ErrorKind::InvalidInput,
            JsdtError::TimedOut { .. } => ErrorKind::Timeout,
            JsdtError::ConnectionError { .. }
            | JsdtError::PortInUse { .. }
            | JsdtError::NoRegistry { .. }
            | JsdtError::RegistryExists { .. } => ErrorKind::ConnectivityFailure,
            JsdtError::ClientNotGrabbing { .. } | JsdtError::ClientNotReleased { .. } => {
                ErrorKind::ProtocolViolation
            }
        }
    }

    pub fn timed_out(operation: impl Into<String>) -> Self {
        JsdtError::TimedOut {
            operation: operation.into(),
        }
    }

    pub fn connection(reason: impl Into<String>) -> Self {
        JsdtError::ConnectionError {
            reason: reason.into(),
        }
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        JsdtError::PermissionDenied {
            reason: reason.into(),
        }
    }
}
