use std::fmt;

pub type RequestId = u64;

/// Identifies one accepted connection on a server
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(value: u64) -> Self {
        ConnectionId(value)
    }

    pub fn to_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The kind of object an operation or an [`crate::AuthenticationInfo`] refers to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    ByteArray,
    Channel,
    Session,
    Token,
    Registry,
}

impl ResourceKind {
    pub fn name(&self) -> &'static str {
        match self {
            ResourceKind::ByteArray => "ByteArray",
            ResourceKind::Channel => "Channel",
            ResourceKind::Session => "Session",
            ResourceKind::Token => "Token",
            ResourceKind::Registry => "Registry",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Addresses one manageable resource on a session host. For a Session
/// itself, `name` equals `session`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourcePath {
    pub session: String,
    pub kind: ResourceKind,
    pub name: String,
}

impl ResourcePath {
    pub fn session(session: &str) -> Self {
        Self {
            session: session.to_string(),
            kind: ResourceKind::Session,
            name: session.to_string(),
        }
    }

    pub fn child(session: &str, kind: ResourceKind, name: &str) -> Self {
        Self {
            session: session.to_string(),
            kind,
            name: name.to_string(),
        }
    }

    pub fn is_session(&self) -> bool {
        self.kind == ResourceKind::Session
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_session() {
            write!(f, "Session {:?}", self.session)
        } else {
            write!(f, "{} {:?} in Session {:?}", self.kind, self.name, self.session)
        }
    }
}

/// Capability a Client joins a Channel with
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl ChannelMode {
    pub fn can_read(self) -> bool {
        matches!(self, ChannelMode::ReadOnly | ChannelMode::ReadWrite)
    }

    pub fn can_write(self) -> bool {
        matches!(self, ChannelMode::WriteOnly | ChannelMode::ReadWrite)
    }
}

impl Default for ChannelMode {
    fn default() -> Self {
        ChannelMode::ReadWrite
    }
}

/// Delivery guarantees chosen when a Channel is created
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChannelOptions {
    /// Reliable channels acknowledge every send; unreliable sends are
    /// fire-and-forget and may be dropped
    pub reliable: bool,
    /// Whether Data from one sender at one priority must arrive in send order
    pub ordered: bool,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            reliable: true,
            ordered: true,
        }
    }
}

/// Which joined Clients a piece of Data is sent to
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delivery {
    All,
    Others,
    Client(String),
}

/// Global state of a Token
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenStatus {
    NotInUse,
    Grabbed,
    Inhibited,
    Giving,
}

/// Result of a grab attempt, carrying the Token status after the attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GrabOutcome {
    Granted(TokenStatus),
    Denied(TokenStatus),
}

impl GrabOutcome {
    pub fn is_granted(&self) -> bool {
        matches!(self, GrabOutcome::Granted(_))
    }

    pub fn status(&self) -> TokenStatus {
        match self {
            GrabOutcome::Granted(status) | GrabOutcome::Denied(status) => *status,
        }
    }
}
