use crate::{
    AuthenticationInfo, ByteArrayEvent, ChannelEvent, ChannelMode, ChannelOptions, ClientEvent,
    Data, Delivery, GrabOutcome, JsdtError, ManagerHandle, ManagerMask, RegistryEvent, RequestId,
    ResourceKind, ResourcePath, ResourceUrl, SessionEvent, TokenEvent, TokenStatus,
};

/// Unit exchanged over a transport connection
#[derive(Debug)]
pub enum Frame {
    Request {
        id: RequestId,
        request: Request,
    },
    Reply {
        id: RequestId,
        result: Result<Reply, JsdtError>,
    },
    Notify(Notification),
    /// Asks the named Client on the receiving side to answer a manager's challenge
    Challenge {
        id: RequestId,
        client: String,
        info: AuthenticationInfo,
    },
    ChallengeReply {
        id: RequestId,
        response: Option<Vec<u8>>,
    },
}

/// Operations a client sends to a Registry or to a session host
#[derive(Debug)]
pub enum Request {
    Ping,

    // Registry
    Bind {
        url: ResourceUrl,
        client: String,
    },
    Unbind {
        url: ResourceUrl,
        client: String,
    },
    Lookup {
        url: ResourceUrl,
    },
    List,
    AddRegistryListener,
    RemoveRegistryListener,

    // Session host
    RegisterClient {
        client: String,
    },
    UnregisterClient {
        client: String,
    },
    CreateSession {
        session: String,
        client: String,
        manager: Option<ManagerHandle>,
    },
    CreateResource {
        session: String,
        kind: ResourceKind,
        name: String,
        client: String,
        options: ChannelOptions,
        manager: Option<ManagerHandle>,
    },
    Exists {
        path: ResourcePath,
    },
    IsManaged {
        path: ResourcePath,
    },
    ListNames {
        session: String,
        kind: ResourceKind,
    },
    JoinedNames {
        session: String,
        kind: ResourceKind,
        client: String,
    },

    // Manageable
    Join {
        path: ResourcePath,
        client: String,
        mode: ChannelMode,
    },
    Leave {
        path: ResourcePath,
        client: String,
    },
    Invite {
        path: ResourcePath,
        client: String,
        invitees: Vec<String>,
    },
    Expel {
        path: ResourcePath,
        client: String,
        expellees: Vec<String>,
    },
    Destroy {
        path: ResourcePath,
        client: String,
    },
    ListClients {
        path: ResourcePath,
    },
    AddListener {
        path: ResourcePath,
    },
    RemoveListener {
        path: ResourcePath,
    },
    SetManagerEvents {
        path: ResourcePath,
        manager: ManagerHandle,
        mask: ManagerMask,
        enable: bool,
    },

    // Channel
    ChannelOptions {
        session: String,
        channel: String,
    },
    Send {
        session: String,
        channel: String,
        sender: String,
        delivery: Delivery,
        data: Data,
    },
    AddConsumer {
        session: String,
        channel: String,
        client: String,
    },
    RemoveConsumer {
        session: String,
        channel: String,
        client: String,
    },

    // ByteArray
    GetValue {
        session: String,
        name: String,
    },
    SetValue {
        session: String,
        name: String,
        client: String,
        value: Vec<u8>,
    },

    // Token
    Grab {
        session: String,
        token: String,
        client: String,
        exclusive: bool,
    },
    Release {
        session: String,
        token: String,
        client: String,
    },
    Give {
        session: String,
        token: String,
        client: String,
        recipient: String,
    },
    RequestToken {
        session: String,
        token: String,
        client: String,
    },
    Test {
        session: String,
        token: String,
    },
    ListHolders {
        session: String,
        token: String,
    },
}

impl Request {
    /// Short name used in logs and timeout errors
    pub fn name(&self) -> &'static str {
        match self {
            Request::Ping => "ping",
            Request::Bind { .. } => "bind",
            Request::Unbind { .. } => "unbind",
            Request::Lookup { .. } => "lookup",
            Request::List => "list",
            Request::AddRegistryListener => "add registry listener",
            Request::RemoveRegistryListener => "remove registry listener",
            Request::RegisterClient { .. } => "register client",
            Request::UnregisterClient { .. } => "unregister client",
            Request::CreateSession { .. } => "create session",
            Request::CreateResource { .. } => "create resource",
            Request::Exists { .. } => "exists",
            Request::IsManaged { .. } => "is managed",
            Request::ListNames { .. } => "list names",
            Request::JoinedNames { .. } => "joined names",
            Request::Join { .. } => "join",
            Request::Leave { .. } => "leave",
            Request::Invite { .. } => "invite",
            Request::Expel { .. } => "expel",
            Request::Destroy { .. } => "destroy",
            Request::ListClients { .. } => "list clients",
            Request::AddListener { .. } => "add listener",
            Request::RemoveListener { .. } => "remove listener",
            Request::SetManagerEvents { .. } => "set manager events",
            Request::ChannelOptions { .. } => "channel options",
            Request::Send { .. } => "send",
            Request::AddConsumer { .. } => "add consumer",
            Request::RemoveConsumer { .. } => "remove consumer",
            Request::GetValue { .. } => "get value",
            Request::SetValue { .. } => "set value",
            Request::Grab { .. } => "grab",
            Request::Release { .. } => "release",
            Request::Give { .. } => "give",
            Request::RequestToken { .. } => "request",
            Request::Test { .. } => "test",
            Request::ListHolders { .. } => "list holders",
        }
    }
}

/// Successful answer to a [`Request`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    Done,
    Pong { registry: bool },
    Flag(bool),
    Names(Vec<String>),
    Url(ResourceUrl),
    Urls(Vec<ResourceUrl>),
    Value(Vec<u8>),
    Status(TokenStatus),
    Grab(GrabOutcome),
    Created { existed: bool },
    Options(ChannelOptions),
}

impl Reply {
    fn unexpected(self, wanted: &str) -> JsdtError {
        JsdtError::connection(format!("expected {} reply, got {:?}", wanted, self))
    }

    pub fn into_done(self) -> Result<(), JsdtError> {
        match self {
            Reply::Done => Ok(()),
            other => Err(other.unexpected("done")),
        }
    }

    pub fn into_flag(self) -> Result<bool, JsdtError> {
        match self {
            Reply::Flag(flag) => Ok(flag),
            other => Err(other.unexpected("flag")),
        }
    }

    pub fn into_names(self) -> Result<Vec<String>, JsdtError> {
        match self {
            Reply::Names(names) => Ok(names),
            other => Err(other.unexpected("names")),
        }
    }

    pub fn into_url(self) -> Result<ResourceUrl, JsdtError> {
        match self {
            Reply::Url(url) => Ok(url),
            other => Err(other.unexpected("url")),
        }
    }

    pub fn into_urls(self) -> Result<Vec<ResourceUrl>, JsdtError> {
        match self {
            Reply::Urls(urls) => Ok(urls),
            other => Err(other.unexpected("urls")),
        }
    }

    pub fn into_value(self) -> Result<Vec<u8>, JsdtError> {
        match self {
            Reply::Value(value) => Ok(value),
            other => Err(other.unexpected("value")),
        }
    }

    pub fn into_status(self) -> Result<TokenStatus, JsdtError> {
        match self {
            Reply::Status(status) => Ok(status),
            other => Err(other.unexpected("status")),
        }
    }

    pub fn into_grab(self) -> Result<GrabOutcome, JsdtError> {
        match self {
            Reply::Grab(outcome) => Ok(outcome),
            other => Err(other.unexpected("grab")),
        }
    }

    pub fn into_options(self) -> Result<ChannelOptions, JsdtError> {
        match self {
            Reply::Options(options) => Ok(options),
            other => Err(other.unexpected("options")),
        }
    }

    pub fn into_created(self) -> Result<bool, JsdtError> {
        match self {
            Reply::Created { existed } => Ok(existed),
            other => Err(other.unexpected("created")),
        }
    }
}

/// Pushed by a server to a connection without being asked for
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification {
    Session(SessionEvent),
    Channel(ChannelEvent),
    ByteArray(ByteArrayEvent),
    Token(TokenEvent),
    Client(ClientEvent),
    Registry(RegistryEvent),
    Data {
        session: String,
        channel: String,
        receiver: String,
        data: Data,
    },
}
