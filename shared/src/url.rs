use std::{
    fmt,
    hash::{Hash, Hasher},
    net::{IpAddr, ToSocketAddrs},
};

use log::debug;

use crate::{transport::Endpoint, JsdtError};

pub const URL_SCHEME: &str = "jsdt";

/// The two kinds of object the Registry binds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectType {
    Session,
    Client,
}

impl ObjectType {
    pub fn name(&self) -> &'static str {
        match self {
            ObjectType::Session => "Session",
            ObjectType::Client => "Client",
        }
    }

    fn parse(text: &str) -> Option<Self> {
        match text {
            "Session" => Some(ObjectType::Session),
            "Client" => Some(ObjectType::Client),
            _ => None,
        }
    }
}

/// A parsed `jsdt://<host>:<port>/<connectionType>/<objectType>/<objectName>`
/// identifier.
///
/// Parsing never fails outright: a malformed string produces an invalid
/// `ResourceUrl` and callers check [`ResourceUrl::is_valid`] (or use
/// [`ResourceUrl::validated`]) before use. Two identifiers are equal when
/// their resolved host addresses match, so `localhost` and `127.0.0.1` name
/// the same resource.
#[derive(Clone, Debug)]
pub struct ResourceUrl {
    text: String,
    host: String,
    host_address: Option<IpAddr>,
    port: u16,
    connection_type: String,
    object_type: ObjectType,
    object_name: String,
    valid: bool,
}

impl ResourceUrl {
    pub fn parse(text: &str) -> Self {
        match Self::try_parse(text) {
            Ok(url) => url,
            Err(reason) => {
                debug!("invalid resource url {:?}: {}", text, reason);
                Self {
                    text: text.to_string(),
                    host: String::new(),
                    host_address: None,
                    port: 0,
                    connection_type: String::new(),
                    object_type: ObjectType::Session,
                    object_name: String::new(),
                    valid: false,
                }
            }
        }
    }

    pub fn session(host: &str, port: u16, connection_type: &str, name: &str) -> Self {
        Self::build(host, port, connection_type, ObjectType::Session, name)
    }

    pub fn client(host: &str, port: u16, connection_type: &str, name: &str) -> Self {
        Self::build(host, port, connection_type, ObjectType::Client, name)
    }

    fn build(
        host: &str,
        port: u16,
        connection_type: &str,
        object_type: ObjectType,
        name: &str,
    ) -> Self {
        Self::parse(&format!(
            "{}://{}:{}/{}/{}/{}",
            URL_SCHEME,
            host,
            port,
            connection_type,
            object_type.name(),
            name
        ))
    }

    fn try_parse(text: &str) -> Result<Self, &'static str> {
        let rest = text
            .strip_prefix(URL_SCHEME)
            .and_then(|rest| rest.strip_prefix("://"))
            .ok_or("missing jsdt:// prefix")?;

        let (authority, path) = rest.split_once('/').ok_or("missing path")?;
        let (host, port) = authority.rsplit_once(':').ok_or("missing port")?;
        if host.is_empty() {
            return Err("missing host");
        }
        let port: u16 = port.parse().map_err(|_| "port is not a number")?;

        let mut tokens = path.splitn(3, '/');
        let connection_type = tokens
            .next()
            .filter(|token| !token.is_empty())
            .ok_or("missing connection type")?;
        let object_type = tokens
            .next()
            .and_then(ObjectType::parse)
            .ok_or("object type must be Session or Client")?;
        let object_name = tokens
            .next()
            .filter(|token| !token.is_empty())
            .ok_or("missing object name")?;

        Ok(Self {
            text: text.to_string(),
            host: host.to_string(),
            host_address: resolve_host(host),
            port,
            connection_type: connection_type.to_string(),
            object_type,
            object_name: object_name.to_string(),
            valid: true,
        })
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Returns this identifier, or `InvalidUrl` if it failed to parse
    pub fn validated(&self) -> Result<&Self, JsdtError> {
        if self.valid {
            Ok(self)
        } else {
            Err(JsdtError::InvalidUrl {
                url: self.text.clone(),
            })
        }
    }

    pub fn protocol(&self) -> &'static str {
        URL_SCHEME
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn host_address(&self) -> Option<IpAddr> {
        self.host_address
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn connection_type(&self) -> &str {
        &self.connection_type
    }

    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    pub fn object_name(&self) -> &str {
        &self.object_name
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// The transport endpoint hosting the object this identifier names
    pub fn endpoint(&self) -> Result<Endpoint, JsdtError> {
        self.validated()?;
        let address = self.host_address.ok_or_else(|| JsdtError::NoSuchHost {
            host: self.host.clone(),
        })?;
        Ok(Endpoint::new(address, self.port, &self.connection_type))
    }

    fn host_key(&self) -> HostKey<'_> {
        match self.host_address {
            Some(address) => HostKey::Address(address),
            None => HostKey::Name(&self.host),
        }
    }
}

#[derive(PartialEq, Eq, Hash)]
enum HostKey<'a> {
    Address(IpAddr),
    Name(&'a str),
}

impl PartialEq for ResourceUrl {
    fn eq(&self, other: &Self) -> bool {
        if !self.valid || !other.valid {
            return self.valid == other.valid && self.text == other.text;
        }
        self.host_key() == other.host_key()
            && self.port == other.port
            && self.connection_type == other.connection_type
            && self.object_type == other.object_type
            && self.object_name == other.object_name
    }
}

impl Eq for ResourceUrl {}

impl Hash for ResourceUrl {
    fn hash<H: Hasher>(&self, state: &mut H) {
        if !self.valid {
            self.text.hash(state);
            return;
        }
        self.host_key().hash(state);
        self.port.hash(state);
        self.connection_type.hash(state);
        self.object_type.hash(state);
        self.object_name.hash(state);
    }
}

impl fmt::Display for ResourceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Resolves a host name, preferring an IPv4 address so that `localhost`
/// lines up with `127.0.0.1`
pub fn resolve_host(host: &str) -> Option<IpAddr> {
    if let Ok(address) = host.parse::<IpAddr>() {
        return Some(address);
    }
    let addresses: Vec<IpAddr> = (host, 0)
        .to_socket_addrs()
        .ok()?
        .map(|socket_addr| socket_addr.ip())
        .collect();
    addresses
        .iter()
        .find(|address| address.is_ipv4())
        .or_else(|| addresses.first())
        .copied()
}
