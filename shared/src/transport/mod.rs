//! Transport collaborator interface. Concrete wire transports (socket,
//! HTTP, multicast) plug in behind these traits; [`LocalNetwork`] is the
//! in-process implementation.

use std::{fmt, net::IpAddr};

use crate::Frame;

mod error;
mod local;

pub use error::{RecvError, SendError, TransportError};
pub use local::LocalNetwork;

/// A resolved address a server listens on: host address, port and
/// connection type
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Endpoint {
    pub address: IpAddr,
    pub port: u16,
    pub connection_type: String,
}

impl Endpoint {
    pub fn new(address: IpAddr, port: u16, connection_type: &str) -> Self {
        Self {
            address,
            port,
            connection_type: connection_type.to_string(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.address, self.port, self.connection_type)
    }
}

pub trait FrameSender: Send + Sync {
    /// Queues a frame for the peer
    fn send(&self, frame: Frame) -> Result<(), SendError>;

    /// Closes this direction of the connection. The peer's receiver fails
    /// once it has drained what was already sent.
    fn close(&self);
}

pub trait FrameReceiver: Send {
    /// Blocks until the next frame arrives or the connection closes
    fn receive(&mut self) -> Result<Frame, RecvError>;
}

/// Both halves of one established connection
pub struct Link {
    pub sender: Box<dyn FrameSender>,
    pub receiver: Box<dyn FrameReceiver>,
}

pub trait Acceptor: Send {
    /// Blocks until a peer connects or the listener is shut down
    fn accept(&mut self) -> Result<Link, RecvError>;
}

pub trait Transport: Send + Sync {
    fn listen(&self, endpoint: &Endpoint) -> Result<Box<dyn Acceptor>, TransportError>;

    fn connect(&self, endpoint: &Endpoint) -> Result<Link, TransportError>;

    /// Stops accepting on `endpoint`; established connections are untouched
    fn unlisten(&self, endpoint: &Endpoint);
}
