use std::{collections::HashMap, sync::Arc};

use log::{debug, info};
use parking_lot::Mutex;
use smol::channel::{self, Receiver, Sender};

use super::{
    Acceptor, Endpoint, FrameReceiver, FrameSender, Link, RecvError, SendError, Transport,
    TransportError,
};
use crate::Frame;

/// Both directions of one established link, kept so the link can be severed
struct LinkRecord {
    to_server: Sender<Frame>,
    to_client: Sender<Frame>,
}

impl LinkRecord {
    fn is_closed(&self) -> bool {
        self.to_server.is_closed() && self.to_client.is_closed()
    }

    fn close(&self) {
        self.to_server.close();
        self.to_client.close();
    }
}

/// In-process transport: listeners and connections are unbounded channels
/// keyed by endpoint, so a whole deployment can run inside one process
#[derive(Default)]
pub struct LocalNetwork {
    listeners: Mutex<HashMap<Endpoint, Sender<Link>>>,
    links: Mutex<HashMap<Endpoint, Vec<LinkRecord>>>,
}

impl LocalNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn is_listening(&self, endpoint: &Endpoint) -> bool {
        self.listeners
            .lock()
            .get(endpoint)
            .map(|sender| !sender.is_closed())
            .unwrap_or(false)
    }

    /// Breaks every established connection to `endpoint`, as a network
    /// partition would. Returns how many connections were severed.
    pub fn sever(&self, endpoint: &Endpoint) -> usize {
        let records = self.links.lock().remove(endpoint).unwrap_or_default();
        let mut severed = 0;
        for record in records {
            if !record.is_closed() {
                severed += 1;
            }
            record.close();
        }
        info!("severed {} connection(s) to {}", severed, endpoint);
        severed
    }
}

impl Transport for LocalNetwork {
    fn listen(&self, endpoint: &Endpoint) -> Result<Box<dyn Acceptor>, TransportError> {
        let mut listeners = self.listeners.lock();
        if let Some(existing) = listeners.get(endpoint) {
            if !existing.is_closed() {
                return Err(TransportError::AddressInUse {
                    endpoint: endpoint.to_string(),
                });
            }
        }
        let (sender, receiver) = channel::unbounded();
        listeners.insert(endpoint.clone(), sender);
        debug!("listening on {}", endpoint);
        Ok(Box::new(LocalAcceptor { receiver }))
    }

    fn connect(&self, endpoint: &Endpoint) -> Result<Link, TransportError> {
        let not_listening = || TransportError::NotListening {
            endpoint: endpoint.to_string(),
        };
        let acceptor = self
            .listeners
            .lock()
            .get(endpoint)
            .cloned()
            .ok_or_else(not_listening)?;

        let (to_server, server_inbox) = channel::unbounded();
        let (to_client, client_inbox) = channel::unbounded();

        let server_link = Link {
            sender: Box::new(LocalSender {
                sender: to_client.clone(),
            }),
            receiver: Box::new(LocalReceiver {
                receiver: server_inbox,
            }),
        };
        acceptor.try_send(server_link).map_err(|_| not_listening())?;

        let mut links = self.links.lock();
        let records = links.entry(endpoint.clone()).or_default();
        records.retain(|record| !record.is_closed());
        records.push(LinkRecord {
            to_server: to_server.clone(),
            to_client,
        });

        Ok(Link {
            sender: Box::new(LocalSender { sender: to_server }),
            receiver: Box::new(LocalReceiver {
                receiver: client_inbox,
            }),
        })
    }

    fn unlisten(&self, endpoint: &Endpoint) {
        if let Some(sender) = self.listeners.lock().remove(endpoint) {
            sender.close();
            debug!("stopped listening on {}", endpoint);
        }
    }
}

struct LocalAcceptor {
    receiver: Receiver<Link>,
}

impl Acceptor for LocalAcceptor {
    fn accept(&mut self) -> Result<Link, RecvError> {
        self.receiver.recv_blocking().map_err(|_| RecvError)
    }
}

struct LocalSender {
    sender: Sender<Frame>,
}

impl FrameSender for LocalSender {
    fn send(&self, frame: Frame) -> Result<(), SendError> {
        self.sender.try_send(frame).map_err(|_| SendError)
    }

    fn close(&self) {
        self.sender.close();
    }
}

struct LocalReceiver {
    receiver: Receiver<Frame>,
}

impl FrameReceiver for LocalReceiver {
    fn receive(&mut self) -> Result<Frame, RecvError> {
        self.receiver.recv_blocking().map_err(|_| RecvError)
    }
}
