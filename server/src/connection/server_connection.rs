use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, AtomicU64, Ordering},
    time::Duration,
};

use log::{debug, trace, warn};
use parking_lot::Mutex;
use smol::{channel, channel::Sender, future, Timer};

use jsdt_shared::{
    transport::FrameSender, AuthenticationInfo, ConnectionId, Frame, JsdtError, Notification,
    Reply, RequestId,
};

/// The server's half of one accepted connection. Requests are answered and
/// notifications pushed through it; it also carries authentication
/// challenges to the Clients living on the other side.
pub struct ServerConnection {
    id: ConnectionId,
    sender: Box<dyn FrameSender>,
    challenges: Mutex<HashMap<RequestId, Sender<Option<Vec<u8>>>>>,
    next_challenge: AtomicU64,
    closed: AtomicBool,
}

impl ServerConnection {
    pub fn new(id: ConnectionId, sender: Box<dyn FrameSender>) -> Self {
        Self {
            id,
            sender,
            challenges: Mutex::new(HashMap::new()),
            next_challenge: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Pushes an unsolicited notification to the peer. Returns false if the
    /// connection is gone.
    pub fn notify(&self, notification: Notification) -> bool {
        if self.is_closed() {
            return false;
        }
        match self.sender.send(Frame::Notify(notification)) {
            Ok(()) => true,
            Err(error) => {
                debug!("connection {}: dropping notification: {}", self.id, error);
                false
            }
        }
    }

    pub fn reply(&self, id: RequestId, result: Result<Reply, JsdtError>) {
        if self.sender.send(Frame::Reply { id, result }).is_err() {
            trace!("connection {}: reply {} dropped, peer is gone", self.id, id);
        }
    }

    /// Asks the named Client on the other side of this connection to answer
    /// `info`, waiting at most `timeout` for its response
    pub fn challenge(
        &self,
        client: &str,
        info: &AuthenticationInfo,
        timeout: Duration,
    ) -> Result<Option<Vec<u8>>, JsdtError> {
        let id = self.next_challenge.fetch_add(1, Ordering::SeqCst);
        let (response_sender, response_receiver) = channel::bounded(1);
        self.challenges.lock().insert(id, response_sender);

        if self.is_closed() {
            self.challenges.lock().remove(&id);
            return Err(JsdtError::connection(format!(
                "connection {} closed before authenticating {:?}",
                self.id, client
            )));
        }

        let frame = Frame::Challenge {
            id,
            client: client.to_string(),
            info: info.clone(),
        };
        if let Err(error) = self.sender.send(frame) {
            self.challenges.lock().remove(&id);
            return Err(error.into());
        }

        let connection_id = self.id;
        let outcome = future::block_on(future::or(
            async {
                response_receiver.recv().await.map_err(|_| {
                    JsdtError::connection(format!(
                        "connection {} closed while authenticating",
                        connection_id
                    ))
                })
            },
            async {
                Timer::after(timeout).await;
                Err(JsdtError::timed_out("authentication"))
            },
        ));

        self.challenges.lock().remove(&id);
        outcome
    }

    /// Hands a Client's answer to the challenge waiting for it
    pub(crate) fn complete_challenge(&self, id: RequestId, response: Option<Vec<u8>>) {
        match self.challenges.lock().remove(&id) {
            Some(waiter) => {
                let _ = waiter.try_send(response);
            }
            None => warn!(
                "connection {}: answer to unknown or expired challenge {}",
                self.id, id
            ),
        }
    }

    /// Closes the connection; pending challenges fail immediately
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.challenges.lock().clear();
        self.sender.close();
        debug!("connection {} closed", self.id);
    }
}
