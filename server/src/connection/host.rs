use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
};

use log::{debug, info, warn};
use parking_lot::Mutex;
use smol::channel;

use jsdt_shared::{
    transport::{Acceptor, Endpoint, FrameReceiver, Transport, TransportError},
    ConnectionId, Frame, JsdtError, Reply, Request, RequestId,
};

use super::ServerConnection;

/// The behaviour behind a [`Host`]: what to do with requests arriving on
/// its connections
pub trait RequestHandler: Send + Sync + 'static {
    /// A peer connected
    fn connected(&self, connection: &Arc<ServerConnection>);

    /// Executes one request. Requests from one connection are handled one
    /// at a time, in arrival order.
    fn handle(
        &self,
        connection: &Arc<ServerConnection>,
        request: Request,
    ) -> Result<Reply, JsdtError>;

    /// The peer went away or the host is shutting down. Called after every
    /// queued request of the connection has been handled.
    fn disconnected(&self, connection: ConnectionId);
}

/// Accepts connections on one endpoint and serves each of them with a
/// reader thread and a worker thread
pub struct Host {
    endpoint: Endpoint,
    transport: Arc<dyn Transport>,
    connections: Arc<Mutex<HashMap<ConnectionId, Arc<ServerConnection>>>>,
    running: Arc<AtomicBool>,
}

impl Host {
    pub fn start(
        transport: Arc<dyn Transport>,
        endpoint: Endpoint,
        handler: Arc<dyn RequestHandler>,
    ) -> Result<Self, TransportError> {
        let acceptor = transport.listen(&endpoint)?;
        let connections = Arc::new(Mutex::new(HashMap::new()));
        let running = Arc::new(AtomicBool::new(true));

        let accept_connections = connections.clone();
        let accept_running = running.clone();
        let accept_endpoint = endpoint.clone();
        thread::spawn(move || {
            accept_loop(
                acceptor,
                handler,
                accept_connections,
                accept_running,
                accept_endpoint,
            )
        });

        info!("host listening on {}", endpoint);
        Ok(Self {
            endpoint,
            transport,
            connections,
            running,
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Stops accepting and closes every established connection
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.transport.unlisten(&self.endpoint);
        let connections: Vec<Arc<ServerConnection>> =
            self.connections.lock().values().cloned().collect();
        for connection in connections {
            connection.close();
        }
        info!("host on {} stopped", self.endpoint);
    }
}

impl Drop for Host {
    fn drop(&mut self) {
        self.stop();
    }
}

fn accept_loop(
    mut acceptor: Box<dyn Acceptor>,
    handler: Arc<dyn RequestHandler>,
    connections: Arc<Mutex<HashMap<ConnectionId, Arc<ServerConnection>>>>,
    running: Arc<AtomicBool>,
    endpoint: Endpoint,
) {
    let mut next_id: u64 = 0;
    while let Ok(link) = acceptor.accept() {
        if !running.load(Ordering::SeqCst) {
            link.sender.close();
            break;
        }
        next_id += 1;
        let connection = Arc::new(ServerConnection::new(
            ConnectionId::new(next_id),
            link.sender,
        ));
        debug!("{}: accepted connection {}", endpoint, connection.id());
        connections
            .lock()
            .insert(connection.id(), connection.clone());
        serve(connection, link.receiver, handler.clone(), connections.clone());
    }
    debug!("{}: no longer accepting connections", endpoint);
}

fn serve(
    connection: Arc<ServerConnection>,
    mut receiver: Box<dyn FrameReceiver>,
    handler: Arc<dyn RequestHandler>,
    connections: Arc<Mutex<HashMap<ConnectionId, Arc<ServerConnection>>>>,
) {
    handler.connected(&connection);

    let (work_sender, work_receiver) = channel::unbounded::<(RequestId, Request)>();

    // Worker
    let worker_connection = connection.clone();
    thread::spawn(move || {
        while let Ok((id, request)) = work_receiver.recv_blocking() {
            let name = request.name();
            let result = handler.handle(&worker_connection, request);
            if let Err(error) = &result {
                debug!(
                    "connection {}: {} failed: {}",
                    worker_connection.id(),
                    name,
                    error
                );
            }
            worker_connection.reply(id, result);
        }
        handler.disconnected(worker_connection.id());
        connections.lock().remove(&worker_connection.id());
    });

    // Reader
    thread::spawn(move || {
        loop {
            match receiver.receive() {
                Ok(Frame::Request { id, request }) => {
                    if work_sender.try_send((id, request)).is_err() {
                        break;
                    }
                }
                Ok(Frame::ChallengeReply { id, response }) => {
                    connection.complete_challenge(id, response);
                }
                Ok(frame) => {
                    warn!(
                        "connection {}: ignoring unexpected frame {:?}",
                        connection.id(),
                        frame
                    );
                }
                Err(_) => break,
            }
        }
        work_sender.close();
        connection.close();
    });
}
