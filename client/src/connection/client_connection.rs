use std::{
    collections::HashMap,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use log::{debug, info, trace, warn};
use parking_lot::Mutex;
use smol::{channel, channel::Sender, future, Timer};

use jsdt_shared::{
    transport::{Endpoint, FrameReceiver, FrameSender, Link},
    AuthenticationInfo, Client, Frame, JsdtError, Notification, Reply, Request, RequestId,
};

/// Receives what a connection's background threads produce
pub(crate) trait ConnectionObserver: Send + Sync {
    /// Called in arrival order from the connection's delivery thread
    fn notification(&self, connection: &Arc<ClientConnection>, notification: Notification);

    /// Called once when the connection fails without having been closed
    /// locally
    fn failed(&self, connection: &Arc<ClientConnection>, reason: &str);
}

/// What the delivery thread works through, in order
enum Inbound {
    Notification(Notification),
    Task(Box<dyn FnOnce() + Send>),
}

/// Keeps a Client answerable to challenges on a connection while it lives
pub(crate) struct ClientRegistration {
    connection: Arc<ClientConnection>,
    name: String,
}

impl Drop for ClientRegistration {
    fn drop(&mut self) {
        let mut clients = self.connection.clients.lock();
        if let Some((_, count)) = clients.get_mut(&self.name) {
            *count -= 1;
            if *count == 0 {
                clients.remove(&self.name);
            }
        }
    }
}

/// The client half of a connection to a Registry or a Session host.
///
/// Requests block the calling thread until the matching reply arrives, the
/// timeout passes or the connection fails. A reader thread routes replies
/// to their callers and hands notifications to a single delivery thread, so
/// events of one connection are delivered in the order they were sent.
pub struct ClientConnection {
    endpoint: Endpoint,
    host: String,
    sender: Box<dyn FrameSender>,
    pending: Mutex<HashMap<RequestId, Sender<Result<Reply, JsdtError>>>>,
    next_request: AtomicU64,
    // Clients with a request in flight that may be challenged, by name,
    // with how many such requests each has
    clients: Mutex<HashMap<String, (Arc<dyn Client>, usize)>>,
    delivery: Sender<Inbound>,
    closed: AtomicBool,
    timeout: Duration,
}

impl ClientConnection {
    pub(crate) fn open(
        link: Link,
        endpoint: Endpoint,
        host: &str,
        timeout: Duration,
        observer: Arc<dyn ConnectionObserver>,
    ) -> Arc<Self> {
        let Link { sender, receiver } = link;
        let (delivery_sender, delivery_receiver) = channel::unbounded::<Inbound>();
        let connection = Arc::new(Self {
            endpoint,
            host: host.to_string(),
            sender,
            pending: Mutex::new(HashMap::new()),
            next_request: AtomicU64::new(1),
            clients: Mutex::new(HashMap::new()),
            delivery: delivery_sender,
            closed: AtomicBool::new(false),
            timeout,
        });

        // Delivery
        let delivery_connection = connection.clone();
        let delivery_observer = observer.clone();
        thread::spawn(move || {
            while let Ok(inbound) = delivery_receiver.recv_blocking() {
                match inbound {
                    Inbound::Notification(notification) => {
                        delivery_observer.notification(&delivery_connection, notification)
                    }
                    Inbound::Task(task) => task(),
                }
            }
        });

        // Reader
        let reader_connection = connection.clone();
        thread::spawn(move || {
            reader_connection.read(receiver);
            reader_connection.fail(observer.as_ref(), "connection closed by peer");
        });

        info!("connected to {}", connection.endpoint);
        connection
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// The host name this connection was opened for
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Makes `client` answerable when a manager challenges it over this
    /// connection, until the returned registration is dropped
    pub(crate) fn register_client(
        self: &Arc<Self>,
        client: &Arc<dyn Client>,
    ) -> ClientRegistration {
        let name = client.name().to_string();
        self.clients
            .lock()
            .entry(name.clone())
            .or_insert_with(|| (client.clone(), 0))
            .1 += 1;
        ClientRegistration {
            connection: self.clone(),
            name,
        }
    }

    /// Runs `task` on the delivery thread once every notification that has
    /// arrived so far is delivered, or right away if nothing is delivered
    /// any more
    pub(crate) fn after_deliveries(&self, task: impl FnOnce() + Send + 'static) {
        if let Err(error) = self.delivery.try_send(Inbound::Task(Box::new(task))) {
            if let Inbound::Task(task) = error.into_inner() {
                task();
            }
        }
    }

    pub fn request(&self, request: Request) -> Result<Reply, JsdtError> {
        self.request_within(request, self.timeout)
    }

    /// Sends `request` and blocks until its reply arrives or `timeout`
    /// passes. A timed out request is forgotten; its late reply is dropped.
    pub fn request_within(&self, request: Request, timeout: Duration) -> Result<Reply, JsdtError> {
        let name = request.name();
        let id = self.next_request.fetch_add(1, Ordering::SeqCst);
        let (reply_sender, reply_receiver) = channel::bounded(1);
        self.pending.lock().insert(id, reply_sender);

        if self.is_closed() {
            self.pending.lock().remove(&id);
            return Err(self.closed_error());
        }
        if let Err(error) = self.sender.send(Frame::Request { id, request }) {
            self.pending.lock().remove(&id);
            return Err(error.into());
        }
        trace!("{}: sent {} request {}", self.endpoint, name, id);

        let endpoint = &self.endpoint;
        let outcome = future::block_on(future::or(
            async {
                match reply_receiver.recv().await {
                    Ok(result) => result,
                    Err(_) => Err(JsdtError::connection(format!(
                        "connection to {} failed during {}",
                        endpoint, name
                    ))),
                }
            },
            async {
                Timer::after(timeout).await;
                Err(JsdtError::timed_out(name))
            },
        ));

        self.pending.lock().remove(&id);
        outcome
    }

    /// Closes the connection from this side. Pending requests fail and no
    /// ConnectionListener is told.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.sender.close();
        self.fail_pending("connection closed");
        info!("closed connection to {}", self.endpoint);
    }

    fn closed_error(&self) -> JsdtError {
        JsdtError::connection(format!("connection to {} is closed", self.endpoint))
    }

    fn fail_pending(&self, reason: &str) {
        let pending: Vec<_> = self.pending.lock().drain().collect();
        for (_, waiter) in pending {
            let _ = waiter.try_send(Err(JsdtError::connection(format!(
                "{}: {}",
                self.endpoint, reason
            ))));
        }
    }

    fn fail(self: &Arc<Self>, observer: &dyn ConnectionObserver, reason: &str) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        warn!("connection to {} failed: {}", self.endpoint, reason);
        self.sender.close();
        self.fail_pending(reason);
        observer.failed(self, reason);
    }

    fn read(self: &Arc<Self>, mut receiver: Box<dyn FrameReceiver>) {
        while let Ok(frame) = receiver.receive() {
            match frame {
                Frame::Reply { id, result } => match self.pending.lock().remove(&id) {
                    Some(waiter) => {
                        let _ = waiter.try_send(result);
                    }
                    None => trace!("{}: dropping reply {} nobody waits for", self.endpoint, id),
                },
                Frame::Notify(notification) => {
                    let _ = self.delivery.try_send(Inbound::Notification(notification));
                }
                Frame::Challenge { id, client, info } => self.answer_challenge(id, client, info),
                frame => warn!("{}: ignoring unexpected frame {:?}", self.endpoint, frame),
            }
        }
        self.delivery.close();
    }

    /// Runs the challenged Client's `authenticate` off the reader thread,
    /// since it may itself issue requests
    fn answer_challenge(self: &Arc<Self>, id: RequestId, client: String, info: AuthenticationInfo) {
        let target = self
            .clients
            .lock()
            .get(&client)
            .map(|(target, _)| target.clone());
        let connection = self.clone();
        thread::spawn(move || {
            let response = match target {
                Some(target) => {
                    match panic::catch_unwind(AssertUnwindSafe(|| target.authenticate(&info))) {
                        Ok(response) => response,
                        Err(_) => {
                            warn!("client {:?} panicked while authenticating", client);
                            None
                        }
                    }
                }
                None => {
                    debug!(
                        "{}: challenge for unknown client {:?}",
                        connection.endpoint, client
                    );
                    None
                }
            };
            if connection
                .sender
                .send(Frame::ChallengeReply { id, response })
                .is_err()
            {
                debug!("{}: challenge reply dropped", connection.endpoint);
            }
        });
    }
}
