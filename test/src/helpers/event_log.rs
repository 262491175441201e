use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use parking_lot::{Condvar, Mutex};

use jsdt_client::{
    ByteArrayListener, ChannelConsumer, ChannelListener, ClientListener, ConnectionListener,
    RegistryListener, SessionListener, TokenListener,
};
use jsdt_shared::{
    ByteArrayEvent, ChannelEvent, ClientEvent, ConnectionEvent, Data, RegistryEvent, SessionEvent,
    TokenEvent,
};

use super::WAIT;

/// Records whatever a listener or consumer is handed, so tests can wait
/// for it
pub struct EventLog<E> {
    events: Mutex<Vec<E>>,
    arrived: Condvar,
}

impl<E: Clone> EventLog<E> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
            arrived: Condvar::new(),
        })
    }

    pub fn record(&self, event: &E) {
        self.events.lock().push(event.clone());
        self.arrived.notify_all();
    }

    pub fn events(&self) -> Vec<E> {
        self.events.lock().clone()
    }

    pub fn count(&self, matches: impl Fn(&E) -> bool) -> usize {
        self.events.lock().iter().filter(|event| matches(event)).count()
    }

    /// Waits up to [`WAIT`] for `count` matching events. Returns whether
    /// they arrived.
    pub fn wait_for_count(&self, count: usize, matches: impl Fn(&E) -> bool) -> bool {
        let deadline = Instant::now() + WAIT;
        let mut events = self.events.lock();
        loop {
            if events.iter().filter(|event| matches(event)).count() >= count {
                return true;
            }
            if self.arrived.wait_until(&mut events, deadline).timed_out() {
                return events.iter().filter(|event| matches(event)).count() >= count;
            }
        }
    }

    /// Waits up to [`WAIT`] for a matching event and returns the first one
    pub fn wait_for(&self, matches: impl Fn(&E) -> bool) -> Option<E> {
        if !self.wait_for_count(1, &matches) {
            return None;
        }
        self.events.lock().iter().find(|event| matches(event)).cloned()
    }
}

/// Polls `condition` until it holds or [`WAIT`] passes
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

impl SessionListener for EventLog<SessionEvent> {
    fn session_event(&self, event: &SessionEvent) {
        self.record(event);
    }
}

impl ChannelListener for EventLog<ChannelEvent> {
    fn channel_event(&self, event: &ChannelEvent) {
        self.record(event);
    }
}

impl ByteArrayListener for EventLog<ByteArrayEvent> {
    fn byte_array_event(&self, event: &ByteArrayEvent) {
        self.record(event);
    }
}

impl TokenListener for EventLog<TokenEvent> {
    fn token_event(&self, event: &TokenEvent) {
        self.record(event);
    }
}

impl ClientListener for EventLog<ClientEvent> {
    fn client_event(&self, event: &ClientEvent) {
        self.record(event);
    }
}

impl RegistryListener for EventLog<RegistryEvent> {
    fn registry_event(&self, event: &RegistryEvent) {
        self.record(event);
    }
}

impl ConnectionListener for EventLog<ConnectionEvent> {
    fn connection_failed(&self, event: &ConnectionEvent) {
        self.record(event);
    }
}

impl ChannelConsumer for EventLog<Data> {
    fn data_received(&self, data: &Data) {
        self.record(data);
    }
}
