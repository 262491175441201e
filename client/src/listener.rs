//! Callback traits through which events and Channel data reach the
//! application.
//!
//! Listeners are called from the delivery thread of the connection the
//! event arrived on. A listener registered with resources reached over
//! different connections may therefore be called concurrently, and it has
//! to serialize itself if that matters. A panicking listener is logged and
//! skipped; it does not stop delivery to the others.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use log::warn;
use parking_lot::Mutex;

use jsdt_shared::{
    ByteArrayEvent, ChannelEvent, ClientEvent, ConnectionEvent, Data, EventMask, JsdtError,
    RegistryEvent, SessionEvent, TokenEvent,
};

pub trait SessionListener: Send + Sync {
    fn session_event(&self, event: &SessionEvent);
}

pub trait ChannelListener: Send + Sync {
    fn channel_event(&self, event: &ChannelEvent);
}

pub trait ByteArrayListener: Send + Sync {
    fn byte_array_event(&self, event: &ByteArrayEvent);
}

pub trait TokenListener: Send + Sync {
    fn token_event(&self, event: &TokenEvent);
}

/// Told about events addressed to one Client: invitations, expulsions, and
/// Tokens being given to it or requested from it
pub trait ClientListener: Send + Sync {
    fn client_event(&self, event: &ClientEvent);
}

pub trait RegistryListener: Send + Sync {
    fn registry_event(&self, event: &RegistryEvent);
}

/// Told once when a connection to a host fails, then forgotten
pub trait ConnectionListener: Send + Sync {
    fn connection_failed(&self, event: &ConnectionEvent);
}

/// Receives the Data sent to one Client over a Channel
pub trait ChannelConsumer: Send + Sync {
    fn data_received(&self, data: &Data);
}

impl<F: Fn(&SessionEvent) + Send + Sync> SessionListener for F {
    fn session_event(&self, event: &SessionEvent) {
        self(event)
    }
}

impl<F: Fn(&ChannelEvent) + Send + Sync> ChannelListener for F {
    fn channel_event(&self, event: &ChannelEvent) {
        self(event)
    }
}

impl<F: Fn(&ByteArrayEvent) + Send + Sync> ByteArrayListener for F {
    fn byte_array_event(&self, event: &ByteArrayEvent) {
        self(event)
    }
}

impl<F: Fn(&TokenEvent) + Send + Sync> TokenListener for F {
    fn token_event(&self, event: &TokenEvent) {
        self(event)
    }
}

impl<F: Fn(&ClientEvent) + Send + Sync> ClientListener for F {
    fn client_event(&self, event: &ClientEvent) {
        self(event)
    }
}

impl<F: Fn(&RegistryEvent) + Send + Sync> RegistryListener for F {
    fn registry_event(&self, event: &RegistryEvent) {
        self(event)
    }
}

impl<F: Fn(&ConnectionEvent) + Send + Sync> ConnectionListener for F {
    fn connection_failed(&self, event: &ConnectionEvent) {
        self(event)
    }
}

impl<F: Fn(&Data) + Send + Sync> ChannelConsumer for F {
    fn data_received(&self, data: &Data) {
        self(data)
    }
}

/// Listeners are the same registration when they point at the same object
pub(crate) fn same_listener<L: ?Sized>(a: &Arc<L>, b: &Arc<L>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

/// Calls `deliver`, containing any panic it raises
pub(crate) fn isolated(what: &str, deliver: impl FnOnce()) {
    if panic::catch_unwind(AssertUnwindSafe(deliver)).is_err() {
        warn!("{} panicked during delivery, continuing with the rest", what);
    }
}

struct Registration<L: ?Sized> {
    listener: Arc<L>,
    mask: EventMask,
}

/// The listeners of one resource, each with the event kinds it wants
pub(crate) struct ListenerSet<L: ?Sized> {
    registrations: Mutex<Vec<Registration<L>>>,
}

impl<L: ?Sized> Default for ListenerSet<L> {
    fn default() -> Self {
        Self {
            registrations: Mutex::new(Vec::new()),
        }
    }
}

impl<L: ?Sized> ListenerSet<L> {
    pub fn add(&self, listener: Arc<L>, mask: EventMask) {
        self.registrations
            .lock()
            .push(Registration { listener, mask });
    }

    /// Removes one registration of `listener`
    pub fn remove(&self, listener: &Arc<L>) -> Result<(), JsdtError> {
        let mut registrations = self.registrations.lock();
        let index = registrations
            .iter()
            .position(|registration| same_listener(&registration.listener, listener))
            .ok_or(JsdtError::NoSuchListener)?;
        registrations.remove(index);
        Ok(())
    }

    pub fn contains(&self, listener: &Arc<L>) -> bool {
        self.registrations
            .lock()
            .iter()
            .any(|registration| same_listener(&registration.listener, listener))
    }

    /// Turns the event kinds in `mask` on or off for `listener`
    pub fn set_events(
        &self,
        listener: &Arc<L>,
        mask: EventMask,
        enable: bool,
    ) -> Result<(), JsdtError> {
        let mut registrations = self.registrations.lock();
        let mut found = false;
        for registration in registrations
            .iter_mut()
            .filter(|registration| same_listener(&registration.listener, listener))
        {
            registration.mask.set(mask, enable);
            found = true;
        }
        if found {
            Ok(())
        } else {
            Err(JsdtError::NoSuchListener)
        }
    }

    pub fn len(&self) -> usize {
        self.registrations.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.lock().is_empty()
    }

    /// Removes every registration, handing them back
    pub fn drain(&self) -> Vec<Arc<L>> {
        self.registrations
            .lock()
            .drain(..)
            .map(|registration| registration.listener)
            .collect()
    }

    /// Calls `deliver` for every listener whose mask selects `kind`. The
    /// lock is not held while listeners run, so they may add or remove
    /// listeners themselves.
    pub fn notify(&self, kind: EventMask, deliver: impl Fn(&L)) {
        let selected: Vec<Arc<L>> = self
            .registrations
            .lock()
            .iter()
            .filter(|registration| registration.mask.contains(kind))
            .map(|registration| registration.listener.clone())
            .collect();
        for listener in selected {
            isolated("listener", || deliver(&listener));
        }
    }
}
