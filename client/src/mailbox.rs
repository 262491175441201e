use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

use parking_lot::{Condvar, Mutex};

use jsdt_shared::{Data, JsdtError, Priority};

#[derive(Default)]
struct Queues {
    levels: [VecDeque<Data>; Priority::COUNT],
    closed: bool,
}

impl Queues {
    fn pop(&mut self) -> Option<Data> {
        self.levels.iter_mut().find_map(|level| level.pop_front())
    }
}

/// Channel Data waiting for a Client that has no consumer registered.
/// Higher priorities are received first; within a priority, in arrival
/// order.
#[derive(Default)]
pub(crate) struct Mailbox {
    queues: Mutex<Queues>,
    arrived: Condvar,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, data: Data) {
        let mut queues = self.queues.lock();
        if queues.closed {
            return;
        }
        queues.levels[data.priority().index()].push_back(data);
        self.arrived.notify_all();
    }

    pub fn try_pop(&self) -> Option<Data> {
        self.queues.lock().pop()
    }

    pub fn is_empty(&self) -> bool {
        self.queues
            .lock()
            .levels
            .iter()
            .all(|level| level.is_empty())
    }

    /// Waits for Data. `None` as timeout waits until Data arrives or the
    /// mailbox is closed. Returns `Ok(None)` if the timeout passed first.
    pub fn wait(&self, timeout: Option<Duration>) -> Result<Option<Data>, JsdtError> {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        let mut queues = self.queues.lock();
        loop {
            if let Some(data) = queues.pop() {
                return Ok(Some(data));
            }
            if queues.closed {
                return Err(JsdtError::connection(
                    "channel closed while waiting for data",
                ));
            }
            match deadline {
                Some(deadline) => {
                    if self.arrived.wait_until(&mut queues, deadline).timed_out() {
                        return Ok(queues.pop());
                    }
                }
                None => self.arrived.wait(&mut queues),
            }
        }
    }

    /// Wakes every waiter; Data already queued can still be taken
    pub fn close(&self) {
        self.queues.lock().closed = true;
        self.arrived.notify_all();
    }
}
