use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use hydrogen_db_core::{DatabaseQuery, HydrogenError, HydrogenResult};

/// A bounded FIFO of `DatabaseQuery` records. `crossbeam_channel` gives the
/// depth inspection (`len`) and `recv_timeout` the worker loop's
/// dequeue-with-timeout suspension point needs, which `std::sync::mpsc`
/// doesn't expose.
pub struct QueryQueue {
    sender: Sender<DatabaseQuery>,
    receiver: Receiver<DatabaseQuery>,
    capacity: usize,
}

impl QueryQueue {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = bounded(capacity);
        QueryQueue {
            sender,
            receiver,
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current number of queued-but-not-yet-dequeued queries.
    pub fn depth(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Fails with `ResourceExhausted` rather than blocking when the queue is
    /// full.
    pub fn submit(&self, query: DatabaseQuery) -> HydrogenResult<()> {
        self.sender.try_send(query).map_err(|e| match e {
            TrySendError::Full(_) => {
                HydrogenError::resource_exhausted("query queue is at capacity")
            }
            TrySendError::Disconnected(_) => HydrogenError::shutdown(),
        })
    }

    /// `None` on timeout, the classic "no work, go heartbeat" branch of the
    /// worker loop.
    pub fn dequeue(&self, timeout: Duration) -> Option<DatabaseQuery> {
        match self.receiver.recv_timeout(timeout) {
            Ok(query) => Some(query),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// A cloneable submission handle, so callers elsewhere in the process
    /// can enqueue without holding a reference to the owning `DatabaseQueue`.
    pub fn sender(&self) -> Sender<DatabaseQuery> {
        self.sender.clone()
    }
}
