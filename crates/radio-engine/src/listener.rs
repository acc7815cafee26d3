//! Listener fan-out.
//!
//! Each listener owns a bounded queue of chunks. The station keeps the sending
//! halves in a [`ListenerRegistry`] guarded by its lock and never blocks on them:
//! a full queue loses the chunk for that listener only.
//!
//! Queues are `tokio` channels so HTTP bodies can await them; the blocking
//! receive methods on [`Listener`] are for plain threads.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tokio::sync::mpsc::{Receiver, Sender};

use crate::station::Station;

/// Identifier of a listener within one station.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of fanning one chunk out to the registry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct BroadcastOutcome {
    pub(crate) delivered: usize,
    pub(crate) dropped: usize,
    pub(crate) pruned: usize,
}

/// Sending halves of every attached listener.
#[derive(Debug, Default)]
pub(crate) struct ListenerRegistry {
    senders: HashMap<ListenerId, Sender<Bytes>>,
}

impl ListenerRegistry {
    pub(crate) fn insert(&mut self, id: ListenerId, tx: Sender<Bytes>) {
        self.senders.insert(id, tx);
    }

    /// Remove a listener; dropping its sender closes the listener's queue.
    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        self.senders.remove(&id).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.senders.len()
    }

    /// Offer `chunk` to every listener without blocking.
    ///
    /// Listeners whose receiver is gone are pruned.
    pub(crate) fn broadcast(&mut self, chunk: &Bytes) -> BroadcastOutcome {
        let mut outcome = BroadcastOutcome::default();
        let mut gone = Vec::new();
        for (id, tx) in &self.senders {
            match tx.try_send(chunk.clone()) {
                Ok(()) => outcome.delivered += 1,
                Err(TrySendError::Full(_)) => outcome.dropped += 1,
                Err(TrySendError::Closed(_)) => gone.push(*id),
            }
        }
        for id in gone {
            self.senders.remove(&id);
            outcome.pruned += 1;
        }
        outcome
    }

    /// Drop every sender, ending each listener's stream.
    pub(crate) fn close_all(&mut self) -> usize {
        let closed = self.senders.len();
        self.senders.clear();
        closed
    }
}

struct DetachInner {
    station: Weak<Station>,
    id: ListenerId,
    done: AtomicBool,
}

impl DetachInner {
    fn run(&self) {
        if self.done.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(station) = self.station.upgrade() {
            station.remove_listener(self.id);
        }
    }
}

impl Drop for DetachInner {
    fn drop(&mut self) {
        self.run();
    }
}

/// Handle that detaches a listener from its station.
///
/// Detaching is idempotent; the last clone detaches on drop.
#[derive(Clone)]
pub struct Detach {
    inner: Arc<DetachInner>,
}

impl Detach {
    pub(crate) fn new(station: Weak<Station>, id: ListenerId) -> Self {
        Self {
            inner: Arc::new(DetachInner {
                station,
                id,
                done: AtomicBool::new(false),
            }),
        }
    }

    /// Remove the listener from its station and close its queue.
    pub fn detach(&self) {
        self.inner.run();
    }

    pub fn is_detached(&self) -> bool {
        self.inner.done.load(Ordering::Acquire)
    }
}

impl fmt::Debug for Detach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Detach")
            .field("id", &self.inner.id)
            .field("detached", &self.is_detached())
            .finish()
    }
}

const RECV_POLL: Duration = Duration::from_millis(5);

/// A listening session attached to a station.
///
/// Chunks arrive in broadcast order; chunks broadcast while the queue is full
/// are lost. Dropping the listener detaches it.
#[derive(Debug)]
pub struct Listener {
    id: ListenerId,
    receiver: Receiver<Bytes>,
    detach: Detach,
}

impl Listener {
    pub(crate) fn new(id: ListenerId, receiver: Receiver<Bytes>, detach: Detach) -> Self {
        Self {
            id,
            receiver,
            detach,
        }
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Await the next chunk; `None` once detached or stopped and drained.
    pub async fn recv_async(&mut self) -> Option<Bytes> {
        self.receiver.recv().await
    }

    /// Block the current thread for the next chunk.
    ///
    /// Panics when called from inside an async runtime; use [`Self::recv_async`] there.
    pub fn recv(&mut self) -> Option<Bytes> {
        self.receiver.blocking_recv()
    }

    /// Wait up to `timeout` for a chunk. `None` on timeout or once the queue is closed.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<Bytes> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.receiver.try_recv() {
                Ok(chunk) => return Some(chunk),
                Err(TryRecvError::Disconnected) => return None,
                Err(TryRecvError::Empty) => {}
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            std::thread::sleep((deadline - now).min(RECV_POLL));
        }
    }

    pub fn try_recv(&mut self) -> Result<Bytes, TryRecvError> {
        self.receiver.try_recv()
    }

    pub fn detach(&self) {
        self.detach.detach();
    }

    /// Split into the receiving queue and its detach handle.
    pub fn into_parts(self) -> (Receiver<Bytes>, Detach) {
        (self.receiver, self.detach)
    }
}
