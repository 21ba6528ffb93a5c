// crates/secure-broadcast-broker/src/transport/channel.rs
// ============================================================================
// Module: Channel Transport
// Description: Bounded per-topic queues built on Tokio mpsc channels.
// Purpose: Deliver every frame in FIFO order with explicit backpressure.
// Dependencies: secure-broadcast-core, tokio
// ============================================================================

//! ## Overview
//! [`ChannelTransport`] lazily creates one bounded `tokio::sync::mpsc` queue
//! per topic. Sends and polls never block: a full queue reports
//! [`TransportError::Backpressure`] and an empty queue polls as `None`.
//! Invariants:
//! - Frames on one topic are delivered in send order.
//! - Close drops every queued frame.
//! - A topic's queue is dropped once a poll drains it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use secure_broadcast_core::Transport;
use secure_broadcast_core::TransportError;
use tokio::sync::mpsc;
use tokio::sync::mpsc::Receiver;
use tokio::sync::mpsc::Sender;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::error::TrySendError;

// ============================================================================
// SECTION: Channel Transport
// ============================================================================

/// One topic's bounded queue.
#[derive(Debug)]
struct TopicQueue {
    /// Producer half.
    sender: Sender<Vec<u8>>,
    /// Consumer half.
    receiver: Receiver<Vec<u8>>,
}

/// Bounded FIFO transport with one queue per topic.
#[derive(Debug)]
pub struct ChannelTransport {
    /// Queue depth applied to every topic.
    capacity: NonZeroUsize,
    /// Queues keyed by topic.
    queues: Mutex<BTreeMap<String, TopicQueue>>,
    /// Whether the transport was closed.
    closed: AtomicBool,
}

impl ChannelTransport {
    /// Creates a channel transport with the given per-topic capacity.
    #[must_use]
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            capacity,
            queues: Mutex::new(BTreeMap::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Returns the per-topic capacity.
    #[must_use]
    pub const fn capacity(&self) -> NonZeroUsize {
        self.capacity
    }

    /// Returns the number of topics holding a queue.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Backend`] when the queue table is poisoned.
    pub fn queued_topics(&self) -> Result<usize, TransportError> {
        Ok(self.lock()?.len())
    }

    /// Fails when the transport was closed.
    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) { Err(TransportError::Closed) } else { Ok(()) }
    }

    /// Locks the queue table.
    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, TopicQueue>>, TransportError> {
        self.queues
            .lock()
            .map_err(|_| TransportError::Backend("channel queue table poisoned".to_string()))
    }
}

impl Transport for ChannelTransport {
    fn send(&self, topic: &str, frame: Vec<u8>) -> Result<(), TransportError> {
        self.ensure_open()?;
        let mut queues = self.lock()?;
        let queue = queues.entry(topic.to_string()).or_insert_with(|| {
            let (sender, receiver) = mpsc::channel(self.capacity.get());
            TopicQueue {
                sender,
                receiver,
            }
        });
        queue.sender.try_send(frame).map_err(|err| match err {
            TrySendError::Full(_) => TransportError::Backpressure {
                topic: topic.to_string(),
            },
            TrySendError::Closed(_) => TransportError::Closed,
        })
    }

    fn poll(&self, topic: &str) -> Result<Option<Vec<u8>>, TransportError> {
        self.ensure_open()?;
        let mut queues = self.lock()?;
        let Some(queue) = queues.get_mut(topic) else {
            return Ok(None);
        };
        let polled = match queue.receiver.try_recv() {
            Ok(frame) => Some(frame),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => return Err(TransportError::Closed),
        };
        if queue.receiver.is_empty() {
            queues.remove(topic);
        }
        Ok(polled)
    }

    fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let mut queues = self.lock()?;
        for queue in queues.values_mut() {
            queue.receiver.close();
        }
        queues.clear();
        Ok(())
    }
}
