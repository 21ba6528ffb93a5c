// crates/secure-broadcast-broker/src/transport/memory.rs
// ============================================================================
// Module: In-Memory Transport
// Description: Last-frame-per-topic transport backed by shared process memory.
// Purpose: Reference backend for tests and single-process deployments.
// Dependencies: secure-broadcast-core
// ============================================================================

//! ## Overview
//! [`InMemoryTransport`] maps each topic to the most recently written frame.
//! Writing replaces any unread frame and polling consumes it. Handles created
//! with [`InMemoryTransport::handle`] share storage but close independently.
//! Invariants:
//! - At most one frame is held per topic.
//! - A closed handle rejects every call except a repeated close.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use secure_broadcast_core::Transport;
use secure_broadcast_core::TransportError;

// ============================================================================
// SECTION: In-Memory Transport
// ============================================================================

/// Topic to last-frame storage shared between handles.
type FrameTable = BTreeMap<String, Vec<u8>>;

/// Last-frame-per-topic in-memory transport.
#[derive(Debug, Default)]
pub struct InMemoryTransport {
    /// Frames keyed by topic, shared across handles.
    frames: Arc<Mutex<FrameTable>>,
    /// Whether this handle was closed.
    closed: AtomicBool,
}

impl InMemoryTransport {
    /// Creates a transport with empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new open handle sharing this transport's storage.
    #[must_use]
    pub fn handle(&self) -> Self {
        Self {
            frames: Arc::clone(&self.frames),
            closed: AtomicBool::new(false),
        }
    }

    /// Returns the raw frame stored for a topic without consuming it.
    ///
    /// Intended for asserting the wire form of broadcasts.
    #[must_use]
    pub fn message_from_topic(&self, topic: &str) -> Option<Vec<u8>> {
        self.lock().ok().and_then(|frames| frames.get(topic).cloned())
    }

    /// Returns true when this handle was closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Fails when this handle was closed.
    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.is_closed() { Err(TransportError::Closed) } else { Ok(()) }
    }

    /// Locks the shared frame table.
    fn lock(&self) -> Result<MutexGuard<'_, FrameTable>, TransportError> {
        self.frames
            .lock()
            .map_err(|_| TransportError::Backend("in-memory frame table poisoned".to_string()))
    }
}

impl Transport for InMemoryTransport {
    fn send(&self, topic: &str, frame: Vec<u8>) -> Result<(), TransportError> {
        self.ensure_open()?;
        self.lock()?.insert(topic.to_string(), frame);
        Ok(())
    }

    fn poll(&self, topic: &str) -> Result<Option<Vec<u8>>, TransportError> {
        self.ensure_open()?;
        Ok(self.lock()?.remove(topic))
    }

    fn close(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
