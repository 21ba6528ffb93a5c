// crates/secure-broadcast-core/tests/common/mod.rs
// ============================================================================
// Module: Core Test Helpers
// Description: In-test transport, key source, audit sink, and key fixtures.
// Purpose: Exercise the engine without depending on concrete backends.
// Dependencies: secure-broadcast-core, x25519-dalek, rand
// ============================================================================

//! ## Overview
//! Shared fixtures for core integration tests.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only helpers use panic-based assertions."
)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use rand::RngCore;
use rand::rngs::OsRng;
use secure_broadcast_core::Authorizations;
use secure_broadcast_core::BroadcastAuditEvent;
use secure_broadcast_core::BroadcastAuditSink;
use secure_broadcast_core::BroadcastEngine;
use secure_broadcast_core::BroadcastMode;
use secure_broadcast_core::KeySource;
use secure_broadcast_core::KeySourceError;
use secure_broadcast_core::TopicKey;
use secure_broadcast_core::Transport;
use secure_broadcast_core::TransportError;
use x25519_dalek::PublicKey;
use x25519_dalek::StaticSecret;

// ============================================================================
// SECTION: Transport
// ============================================================================

/// Last-frame-per-topic transport whose storage is shared across clones.
#[derive(Clone, Default)]
pub struct SharedTransport {
    /// Frames keyed by topic.
    frames: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
    /// Number of close calls observed.
    closes: Arc<Mutex<usize>>,
}

impl SharedTransport {
    /// Returns the stored frame without consuming it.
    pub fn peek(&self, topic: &str) -> Option<Vec<u8>> {
        self.frames.lock().unwrap().get(topic).cloned()
    }

    /// Replaces the stored frame for a topic.
    pub fn inject(&self, topic: &str, frame: Vec<u8>) {
        self.frames.lock().unwrap().insert(topic.to_string(), frame);
    }

    /// Returns how many times close was called.
    pub fn close_count(&self) -> usize {
        *self.closes.lock().unwrap()
    }
}

impl Transport for SharedTransport {
    fn send(&self, topic: &str, frame: Vec<u8>) -> Result<(), TransportError> {
        self.frames.lock().unwrap().insert(topic.to_string(), frame);
        Ok(())
    }

    fn poll(&self, topic: &str) -> Result<Option<Vec<u8>>, TransportError> {
        Ok(self.frames.lock().unwrap().remove(topic))
    }

    fn close(&self) -> Result<(), TransportError> {
        *self.closes.lock().unwrap() += 1;
        Ok(())
    }
}

// ============================================================================
// SECTION: Key Source
// ============================================================================

/// Key source backed by a fixed map.
#[derive(Default)]
pub struct StaticKeySource {
    /// Keys returned per topic.
    keys: BTreeMap<String, Vec<TopicKey>>,
    /// Error returned for every topic when set.
    failure: Option<KeySourceError>,
}

impl StaticKeySource {
    /// Adds a key for a topic.
    pub fn with_key(mut self, topic: &str, key: TopicKey) -> Self {
        self.keys.entry(topic.to_string()).or_default().push(key);
        self
    }

    /// Makes every load fail with `err`.
    pub fn failing(err: KeySourceError) -> Self {
        Self {
            keys: BTreeMap::new(),
            failure: Some(err),
        }
    }
}

impl KeySource for StaticKeySource {
    fn load(&self, topic: &str) -> Result<Vec<TopicKey>, KeySourceError> {
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        Ok(self.keys.get(topic).cloned().unwrap_or_default())
    }
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Audit sink that keeps events in memory.
#[derive(Default)]
pub struct RecordingAuditSink {
    /// Recorded events.
    events: Mutex<Vec<BroadcastAuditEvent>>,
}

impl RecordingAuditSink {
    /// Returns recorded events.
    pub fn events(&self) -> Vec<BroadcastAuditEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl BroadcastAuditSink for RecordingAuditSink {
    fn record(&self, event: &BroadcastAuditEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

// ============================================================================
// SECTION: Keys
// ============================================================================

/// Generates an X25519 key pair as (private, public) bytes.
pub fn keypair() -> ([u8; 32], [u8; 32]) {
    let mut private = [0_u8; 32];
    OsRng.fill_bytes(&mut private);
    let public = PublicKey::from(&StaticSecret::from(private));
    (private, public.to_bytes())
}

/// Generates a random symmetric key.
pub fn symmetric_key() -> Vec<u8> {
    let mut key = vec![0_u8; 32];
    OsRng.fill_bytes(&mut key);
    key
}

// ============================================================================
// SECTION: Engines
// ============================================================================

/// Builds an engine over a shared transport with the given authorizations.
pub fn engine(
    mode: BroadcastMode,
    authorizations: &str,
) -> (BroadcastEngine, SharedTransport) {
    let transport = SharedTransport::default();
    let engine = BroadcastEngine::builder("test", Box::new(transport.clone()))
        .mode(mode)
        .authorizations(Authorizations::parse_list(authorizations))
        .build();
    (engine, transport)
}
