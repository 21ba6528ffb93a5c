// crates/secure-broadcast-core/src/interfaces/mod.rs
// ============================================================================
// Module: Secure Broadcast Interfaces
// Description: Backend-agnostic transport and key-source contracts.
// Purpose: Define the seams through which the engine reaches external systems.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! The engine depends on two collaborators it does not implement: a
//! [`Transport`] that moves opaque frames between topic-addressed channels, and
//! an optional [`KeySource`] that supplies key material on registration.
//! Implementations must be thread-safe; the engine calls them from whichever
//! caller thread invoked it and adds no ordering of its own.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::keys::TopicKey;

// ============================================================================
// SECTION: Transport
// ============================================================================

/// Transport errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Transport was already closed.
    #[error("transport closed")]
    Closed,
    /// Topic queue is full.
    #[error("transport backpressure on topic {topic}")]
    Backpressure {
        /// Topic whose queue is full.
        topic: String,
    },
    /// Backend reported an error.
    #[error("transport backend error: {0}")]
    Backend(String),
}

/// Topic-addressed byte channel.
///
/// # Invariants
/// - No ordering or delivery guarantee is assumed by callers.
pub trait Transport: Send + Sync {
    /// Delivers one opaque frame to a topic.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the frame cannot be accepted.
    fn send(&self, topic: &str, frame: Vec<u8>) -> Result<(), TransportError>;

    /// Fetches the next undelivered frame for a topic without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the backend cannot be read.
    fn poll(&self, topic: &str) -> Result<Option<Vec<u8>>, TransportError>;

    /// Releases backend resources.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when shutdown fails.
    fn close(&self) -> Result<(), TransportError>;
}

// ============================================================================
// SECTION: Key Source
// ============================================================================

/// Key source errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeySourceError {
    /// Key content exceeded the size ceiling before reaching the key store.
    #[error("key {source_name} exceeds size limit: {actual_bytes} bytes (max {max_bytes})")]
    TooLarge {
        /// Name of the offending key source entry.
        source_name: String,
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Bytes observed before reading stopped.
        actual_bytes: usize,
    },
    /// Topic name cannot be mapped onto the key source.
    #[error("invalid key name: {0}")]
    InvalidName(String),
    /// Key source could not be read.
    #[error("key source io error: {0}")]
    Io(String),
}

/// Supplier of key material for topics registered without explicit keys.
pub trait KeySource: Send + Sync {
    /// Loads every key available for a topic.
    ///
    /// An empty result means no key is available; it is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`KeySourceError`] when key content is oversized or unreadable.
    fn load(&self, topic: &str) -> Result<Vec<TopicKey>, KeySourceError>;
}
