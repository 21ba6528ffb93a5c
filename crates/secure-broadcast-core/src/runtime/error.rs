// crates/secure-broadcast-core/src/runtime/error.rs
// ============================================================================
// Module: Broadcast Errors
// Description: Error taxonomy surfaced by the broadcast engine and factory.
// Purpose: Keep construction, key, input, and crypto failures distinguishable.
// Dependencies: crate::{core, interfaces, runtime}, thiserror, visibility-logic
// ============================================================================

//! ## Overview
//! Every failing engine call returns a [`BroadcastError`]. Authorization
//! mismatches are not errors and never appear here.
//! Invariants:
//! - [`BroadcastError::kind`] labels are stable and safe to log.
//! - Error messages never include key material or payload bytes.

use thiserror::Error;
use visibility_logic::VisibilityError;

use crate::core::envelope::EnvelopeError;
use crate::interfaces::KeySourceError;
use crate::interfaces::TransportError;
use crate::runtime::codec::CodecError;
use crate::runtime::key_store::KeyStoreError;

/// Broadcast engine errors.
#[derive(Debug, Error)]
pub enum BroadcastError {
    /// Required configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Named transport backend could not be resolved or instantiated.
    #[error("cannot instantiate transport backend {backend}: {reason}")]
    BackendInstantiation {
        /// Backend identifier from configuration.
        backend: String,
        /// Failure description.
        reason: String,
    },
    /// Key material exceeded the size ceiling.
    #[error("key for topic {topic} exceeds size limit: {actual_bytes} bytes (max {max_bytes})")]
    KeyTooLarge {
        /// Topic the key was offered for.
        topic: String,
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual key size.
        actual_bytes: usize,
    },
    /// Key material is not structurally valid.
    #[error("invalid key format for topic {topic}: {reason}")]
    InvalidKeyFormat {
        /// Topic the key was offered for.
        topic: String,
        /// Validation failure description.
        reason: String,
    },
    /// No usable key exists for the operation.
    #[error("missing key for topic {topic}: {reason}")]
    MissingKey {
        /// Topic lacking a key.
        topic: String,
        /// Which key was needed.
        reason: &'static str,
    },
    /// Visibility expression is syntactically invalid.
    #[error("malformed visibility expression: {0}")]
    MalformedVisibility(#[from] VisibilityError),
    /// Ciphertext could not be decrypted with the topic key.
    #[error("decryption failed for topic {topic}: {source}")]
    Decryption {
        /// Topic the message was received from.
        topic: String,
        /// Codec failure.
        source: CodecError,
    },
    /// Payload could not be encrypted with the topic key.
    #[error("encryption failed for topic {topic}: {source}")]
    Encryption {
        /// Topic the message was broadcast to.
        topic: String,
        /// Codec failure.
        source: CodecError,
    },
    /// Transport delivered a frame that does not decode.
    #[error("malformed envelope on topic {topic}: {reason}")]
    MalformedEnvelope {
        /// Topic the frame was polled from.
        topic: String,
        /// Decode failure description.
        reason: String,
    },
    /// Payload exceeded the frame size ceiling.
    #[error("payload exceeds size limit: {actual_bytes} bytes (max {max_bytes})")]
    PayloadTooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual payload size.
        actual_bytes: usize,
    },
    /// Transport backend failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    /// Key source failed.
    #[error("key source error: {0}")]
    KeySource(KeySourceError),
    /// Internal engine state is unusable.
    #[error("internal error: {0}")]
    Internal(String),
    /// Engine was closed.
    #[error("broadcast engine is closed")]
    Closed,
}

impl BroadcastError {
    /// Returns a stable label for the error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::BackendInstantiation {
                ..
            } => "backend_instantiation",
            Self::KeyTooLarge {
                ..
            } => "key_too_large",
            Self::InvalidKeyFormat {
                ..
            } => "invalid_key_format",
            Self::MissingKey {
                ..
            } => "missing_key",
            Self::MalformedVisibility(_) => "malformed_visibility",
            Self::Decryption {
                ..
            } => "decryption",
            Self::Encryption {
                ..
            } => "encryption",
            Self::MalformedEnvelope {
                ..
            } => "malformed_envelope",
            Self::PayloadTooLarge {
                ..
            } => "payload_too_large",
            Self::Transport(_) => "transport",
            Self::KeySource(_) => "key_source",
            Self::Internal(_) => "internal",
            Self::Closed => "closed",
        }
    }

    /// Returns true when the caller's input, not the deployment, is at fault.
    #[must_use]
    pub const fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedVisibility(_)
                | Self::PayloadTooLarge {
                    ..
                }
        )
    }

    /// Maps an envelope failure observed on a topic.
    pub(crate) fn from_envelope(topic: &str, err: EnvelopeError) -> Self {
        match err {
            EnvelopeError::PayloadTooLarge {
                max_bytes,
                actual_bytes,
            } => Self::PayloadTooLarge {
                max_bytes,
                actual_bytes,
            },
            EnvelopeError::Malformed(reason) => Self::MalformedEnvelope {
                topic: topic.to_string(),
                reason,
            },
        }
    }

    /// Maps a key source failure observed on a topic.
    pub(crate) fn from_key_source(topic: &str, err: KeySourceError) -> Self {
        match err {
            KeySourceError::TooLarge {
                max_bytes,
                actual_bytes,
                ..
            } => Self::KeyTooLarge {
                topic: topic.to_string(),
                max_bytes,
                actual_bytes,
            },
            other => Self::KeySource(other),
        }
    }
}

impl From<KeyStoreError> for BroadcastError {
    fn from(err: KeyStoreError) -> Self {
        match err {
            KeyStoreError::TooLarge {
                topic,
                max_bytes,
                actual_bytes,
            } => Self::KeyTooLarge {
                topic,
                max_bytes,
                actual_bytes,
            },
            KeyStoreError::InvalidFormat {
                topic,
                role,
                reason,
            } => Self::InvalidKeyFormat {
                topic,
                reason: format!("{role} key: {reason}"),
            },
            KeyStoreError::Store(message) => Self::Internal(message),
        }
    }
}
