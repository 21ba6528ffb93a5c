// crates/secure-broadcast-core/src/core/mod.rs
// ============================================================================
// Module: Secure Broadcast Core Types
// Description: Identifiers, key material, modes, and the envelope wire frame.
// Purpose: Group the plain data types shared by the runtime and interfaces.
// Dependencies: crate::core::{envelope, identifiers, keys, mode}
// ============================================================================

//! ## Overview
//! Core types carry no behavior beyond validation and encoding. Everything that
//! touches locks, transports, or cryptography lives in [`crate::runtime`].

pub mod envelope;
pub mod identifiers;
pub mod keys;
pub mod mode;

pub use envelope::ENVELOPE_MAGIC;
pub use envelope::ENVELOPE_VERSION;
pub use envelope::EnvelopeError;
pub use envelope::MAX_PAYLOAD_BYTES;
pub use envelope::SecureEnvelope;
pub use envelope::SecureMessage;
pub use identifiers::GroupId;
pub use identifiers::TopicName;
pub use keys::KeyMaterial;
pub use keys::KeyRole;
pub use keys::MAX_KEY_BYTES;
pub use keys::MIN_SYMMETRIC_KEY_BYTES;
pub use keys::TopicKey;
pub use keys::TopicState;
pub use keys::X25519_KEY_BYTES;
pub use mode::BroadcastMode;
