// crates/secure-broadcast-core/src/runtime/mod.rs
// ============================================================================
// Module: Secure Broadcast Runtime
// Description: Key store, envelope codec, audit sinks, and the broadcast engine.
// Purpose: Implement the stateful and security-critical parts of the core.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Runtime components are owned by a [`BroadcastEngine`] instance. Nothing here
//! is process-global: every engine has its own key store and transport.

pub mod audit;
pub mod codec;
pub mod engine;
pub mod error;
pub mod key_store;

pub use audit::AuditOutcome;
pub use audit::BroadcastAuditEvent;
pub use audit::BroadcastAuditEventParams;
pub use audit::BroadcastAuditSink;
pub use audit::FileAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use codec::CipherScheme;
pub use codec::CodecError;
pub use codec::SecureEnvelopeCodec;
pub use engine::BroadcastEngine;
pub use engine::BroadcastEngineBuilder;
pub use error::BroadcastError;
pub use key_store::KeyPut;
pub use key_store::KeyStore;
pub use key_store::KeyStoreError;
