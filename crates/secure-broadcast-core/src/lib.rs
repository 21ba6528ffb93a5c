// crates/secure-broadcast-core/src/lib.rs
// ============================================================================
// Module: Secure Broadcast Core Library
// Description: Public API surface for the secure broadcast engine.
// Purpose: Expose key handling, envelope codecs, interfaces, and the engine.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Secure broadcast core publishes and consumes byte payloads on named topics
//! while enforcing per-topic encryption and visibility gating. It is
//! transport-agnostic: concrete backends plug in through [`Transport`], and key
//! files arrive through [`KeySource`].
//!
//! Security posture: key material, plaintext payloads, and decrypted content
//! never reach audit records; missing keys fail loudly while authorization
//! mismatches are silently filtered.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;


// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::KeySource;
pub use interfaces::KeySourceError;
pub use interfaces::Transport;
pub use interfaces::TransportError;
pub use runtime::AuditOutcome;
pub use runtime::BroadcastAuditEvent;
pub use runtime::BroadcastAuditEventParams;
pub use runtime::BroadcastAuditSink;
pub use runtime::BroadcastEngine;
pub use runtime::BroadcastEngineBuilder;
pub use runtime::BroadcastError;
pub use runtime::CodecError;
pub use runtime::FileAuditSink;
pub use runtime::KeyPut;
pub use runtime::KeyStore;
pub use runtime::KeyStoreError;
pub use runtime::NoopAuditSink;
pub use runtime::SecureEnvelopeCodec;
pub use runtime::StderrAuditSink;
pub use visibility_logic::Authorizations;
pub use visibility_logic::Authorizer;
pub use visibility_logic::ExpressionAuthorizer;
pub use visibility_logic::VisibilityExpression;
