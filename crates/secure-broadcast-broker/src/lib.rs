// crates/secure-broadcast-broker/src/lib.rs
// ============================================================================
// Module: Secure Broadcast Broker Library
// Description: Transports, transport registry, key files, and engine factory.
// Purpose: Assemble configured broadcast engines from pluggable backends.
// Dependencies: secure-broadcast-config, secure-broadcast-core, tokio
// ============================================================================

//! ## Overview
//! The broker crate provides the concrete pieces the core engine is
//! deliberately unaware of: reference [`Transport`] backends, the
//! [`TransportRegistry`] that resolves them by name, key file loading, and the
//! [`BroadcasterFactory`] that wires everything from a configuration map.
//! Invariants:
//! - Unknown transport identifiers fail construction with
//!   `BackendInstantiation`.
//! - Key files larger than `MAX_KEY_BYTES` are rejected before registration.
//!
//! [`Transport`]: secure_broadcast_core::Transport

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod factory;
pub mod key_file;
pub mod registry;
pub mod transport;


// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use factory::BroadcasterFactory;
pub use key_file::KeyDirectory;
pub use key_file::KeyFileKind;
pub use key_file::KeyFileLoader;
pub use key_file::MAX_KEY_NAME_LENGTH;
pub use registry::BuiltinTransports;
pub use registry::CHANNEL_TRANSPORT;
pub use registry::MEMORY_TRANSPORT;
pub use registry::RegistryError;
pub use registry::TransportConstructor;
pub use registry::TransportRegistry;
pub use registry::TransportResult;
pub use transport::ChannelTransport;
pub use transport::InMemoryTransport;
