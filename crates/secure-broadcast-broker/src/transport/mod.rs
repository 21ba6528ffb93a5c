// crates/secure-broadcast-broker/src/transport/mod.rs
// ============================================================================
// Module: Transport Backends
// Description: Reference transport implementations for the broadcast engine.
// Purpose: Provide in-process backends selectable by configuration.
// Dependencies: secure-broadcast-core, tokio
// ============================================================================

//! ## Overview
//! Transports move opaque envelope frames between engines. Two in-process
//! backends ship with the broker:
//! - [`InMemoryTransport`] keeps the last frame written per topic.
//! - [`ChannelTransport`] queues frames per topic with bounded capacity.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod channel;
pub mod memory;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use channel::ChannelTransport;
pub use memory::InMemoryTransport;
