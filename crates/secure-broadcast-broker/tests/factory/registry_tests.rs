// crates/secure-broadcast-broker/tests/factory/registry_tests.rs
// ============================================================================
// Module: TransportRegistry Tests
// Description: Builtin registration, duplicates, and constructor failures.
// Purpose: Pin the identifier-to-backend resolution contract.
// Dependencies: secure-broadcast-broker, secure-broadcast-config
// ============================================================================

//! ## Overview
//! Exercises [`secure_broadcast_broker::TransportRegistry`].

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use secure_broadcast_broker::BroadcasterFactory;
use secure_broadcast_broker::BuiltinTransports;
use secure_broadcast_broker::InMemoryTransport;
use secure_broadcast_broker::RegistryError;
use secure_broadcast_broker::TransportRegistry;
use secure_broadcast_broker::TransportResult;
use secure_broadcast_config::BroadcastSettings;
use secure_broadcast_config::TRANSPORT_KEY;
use secure_broadcast_core::BroadcastError;
use secure_broadcast_core::TransportError;

use crate::common::config;

/// Resolves settings naming the given transport.
fn settings(transport: &str) -> BroadcastSettings {
    BroadcastSettings::from_map(&config(&[(TRANSPORT_KEY, transport)])).unwrap()
}

// ============================================================================
// SECTION: Builtins
// ============================================================================

/// Tests that builtins register the memory and channel transports.
#[test]
fn builtin_registry_names() {
    let registry = TransportRegistry::with_builtin_transports(BuiltinTransports::default());
    assert_eq!(registry.names(), vec!["channel", "memory"]);
    assert!(registry.contains("memory"));
    assert!(!TransportRegistry::new().contains("memory"));
}

/// Tests that builtin memory transports hand out shared handles.
#[test]
fn builtin_memory_transports_share_storage() {
    let registry = TransportRegistry::with_builtin_transports(BuiltinTransports::default());
    let first = registry.instantiate(&settings("memory")).unwrap();
    let second = registry.instantiate(&settings("memory")).unwrap();
    first.send("t", b"frame".to_vec()).unwrap();
    assert_eq!(second.poll("t").unwrap(), Some(b"frame".to_vec()));
}

// ============================================================================
// SECTION: Registration
// ============================================================================

/// Tests that duplicate identifiers are rejected.
#[test]
fn register_rejects_duplicates() {
    let mut registry = TransportRegistry::with_builtin_transports(BuiltinTransports::default());
    let err = registry
        .register("memory", |_: &BroadcastSettings| -> TransportResult {
            Ok(Box::new(InMemoryTransport::new()))
        })
        .unwrap_err();
    assert!(matches!(err, RegistryError::AlreadyRegistered(ref name) if name == "memory"));
    assert_eq!(BroadcastError::from(err).kind(), "configuration");
}

/// Tests that custom constructors resolve through the factory.
#[test]
fn custom_transport_resolves_through_factory() {
    let mut registry = TransportRegistry::new();
    registry
        .register("bus", |_: &BroadcastSettings| -> TransportResult {
            Ok(Box::new(InMemoryTransport::new()))
        })
        .unwrap();
    let factory = BroadcasterFactory::with_registry(registry);
    let engine = factory.create(&config(&[(TRANSPORT_KEY, "bus")]), "g").unwrap();
    engine.register_topic("t").unwrap();
    engine.broadcast("t", "A", b"x").unwrap();
    assert_eq!(factory.registry().names(), vec!["bus"]);
}

// ============================================================================
// SECTION: Failures
// ============================================================================

/// Tests that a failing constructor becomes a backend instantiation error.
#[test]
fn failing_constructor_is_backend_instantiation_error() {
    let mut registry = TransportRegistry::new();
    registry
        .register("broken", |_: &BroadcastSettings| -> TransportResult {
            Err(TransportError::Backend("broker unreachable".to_string()))
        })
        .unwrap();
    let factory = BroadcasterFactory::with_registry(registry);
    let err = factory.create(&config(&[(TRANSPORT_KEY, "broken")]), "g").err().unwrap();
    match err {
        BroadcastError::BackendInstantiation {
            backend,
            reason,
        } => {
            assert_eq!(backend, "broken");
            assert!(reason.contains("broker unreachable"), "{reason}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

/// Tests that an empty registry resolves nothing.
#[test]
fn unregistered_identifier_is_backend_instantiation_error() {
    let err = TransportRegistry::new().instantiate(&settings("memory")).err().unwrap();
    assert!(matches!(err, RegistryError::NotRegistered(ref name) if name == "memory"));
    assert_eq!(BroadcastError::from(err).kind(), "backend_instantiation");
}
