// crates/secure-broadcast-broker/tests/factory/key_file_tests.rs
// ============================================================================
// Module: Key File Tests
// Description: Key file classification, size limits, and directory loading.
// Purpose: Ensure oversized or unknown key files never reach the key store.
// Dependencies: secure-broadcast-broker, tempfile, hex
// ============================================================================

//! ## Overview
//! Exercises [`secure_broadcast_broker::KeyFileLoader`] and
//! [`secure_broadcast_broker::KeyDirectory`].

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

use std::fs;
use std::io::Cursor;

use secure_broadcast_broker::BroadcasterFactory;
use secure_broadcast_broker::KeyDirectory;
use secure_broadcast_broker::KeyFileLoader;
use secure_broadcast_config::AUTHORIZATIONS_KEY;
use secure_broadcast_config::KEY_DIRECTORY_KEY;
use secure_broadcast_core::BroadcastError;
use secure_broadcast_core::KeyRole;
use secure_broadcast_core::KeySource;
use secure_broadcast_core::KeySourceError;
use secure_broadcast_core::MAX_KEY_BYTES;
use secure_broadcast_core::TopicState;
use tempfile::TempDir;

use crate::common::keypair;
use crate::common::memory_config;
use crate::common::memory_factory;

// ============================================================================
// SECTION: Loader
// ============================================================================

/// Tests that public and private extensions load with matching roles.
#[test]
fn loader_reads_pub_and_priv_ignoring_case() {
    let public = KeyFileLoader::read_key_data("alerts.PUB", Cursor::new(b"abc".to_vec())).unwrap().unwrap();
    assert_eq!(public.role(), KeyRole::Public);
    assert_eq!(public.material().as_bytes(), b"abc");
    let private = KeyFileLoader::read_key_data("alerts.priv", Cursor::new(b"xyz".to_vec())).unwrap().unwrap();
    assert_eq!(private.role(), KeyRole::Private);
}

/// Tests that unknown kinds and empty files are "no key".
#[test]
fn loader_returns_none_for_unknown_kinds_and_empty_content() {
    for name in ["alerts.pem", "alerts", "alerts.pub.bak"] {
        assert!(KeyFileLoader::read_key_data(name, Cursor::new(b"abc".to_vec())).unwrap().is_none());
    }
    assert!(KeyFileLoader::read_key_data("alerts.pub", Cursor::new(Vec::new())).unwrap().is_none());
}

/// Tests the size ceiling is inclusive.
#[test]
fn loader_enforces_size_ceiling() {
    let at_max = vec![b'k'; MAX_KEY_BYTES];
    assert!(KeyFileLoader::read_key_data("t.pub", Cursor::new(at_max)).unwrap().is_some());
    let over = vec![b'k'; MAX_KEY_BYTES * 2];
    match KeyFileLoader::read_key_data("t.pub", Cursor::new(over)) {
        Err(KeySourceError::TooLarge {
            source_name,
            max_bytes,
            actual_bytes,
        }) => {
            assert_eq!(source_name, "t.pub");
            assert_eq!(max_bytes, MAX_KEY_BYTES);
            assert_eq!(actual_bytes, MAX_KEY_BYTES + 1);
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

// ============================================================================
// SECTION: Directory
// ============================================================================

/// Tests loading both halves from a directory.
#[test]
fn directory_loads_available_keys() {
    let dir = TempDir::new().unwrap();
    let (private, public) = keypair();
    fs::write(dir.path().join("t.pub"), public).unwrap();
    fs::write(dir.path().join("t.priv"), hex::encode(private)).unwrap();
    fs::write(dir.path().join("t.pem"), b"ignored").unwrap();
    let keys = KeyDirectory::new(dir.path()).load("t").unwrap();
    let roles: Vec<KeyRole> = keys.iter().map(|key| key.role()).collect();
    assert_eq!(roles, vec![KeyRole::Public, KeyRole::Private]);
    assert!(KeyDirectory::new(dir.path()).load("absent").unwrap().is_empty());
}

/// Tests that traversal attempts are rejected.
#[test]
fn directory_rejects_traversal() {
    let dir = TempDir::new().unwrap();
    let err = KeyDirectory::new(dir.path()).load("../t").unwrap_err();
    assert!(matches!(err, KeySourceError::InvalidName(_)));
}

/// Tests that engines register topics from the configured key directory.
#[test]
fn engine_registers_topic_from_key_directory() {
    let dir = TempDir::new().unwrap();
    let (private, public) = keypair();
    fs::write(dir.path().join("t.pub"), public).unwrap();
    fs::write(dir.path().join("t.priv"), hex::encode(private)).unwrap();

    let (factory, _storage) = memory_factory();
    let mut map = memory_config(true);
    map.insert(KEY_DIRECTORY_KEY.to_string(), dir.path().to_str().unwrap().to_string());
    map.insert(AUTHORIZATIONS_KEY.to_string(), "OPS".to_string());
    let engine = factory.create(&map, "g").unwrap();
    let state = engine.register_topic("t").unwrap();
    assert_eq!(
        state,
        TopicState::KeyLoaded {
            public: true,
            private: true,
            symmetric: false,
        }
    );
    engine.subscribe_to_topic("t").unwrap();
    engine.broadcast("t", "OPS", b"from-files").unwrap();
    assert_eq!(engine.receive("t").unwrap().unwrap().content, b"from-files");
}

/// Tests that an oversized key file fails registration as key-too-large.
#[test]
fn engine_rejects_oversized_key_file() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("t.pub"), vec![b'k'; MAX_KEY_BYTES + 10]).unwrap();
    let mut map = memory_config(true);
    map.insert(KEY_DIRECTORY_KEY.to_string(), dir.path().to_str().unwrap().to_string());
    let engine = BroadcasterFactory::new().create(&map, "g").unwrap();
    let err = engine.register_topic("t").unwrap_err();
    assert!(matches!(err, BroadcastError::KeyTooLarge { .. }), "{err}");
    assert_eq!(engine.topic_state("t").unwrap(), TopicState::Unregistered);
}
