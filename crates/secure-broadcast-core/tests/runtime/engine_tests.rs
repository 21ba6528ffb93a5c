// crates/secure-broadcast-core/tests/runtime/engine_tests.rs
// ============================================================================
// Module: BroadcastEngine Tests
// Description: Mode switch, topic lifecycle, receive gate, and close semantics.
// Purpose: Pin the loud-missing-key versus silent-filter asymmetry.
// Dependencies: secure-broadcast-core
// ============================================================================

//! ## Overview
//! Exercises [`secure_broadcast_core::BroadcastEngine`] end to end over an
//! in-test transport.

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

use std::sync::Arc;
use std::thread;

use secure_broadcast_core::Authorizations;
use secure_broadcast_core::BroadcastEngine;
use secure_broadcast_core::BroadcastError;
use secure_broadcast_core::BroadcastMode;
use secure_broadcast_core::KeySourceError;
use secure_broadcast_core::MAX_KEY_BYTES;
use secure_broadcast_core::MAX_PAYLOAD_BYTES;
use secure_broadcast_core::SecureEnvelope;
use secure_broadcast_core::TopicKey;
use secure_broadcast_core::TopicState;
use secure_broadcast_core::Transport;
use secure_broadcast_core::VisibilityExpression;
use secure_broadcast_core::runtime::CipherScheme;

use crate::common::SharedTransport;
use crate::common::StaticKeySource;
use crate::common::engine;
use crate::common::keypair;
use crate::common::symmetric_key;

/// Returns true when `needle` occurs in `haystack`.
fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

// ============================================================================
// SECTION: Non-Production
// ============================================================================

/// Tests plaintext delivery and the verbatim wire form.
#[test]
fn non_production_sends_plaintext() {
    let (engine, transport) = engine(BroadcastMode::NonProduction, "U");
    engine.broadcast("topic", "U", b"hello").unwrap();

    let frame = transport.peek("topic").unwrap();
    assert!(contains(&frame, b"hello"));
    let envelope = SecureEnvelope::decode(&frame).unwrap();
    assert!(!envelope.is_encrypted());
    assert_eq!(envelope.payload(), b"hello");

    let message = engine.receive("topic").unwrap().unwrap();
    assert_eq!(message.content, b"hello");
    assert!(!message.was_encrypted);
    assert_eq!(message.visibility.as_str(), "U");
}

/// Tests that non-production topics register without a key.
#[test]
fn non_production_registration_needs_no_key() {
    let (engine, _) = engine(BroadcastMode::NonProduction, "");
    assert_eq!(engine.register_topic("free").unwrap(), TopicState::Unregistered);
}

/// Tests that subscribing needs a decrypting key in non-production mode too.
#[test]
fn non_production_subscribe_requires_decrypting_key() {
    let (engine, _) = engine(BroadcastMode::NonProduction, "");
    assert!(matches!(
        engine.subscribe_to_topic("never-registered"),
        Err(BroadcastError::MissingKey { .. })
    ));
    engine.register_topic("free").unwrap();
    assert!(matches!(engine.subscribe_to_topic("free"), Err(BroadcastError::MissingKey { .. })));

    let (_, public) = keypair();
    engine.register_topic_with_key("pubkey", &public, false).unwrap();
    assert!(matches!(engine.subscribe_to_topic("pubkey"), Err(BroadcastError::MissingKey { .. })));

    engine.register_topic_key("free", TopicKey::symmetric(symmetric_key())).unwrap();
    engine.subscribe_to_topic("free").unwrap();
}

/// Tests that unauthorized plaintext messages are filtered too.
#[test]
fn non_production_filters_unauthorized_messages() {
    let (engine, _) = engine(BroadcastMode::NonProduction, "U");
    engine.broadcast("topic", "TS&G", b"secret").unwrap();
    assert!(engine.receive("topic").unwrap().is_none());
}

// ============================================================================
// SECTION: Visibility Validation
// ============================================================================

/// Tests malformed visibility fails before anything reaches the transport.
#[test]
fn malformed_visibility_is_rejected_in_both_modes() {
    for mode in [BroadcastMode::NonProduction, BroadcastMode::Production] {
        let (engine, transport) = engine(mode, "");
        let err = engine.broadcast("topic", "TS&G@#$", b"payload").unwrap_err();
        assert!(matches!(err, BroadcastError::MalformedVisibility(_)));
        assert_eq!(err.kind(), "malformed_visibility");
        assert!(err.is_input_error());
        assert!(transport.peek("topic").is_none());
    }
}

// ============================================================================
// SECTION: Production
// ============================================================================

/// Tests the end-to-end encrypted scenario with a satisfied expression.
#[test]
fn production_delivers_when_visibility_is_satisfied() {
    let (engine, transport) = engine(BroadcastMode::Production, "S,USA");
    let (private, _) = keypair();
    engine.register_topic_with_key("t", &private, true).unwrap();

    engine.broadcast("t", "S&(USA|CAN)", b"something").unwrap();
    let frame = transport.peek("t").unwrap();
    assert!(!contains(&frame, b"something"));
    assert!(SecureEnvelope::decode(&frame).unwrap().is_encrypted());

    let message = engine.receive("t").unwrap().unwrap();
    assert_eq!(message.content, b"something");
    assert!(message.was_encrypted);
}

/// Tests that an unsatisfied expression yields an empty result, not an error.
#[test]
fn production_filters_when_visibility_is_unsatisfied() {
    let (engine, _) = engine(BroadcastMode::Production, "TS,G");
    let (private, _) = keypair();
    engine.register_topic_with_key("t", &private, true).unwrap();
    engine.broadcast("t", "S&(USA|CAN)", b"something").unwrap();
    assert!(engine.receive("t").unwrap().is_none());
}

/// Tests receive_with evaluates the explicit authorization set.
#[test]
fn receive_with_uses_explicit_authorizations() {
    let (engine, _) = engine(BroadcastMode::Production, "");
    let key = TopicKey::symmetric(symmetric_key());
    engine.register_topic_key("t", key).unwrap();
    engine.broadcast("t", "A|B", b"payload").unwrap();
    let message = engine.receive_with("t", &Authorizations::parse_list("B")).unwrap();
    assert_eq!(message.unwrap().content, b"payload");
}

/// Tests that production broadcast without a key fails loudly.
#[test]
fn production_broadcast_without_key_is_missing_key() {
    let (engine, transport) = engine(BroadcastMode::Production, "U");
    let err = engine.broadcast("topic", "U", b"hello").unwrap_err();
    assert!(matches!(err, BroadcastError::MissingKey { .. }));
    assert!(transport.peek("topic").is_none());
}

/// Tests production registration without any key source.
#[test]
fn production_register_without_key_is_missing_key() {
    let (engine, _) = engine(BroadcastMode::Production, "");
    assert!(matches!(engine.register_topic("nokey"), Err(BroadcastError::MissingKey { .. })));
    assert!(matches!(engine.subscribe_to_topic("nokey"), Err(BroadcastError::MissingKey { .. })));
}

/// Tests public-only topics can broadcast but not receive.
#[test]
fn public_only_topic_broadcasts_but_cannot_receive() {
    let (engine, transport) = engine(BroadcastMode::Production, "TS,G");
    let (_, public) = keypair();
    engine.register_topic_with_key("pubkey", &public, false).unwrap();
    engine.broadcast("pubkey", "TS&G", b"Shouldn't get this message back").unwrap();
    assert!(!contains(&transport.peek("pubkey").unwrap(), b"Shouldn't"));

    assert!(matches!(engine.receive("pubkey"), Err(BroadcastError::MissingKey { .. })));
    assert!(matches!(engine.subscribe_to_topic("pubkey"), Err(BroadcastError::MissingKey { .. })));
}

/// Tests that a separate engine holding the private half can read public-key broadcasts.
#[test]
fn private_half_reads_public_key_broadcasts() {
    let transport = SharedTransport::default();
    let (private, public) = keypair();
    let sender = BroadcastEngine::builder("g", Box::new(transport.clone()))
        .mode(BroadcastMode::Production)
        .build();
    let receiver = BroadcastEngine::builder("g", Box::new(transport.clone()))
        .mode(BroadcastMode::Production)
        .authorizations(Authorizations::parse_list("U"))
        .build();
    sender.register_topic_with_key("t", &public, false).unwrap();
    receiver.register_topic_with_key("t", &private, true).unwrap();

    sender.broadcast("t", "U", b"cross engine").unwrap();
    assert_eq!(receiver.receive("t").unwrap().unwrap().content, b"cross engine");
}

/// Tests that the wrong key surfaces as a decryption error.
#[test]
fn mismatched_key_is_decryption_error() {
    let transport = SharedTransport::default();
    let (_, public) = keypair();
    let (other_private, _) = keypair();
    let sender = BroadcastEngine::builder("g", Box::new(transport.clone()))
        .mode(BroadcastMode::Production)
        .build();
    let receiver = BroadcastEngine::builder("g", Box::new(transport.clone()))
        .mode(BroadcastMode::Production)
        .build();
    sender.register_topic_with_key("t", &public, false).unwrap();
    receiver.register_topic_with_key("t", &other_private, true).unwrap();

    sender.broadcast("t", "U", b"data").unwrap();
    let err = receiver.receive("t").unwrap_err();
    assert!(matches!(err, BroadcastError::Decryption { .. }));
}

/// Tests that corrupted frames surface as malformed envelopes.
#[test]
fn corrupted_frame_is_malformed_envelope() {
    let (engine, transport) = engine(BroadcastMode::NonProduction, "");
    transport.inject("t", b"garbage".to_vec());
    assert!(matches!(engine.receive("t"), Err(BroadcastError::MalformedEnvelope { .. })));
}

/// Tests that a receive failing on a missing key still consumes the frame.
#[test]
fn failed_receive_consumes_the_frame() {
    let (engine, transport) = engine(BroadcastMode::Production, "U");
    let key = symmetric_key();
    engine.register_topic_key("t", TopicKey::symmetric(key.clone())).unwrap();
    engine.broadcast("t", "U", b"dropped").unwrap();
    engine.unregister_topic("t").unwrap();

    assert!(matches!(engine.receive("t"), Err(BroadcastError::MissingKey { .. })));
    assert!(transport.peek("t").is_none());
    engine.register_topic_key("t", TopicKey::symmetric(key)).unwrap();
    assert!(engine.receive("t").unwrap().is_none());
}

/// Tests the production payload limit leaves room for the cipher overhead.
#[test]
fn production_payload_limit_accounts_for_cipher_overhead() {
    let (_, public) = keypair();
    for key in [TopicKey::symmetric(symmetric_key()), TopicKey::public(public.to_vec())] {
        let (engine, transport) = engine(BroadcastMode::Production, "U");
        let max_bytes = MAX_PAYLOAD_BYTES - CipherScheme::for_role(key.role()).overhead();
        engine.register_topic_key("big", key).unwrap();

        engine.broadcast("big", "U", &vec![b'p'; max_bytes]).unwrap();
        assert!(transport.peek("big").is_some());
        transport.poll("big").unwrap();

        let err = engine.broadcast("big", "U", &vec![b'p'; max_bytes + 1]).unwrap_err();
        match err {
            BroadcastError::PayloadTooLarge {
                max_bytes: reported,
                actual_bytes,
            } => {
                assert_eq!(reported, max_bytes);
                assert_eq!(actual_bytes, max_bytes + 1);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(transport.peek("big").is_none());
    }
}

/// Tests that an empty topic returns nothing in both modes.
#[test]
fn empty_topic_receives_nothing() {
    let (engine, _) = engine(BroadcastMode::Production, "");
    assert!(engine.receive("quiet").unwrap().is_none());
}

// ============================================================================
// SECTION: Topic Lifecycle
// ============================================================================

/// Tests that registering identical material twice is idempotent.
#[test]
fn registering_same_key_twice_is_idempotent() {
    let (engine, _) = engine(BroadcastMode::Production, "");
    let (_, public) = keypair();
    let first = engine.register_topic_with_key("pubkey", &public, false).unwrap();
    let second = engine.register_topic_with_key("pubkey", &public, false).unwrap();
    assert_eq!(first, second);
    assert_eq!(engine.register_topic("pubkey").unwrap(), first);
}

/// Tests oversized keys leave the topic unregistered.
#[test]
fn oversized_key_leaves_topic_unregistered() {
    let (engine, _) = engine(BroadcastMode::Production, "");
    let err = engine.register_topic_with_key("largekey", &vec![b'k'; MAX_KEY_BYTES + 1], true).unwrap_err();
    assert!(matches!(err, BroadcastError::KeyTooLarge { .. }));
    assert_eq!(engine.topic_state("largekey").unwrap(), TopicState::Unregistered);
}

/// Tests malformed keys fail registration and keep prior state.
#[test]
fn invalid_key_keeps_prior_state() {
    let (engine, _) = engine(BroadcastMode::Production, "");
    let (private, _) = keypair();
    let before = engine.register_topic_with_key("t", &private, true).unwrap();
    let err = engine.register_topic_with_key("t", b"123456781234567812345678123456", false).unwrap_err();
    assert!(matches!(err, BroadcastError::InvalidKeyFormat { .. }));
    assert_eq!(engine.topic_state("t").unwrap(), before);
}

/// Tests that empty material counts as no key supplied.
#[test]
fn empty_material_is_no_key() {
    let (engine, _) = engine(BroadcastMode::Production, "");
    assert!(matches!(
        engine.register_topic_with_key("t", b"", true),
        Err(BroadcastError::MissingKey { .. })
    ));
}

/// Tests unregister followed by receive of an encrypted message.
#[test]
fn unregister_then_receive_is_missing_key() {
    let (engine, _) = engine(BroadcastMode::Production, "U");
    let (private, _) = keypair();
    engine.register_topic_with_key("encrypted", &private, true).unwrap();
    engine.broadcast("encrypted", "U", b"hello there!").unwrap();
    engine.unregister_topic("encrypted").unwrap();
    assert_eq!(engine.topic_state("encrypted").unwrap(), TopicState::Unregistered);
    assert!(matches!(engine.receive("encrypted"), Err(BroadcastError::MissingKey { .. })));
}

/// Tests registration through a key source.
#[test]
fn register_topic_loads_from_key_source() {
    let (private, public) = keypair();
    let source = StaticKeySource::default()
        .with_key("encrypted", TopicKey::private(private.to_vec()))
        .with_key("encrypted", TopicKey::public(public.to_vec()));
    let transport = SharedTransport::default();
    let engine = BroadcastEngine::builder("test", Box::new(transport))
        .mode(BroadcastMode::Production)
        .key_source(Arc::new(source))
        .authorizations(Authorizations::parse_list("U"))
        .build();

    assert_eq!(
        engine.register_topic("encrypted").unwrap(),
        TopicState::KeyLoaded {
            public: true,
            private: true,
            symmetric: false,
        }
    );
    engine.subscribe_to_topic("encrypted").unwrap();
    engine.broadcast("encrypted", "U", b"via source").unwrap();
    assert_eq!(engine.receive("encrypted").unwrap().unwrap().content, b"via source");
    assert!(matches!(engine.register_topic("other"), Err(BroadcastError::MissingKey { .. })));
}

/// Tests key source failures map onto the error taxonomy.
#[test]
fn key_source_errors_are_mapped() {
    let too_large = StaticKeySource::failing(KeySourceError::TooLarge {
        source_name: "largekey.priv".to_string(),
        max_bytes: MAX_KEY_BYTES,
        actual_bytes: MAX_KEY_BYTES + 1,
    });
    let engine = BroadcastEngine::builder("test", Box::new(SharedTransport::default()))
        .mode(BroadcastMode::Production)
        .key_source(Arc::new(too_large))
        .build();
    assert!(matches!(engine.register_topic("largekey"), Err(BroadcastError::KeyTooLarge { .. })));

    let io = StaticKeySource::failing(KeySourceError::Io("denied".to_string()));
    let engine = BroadcastEngine::builder("test", Box::new(SharedTransport::default()))
        .key_source(Arc::new(io))
        .build();
    assert!(matches!(engine.register_topic("t"), Err(BroadcastError::KeySource(_))));
}

/// Tests that an invalid key from the source stores nothing.
#[test]
fn invalid_source_key_stores_nothing() {
    let (private, _) = keypair();
    let source = StaticKeySource::default()
        .with_key("t", TopicKey::private(private.to_vec()))
        .with_key("t", TopicKey::public(b"broken".to_vec()));
    let engine = BroadcastEngine::builder("test", Box::new(SharedTransport::default()))
        .mode(BroadcastMode::Production)
        .key_source(Arc::new(source))
        .build();
    assert!(matches!(engine.register_topic("t"), Err(BroadcastError::InvalidKeyFormat { .. })));
    assert_eq!(engine.topic_state("t").unwrap(), TopicState::Unregistered);
}

/// Tests a custom authorizer overrides expression evaluation.
#[test]
fn custom_authorizer_is_consulted() {
    let engine = BroadcastEngine::builder("test", Box::new(SharedTransport::default()))
        .authorizer(Arc::new(|visibility: &VisibilityExpression, _: &Authorizations| {
            visibility.as_str() == "public"
        }))
        .build();
    engine.broadcast("t", "public", b"a").unwrap();
    assert!(engine.receive("t").unwrap().is_some());
    engine.broadcast("t", "private", b"b").unwrap();
    assert!(engine.receive("t").unwrap().is_none());
}

// ============================================================================
// SECTION: Close
// ============================================================================

/// Tests close runs once and later calls fail.
#[test]
fn close_is_once_and_blocks_later_calls() {
    let (engine, transport) = engine(BroadcastMode::NonProduction, "");
    engine.close().unwrap();
    engine.close().unwrap();
    assert_eq!(transport.close_count(), 1);
    assert!(engine.is_closed());
    assert!(matches!(engine.broadcast("t", "U", b"x"), Err(BroadcastError::Closed)));
    assert!(matches!(engine.receive("t"), Err(BroadcastError::Closed)));
    assert!(matches!(engine.register_topic("t"), Err(BroadcastError::Closed)));
    assert!(matches!(engine.unregister_topic("t"), Err(BroadcastError::Closed)));
}

// ============================================================================
// SECTION: Concurrency
// ============================================================================

/// Tests concurrent traffic on distinct topics does not interfere.
#[test]
fn concurrent_topics_do_not_interfere() {
    let (engine, _) = engine(BroadcastMode::Production, "U");
    let engine = Arc::new(engine);
    let handles: Vec<_> = (0 .. 6)
        .map(|i| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let topic = format!("topic-{i}");
                engine.register_topic_key(&topic, TopicKey::symmetric(symmetric_key())).unwrap();
                for round in 0 .. 20 {
                    let payload = format!("{topic}:{round}");
                    engine.broadcast(&topic, "U", payload.as_bytes()).unwrap();
                    let message = engine.receive(&topic).unwrap().unwrap();
                    assert_eq!(message.content, payload.as_bytes());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}

/// Tests key churn on one topic is serialized with traffic on that topic.
#[test]
fn key_churn_on_one_topic_is_serialized_with_traffic() {
    let (engine, _) = engine(BroadcastMode::Production, "U");
    let engine = Arc::new(engine);
    let key = symmetric_key();
    engine.register_topic_key("shared", TopicKey::symmetric(key.clone())).unwrap();

    let mut handles = Vec::new();
    for _ in 0 .. 2 {
        let engine = Arc::clone(&engine);
        let key = key.clone();
        handles.push(thread::spawn(move || {
            for _ in 0 .. 200 {
                engine.unregister_topic("shared").unwrap();
                engine.register_topic_key("shared", TopicKey::symmetric(key.clone())).unwrap();
            }
            Vec::<BroadcastError>::new()
        }));
    }
    for worker in 0 .. 4 {
        let engine = Arc::clone(&engine);
        handles.push(thread::spawn(move || {
            let mut failures = Vec::new();
            for round in 0 .. 200 {
                let result = if worker % 2 == 0 {
                    engine.broadcast("shared", "U", format!("{worker}:{round}").as_bytes())
                } else {
                    engine.receive("shared").map(|_| ())
                };
                if let Err(err) = result {
                    failures.push(err);
                }
            }
            failures
        }));
    }

    for handle in handles {
        for err in handle.join().unwrap() {
            assert!(matches!(err, BroadcastError::MissingKey { .. }), "{err}");
        }
    }
}
