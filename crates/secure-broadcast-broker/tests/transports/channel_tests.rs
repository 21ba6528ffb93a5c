// crates/secure-broadcast-broker/tests/transports/channel_tests.rs
// ============================================================================
// Module: ChannelTransport Tests
// Description: FIFO delivery, backpressure, and close behavior.
// Purpose: Validate the bounded queue backend contract.
// Dependencies: secure-broadcast-broker, secure-broadcast-core
// ============================================================================

//! ## Overview
//! Exercises [`secure_broadcast_broker::ChannelTransport`].

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

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::thread;

use secure_broadcast_broker::ChannelTransport;
use secure_broadcast_core::Transport;
use secure_broadcast_core::TransportError;

/// Builds a channel transport with the given capacity.
fn channel(capacity: usize) -> ChannelTransport {
    ChannelTransport::new(NonZeroUsize::new(capacity).unwrap())
}

// ============================================================================
// SECTION: Delivery
// ============================================================================

/// Tests frames are delivered in send order.
#[test]
fn channel_delivers_fifo() {
    let transport = channel(4);
    for frame in [b"1", b"2", b"3"] {
        transport.send("t", frame.to_vec()).unwrap();
    }
    assert_eq!(transport.poll("t").unwrap(), Some(b"1".to_vec()));
    assert_eq!(transport.poll("t").unwrap(), Some(b"2".to_vec()));
    assert_eq!(transport.poll("t").unwrap(), Some(b"3".to_vec()));
    assert_eq!(transport.poll("t").unwrap(), None);
}

/// Tests drained topics release their queues.
#[test]
fn channel_drops_drained_queues() {
    let transport = channel(4);
    for topic in ["a", "b", "c"] {
        transport.send(topic, b"frame".to_vec()).unwrap();
    }
    transport.send("a", b"second".to_vec()).unwrap();
    assert_eq!(transport.queued_topics().unwrap(), 3);

    assert_eq!(transport.poll("a").unwrap(), Some(b"frame".to_vec()));
    assert_eq!(transport.queued_topics().unwrap(), 3);
    assert_eq!(transport.poll("a").unwrap(), Some(b"second".to_vec()));
    assert_eq!(transport.poll("b").unwrap(), Some(b"frame".to_vec()));
    assert_eq!(transport.queued_topics().unwrap(), 1);
    assert_eq!(transport.poll("missing").unwrap(), None);
    assert_eq!(transport.queued_topics().unwrap(), 1);

    transport.send("a", b"again".to_vec()).unwrap();
    assert_eq!(transport.poll("a").unwrap(), Some(b"again".to_vec()));
    assert_eq!(transport.poll("c").unwrap(), Some(b"frame".to_vec()));
    assert_eq!(transport.queued_topics().unwrap(), 0);
}

/// Tests polling an unknown topic yields nothing.
#[test]
fn channel_poll_unknown_topic_is_empty() {
    assert_eq!(channel(1).poll("missing").unwrap(), None);
}

/// Tests a full queue reports backpressure and recovers after a poll.
#[test]
fn channel_full_queue_reports_backpressure() {
    let transport = channel(2);
    transport.send("t", b"a".to_vec()).unwrap();
    transport.send("t", b"b".to_vec()).unwrap();
    assert_eq!(
        transport.send("t", b"c".to_vec()),
        Err(TransportError::Backpressure {
            topic: "t".to_string()
        })
    );
    transport.send("other", b"x".to_vec()).unwrap();
    assert_eq!(transport.poll("t").unwrap(), Some(b"a".to_vec()));
    transport.send("t", b"c".to_vec()).unwrap();
    assert_eq!(transport.capacity().get(), 2);
}

/// Tests concurrent producers lose no frames within capacity.
#[test]
fn channel_concurrent_producers() {
    let transport = Arc::new(channel(64));
    let handles: Vec<_> = (0_u8..8)
        .map(|id| {
            let transport = Arc::clone(&transport);
            thread::spawn(move || {
                for seq in 0_u8..4 {
                    transport.send("t", vec![id, seq]).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    let mut received = Vec::new();
    while let Some(frame) = transport.poll("t").unwrap() {
        received.push(frame);
    }
    assert_eq!(received.len(), 32);
}

// ============================================================================
// SECTION: Close
// ============================================================================

/// Tests close drops queued frames and rejects further use.
#[test]
fn channel_close_rejects_further_calls() {
    let transport = channel(2);
    transport.send("t", b"a".to_vec()).unwrap();
    transport.close().unwrap();
    transport.close().unwrap();
    assert_eq!(transport.send("t", b"b".to_vec()), Err(TransportError::Closed));
    assert_eq!(transport.poll("t"), Err(TransportError::Closed));
}
