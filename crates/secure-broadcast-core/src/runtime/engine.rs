// crates/secure-broadcast-core/src/runtime/engine.rs
// ============================================================================
// Module: Broadcast Engine
// Description: Topic registration state machine and broadcast/receive protocol.
// Purpose: Orchestrate key store, codec, transport, and authorizer calls.
// Dependencies: crate::{core, interfaces, runtime}, visibility-logic
// ============================================================================

//! ## Overview
//! A [`BroadcastEngine`] owns one transport and one key store for a logical
//! group. Its mode is fixed at construction:
//!
//! - **Production**: payloads are encrypted with the topic key before they
//!   reach the transport; receiving requires a decrypting key.
//! - **Non-production**: payloads travel as plaintext frames.
//!
//! Topic state moves `Unregistered -> KeyLoaded` on registration and back on
//! unregistration. Key mutation on a topic takes that topic's write gate;
//! broadcast and receive take its read gate, so a key cannot vanish mid-call.
//! Different topics never contend. A gate is dropped once its topic holds no
//! keys and no call is using it.
//!
//! Receiving consumes the polled frame before any key check; a receive that
//! fails with a key or decryption error does not get the frame back.
//!
//! Security posture: a missing key is a loud error; an authorization mismatch
//! is a silent empty result in both modes. Visibility is validated before any
//! encryption.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::RwLock;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use visibility_logic::Authorizations;
use visibility_logic::Authorizer;
use visibility_logic::ExpressionAuthorizer;
use visibility_logic::VisibilityExpression;

use crate::core::envelope::MAX_PAYLOAD_BYTES;
use crate::core::envelope::SecureEnvelope;
use crate::core::envelope::SecureMessage;
use crate::core::identifiers::GroupId;
use crate::core::keys::KeyRole;
use crate::core::keys::TopicKey;
use crate::core::keys::TopicState;
use crate::core::mode::BroadcastMode;
use crate::interfaces::KeySource;
use crate::interfaces::Transport;
use crate::runtime::audit::AuditOutcome;
use crate::runtime::audit::BroadcastAuditEvent;
use crate::runtime::audit::BroadcastAuditEventParams;
use crate::runtime::audit::BroadcastAuditSink;
use crate::runtime::audit::NoopAuditSink;
use crate::runtime::codec::CipherScheme;
use crate::runtime::codec::SecureEnvelopeCodec;
use crate::runtime::error::BroadcastError;
use crate::runtime::key_store::KeyStore;

// ============================================================================
// SECTION: Audit Labels
// ============================================================================

/// Audit event for topic registration.
const EVENT_TOPIC_REGISTERED: &str = "topic_registered";
/// Audit event for topic unregistration.
const EVENT_TOPIC_UNREGISTERED: &str = "topic_unregistered";
/// Audit event for topic subscription.
const EVENT_TOPIC_SUBSCRIBED: &str = "topic_subscribed";
/// Audit event for a broadcast.
const EVENT_MESSAGE_BROADCAST: &str = "message_broadcast";
/// Audit event for a delivered or failed receive.
const EVENT_MESSAGE_RECEIVED: &str = "message_received";
/// Audit event for a receive withheld by the authorizer.
const EVENT_MESSAGE_FILTERED: &str = "message_filtered";
/// Audit event for engine shutdown.
const EVENT_ENGINE_CLOSED: &str = "engine_closed";

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Builder for [`BroadcastEngine`].
pub struct BroadcastEngineBuilder {
    /// Group owning the engine.
    group: GroupId,
    /// Transport owned by the engine.
    transport: Box<dyn Transport>,
    /// Encryption mode.
    mode: BroadcastMode,
    /// Receive-time visibility policy.
    authorizer: Arc<dyn Authorizer>,
    /// Authorizations used by [`BroadcastEngine::receive`].
    authorizations: Authorizations,
    /// Optional key supplier for registration without material.
    key_source: Option<Arc<dyn KeySource>>,
    /// Audit sink.
    audit: Arc<dyn BroadcastAuditSink>,
}

impl BroadcastEngineBuilder {
    /// Sets the encryption mode. Defaults to non-production.
    #[must_use]
    pub const fn mode(mut self, mode: BroadcastMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the receive-time authorizer. Defaults to [`ExpressionAuthorizer`].
    #[must_use]
    pub fn authorizer(mut self, authorizer: Arc<dyn Authorizer>) -> Self {
        self.authorizer = authorizer;
        self
    }

    /// Sets the authorizations used by [`BroadcastEngine::receive`].
    #[must_use]
    pub fn authorizations(mut self, authorizations: Authorizations) -> Self {
        self.authorizations = authorizations;
        self
    }

    /// Sets the key source consulted when registering without material.
    #[must_use]
    pub fn key_source(mut self, key_source: Arc<dyn KeySource>) -> Self {
        self.key_source = Some(key_source);
        self
    }

    /// Sets the audit sink. Defaults to a no-op sink.
    #[must_use]
    pub fn audit_sink(mut self, audit: Arc<dyn BroadcastAuditSink>) -> Self {
        self.audit = audit;
        self
    }

    /// Builds the engine.
    #[must_use]
    pub fn build(self) -> BroadcastEngine {
        BroadcastEngine {
            group: self.group,
            mode: self.mode,
            transport: self.transport,
            key_store: KeyStore::new(),
            authorizer: self.authorizer,
            authorizations: self.authorizations,
            key_source: self.key_source,
            audit: self.audit,
            topic_gates: Mutex::new(BTreeMap::new()),
            closed: AtomicBool::new(false),
        }
    }
}

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Receive result before auditing.
enum ReceiveOutcome {
    /// No frame was waiting.
    Empty,
    /// Frame was readable but withheld by the authorizer.
    Filtered {
        /// Whether the frame was encrypted.
        encrypted: bool,
    },
    /// Frame was delivered to the caller.
    Delivered(SecureMessage),
}

/// Payload facts attached to audit records.
#[derive(Debug, Clone, Copy, Default)]
struct PayloadFacts {
    /// Whether the payload crossed the transport encrypted.
    encrypted: Option<bool>,
    /// Plaintext size in bytes.
    payload_bytes: Option<usize>,
}

/// Secure broadcast engine for one group.
///
/// # Invariants
/// - The key store and transport are owned exclusively by this instance.
/// - After [`BroadcastEngine::close`], every call except `close` fails with
///   [`BroadcastError::Closed`].
pub struct BroadcastEngine {
    /// Group owning the engine.
    group: GroupId,
    /// Encryption mode, fixed at construction.
    mode: BroadcastMode,
    /// Transport owned by the engine.
    transport: Box<dyn Transport>,
    /// Per-topic key material.
    key_store: KeyStore,
    /// Receive-time visibility policy.
    authorizer: Arc<dyn Authorizer>,
    /// Authorizations used by [`BroadcastEngine::receive`].
    authorizations: Authorizations,
    /// Optional key supplier for registration without material.
    key_source: Option<Arc<dyn KeySource>>,
    /// Audit sink.
    audit: Arc<dyn BroadcastAuditSink>,
    /// Per-topic reader/writer gates.
    topic_gates: Mutex<BTreeMap<String, Arc<RwLock<()>>>>,
    /// Set once the engine has been closed.
    closed: AtomicBool,
}

impl BroadcastEngine {
    /// Starts building an engine for `group` over `transport`.
    #[must_use]
    pub fn builder(group: impl Into<GroupId>, transport: Box<dyn Transport>) -> BroadcastEngineBuilder {
        BroadcastEngineBuilder {
            group: group.into(),
            transport,
            mode: BroadcastMode::default(),
            authorizer: Arc::new(ExpressionAuthorizer),
            authorizations: Authorizations::new(),
            key_source: None,
            audit: Arc::new(NoopAuditSink),
        }
    }

    /// Returns the engine group.
    #[must_use]
    pub const fn group(&self) -> &GroupId {
        &self.group
    }

    /// Returns the engine mode.
    #[must_use]
    pub const fn mode(&self) -> BroadcastMode {
        self.mode
    }

    /// Returns true once [`BroadcastEngine::close`] has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    // ------------------------------------------------------------------------
    // Topic lifecycle
    // ------------------------------------------------------------------------

    /// Registers a topic, loading keys from the key source when none are held.
    ///
    /// # Errors
    ///
    /// Returns [`BroadcastError::MissingKey`] in production mode when no key is
    /// held or loadable, and key validation or key source errors otherwise.
    pub fn register_topic(&self, topic: &str) -> Result<TopicState, BroadcastError> {
        let result = self.register(topic, None);
        self.prune_gate(topic);
        self.audit_result(EVENT_TOPIC_REGISTERED, topic, &result, PayloadFacts::default());
        result
    }

    /// Registers a topic with asymmetric key material.
    ///
    /// Empty material means no key was supplied and behaves like
    /// [`BroadcastEngine::register_topic`].
    ///
    /// # Errors
    ///
    /// Returns [`BroadcastError::KeyTooLarge`] or
    /// [`BroadcastError::InvalidKeyFormat`] for unusable material; the topic
    /// keeps its prior state.
    pub fn register_topic_with_key(
        &self,
        topic: &str,
        material: &[u8],
        is_private: bool,
    ) -> Result<TopicState, BroadcastError> {
        self.register_topic_key(topic, TopicKey::new(KeyRole::from_private_flag(is_private), material))
    }

    /// Registers a topic with a key of any role.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`BroadcastEngine::register_topic_with_key`].
    pub fn register_topic_key(&self, topic: &str, key: TopicKey) -> Result<TopicState, BroadcastError> {
        let key = if key.material().is_empty() { None } else { Some(key) };
        let result = self.register(topic, key);
        self.prune_gate(topic);
        self.audit_result(EVENT_TOPIC_REGISTERED, topic, &result, PayloadFacts::default());
        result
    }

    /// Removes every key for a topic, returning it to `Unregistered`.
    ///
    /// # Errors
    ///
    /// Returns [`BroadcastError::Closed`] after close, or an internal error
    /// when engine state is poisoned.
    pub fn unregister_topic(&self, topic: &str) -> Result<(), BroadcastError> {
        let result = self.unregister(topic);
        self.prune_gate(topic);
        self.audit_result(EVENT_TOPIC_UNREGISTERED, topic, &result, PayloadFacts::default());
        result
    }

    /// Asserts the engine can read the topic.
    ///
    /// # Errors
    ///
    /// Returns [`BroadcastError::MissingKey`] when the topic is unregistered or
    /// holds only a public key.
    pub fn subscribe_to_topic(&self, topic: &str) -> Result<(), BroadcastError> {
        let result = self.subscribe(topic);
        self.audit_result(EVENT_TOPIC_SUBSCRIBED, topic, &result, PayloadFacts::default());
        result
    }

    /// Returns the key registration state of a topic.
    ///
    /// # Errors
    ///
    /// Returns [`BroadcastError::Closed`] after close, or an internal error
    /// when engine state is poisoned.
    pub fn topic_state(&self, topic: &str) -> Result<TopicState, BroadcastError> {
        self.ensure_open()?;
        Ok(self.key_store.state(topic)?)
    }

    // ------------------------------------------------------------------------
    // Messaging
    // ------------------------------------------------------------------------

    /// Broadcasts a payload to a topic under a visibility expression.
    ///
    /// # Errors
    ///
    /// Returns [`BroadcastError::MalformedVisibility`] before any encryption
    /// when the expression is invalid, [`BroadcastError::MissingKey`] in
    /// production mode without a usable key, and transport errors from the
    /// backend.
    pub fn broadcast(&self, topic: &str, visibility: &str, payload: &[u8]) -> Result<(), BroadcastError> {
        let result = self.send_envelope(topic, visibility, payload);
        self.prune_gate(topic);
        let facts = PayloadFacts {
            encrypted: result.as_ref().ok().copied(),
            payload_bytes: Some(payload.len()),
        };
        let result = result.map(|_| ());
        self.audit_result(EVENT_MESSAGE_BROADCAST, topic, &result, facts);
        result
    }

    /// Receives the next message on a topic using the engine's authorizations.
    ///
    /// Returns `Ok(None)` when nothing is waiting or the authorizer withholds
    /// the message.
    ///
    /// # Errors
    ///
    /// Returns [`BroadcastError::MissingKey`] when an encrypted message arrives
    /// on a topic without a decrypting key and [`BroadcastError::Decryption`]
    /// when the key does not open it. In both cases the frame is consumed.
    pub fn receive(&self, topic: &str) -> Result<Option<SecureMessage>, BroadcastError> {
        self.receive_with(topic, &self.authorizations)
    }

    /// Receives the next message on a topic for an explicit authorization set.
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`BroadcastEngine::receive`].
    pub fn receive_with(
        &self,
        topic: &str,
        authorizations: &Authorizations,
    ) -> Result<Option<SecureMessage>, BroadcastError> {
        let outcome = self.take_message(topic, authorizations);
        self.prune_gate(topic);
        match outcome {
            Ok(ReceiveOutcome::Empty) => Ok(None),
            Ok(ReceiveOutcome::Filtered {
                encrypted,
            }) => {
                self.emit(EVENT_MESSAGE_FILTERED, topic, AuditOutcome::Filtered, None, PayloadFacts {
                    encrypted: Some(encrypted),
                    payload_bytes: None,
                });
                Ok(None)
            }
            Ok(ReceiveOutcome::Delivered(message)) => {
                self.emit(EVENT_MESSAGE_RECEIVED, topic, AuditOutcome::Success, None, PayloadFacts {
                    encrypted: Some(message.was_encrypted),
                    payload_bytes: Some(message.content.len()),
                });
                Ok(Some(message))
            }
            Err(err) => {
                self.emit(
                    EVENT_MESSAGE_RECEIVED,
                    topic,
                    AuditOutcome::Failure,
                    Some(&err),
                    PayloadFacts::default(),
                );
                Err(err)
            }
        }
    }

    /// Closes the transport. Later calls to `close` are no-ops.
    ///
    /// # Errors
    ///
    /// Returns [`BroadcastError::Transport`] when the backend fails to close.
    pub fn close(&self) -> Result<(), BroadcastError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let result = self.transport.close().map_err(BroadcastError::from);
        let (outcome, error) = match &result {
            Ok(()) => (AuditOutcome::Success, None),
            Err(err) => (AuditOutcome::Failure, Some(err.kind())),
        };
        self.audit.record(&BroadcastAuditEvent::new(BroadcastAuditEventParams {
            event: EVENT_ENGINE_CLOSED,
            group: self.group.to_string(),
            topic: None,
            mode: self.mode,
            outcome,
            error_kind: error,
            encrypted: None,
            payload_bytes: None,
        }));
        result
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    /// Registers a topic while holding its write gate.
    fn register(&self, topic: &str, key: Option<TopicKey>) -> Result<TopicState, BroadcastError> {
        self.ensure_open()?;
        let gate = self.topic_gate(topic)?;
        let _guard = gate.write().map_err(|_| poisoned_gate(topic))?;

        if let Some(key) = key {
            self.key_store.put(topic, key)?;
            return Ok(self.key_store.state(topic)?);
        }

        if self.key_store.state(topic)? == TopicState::Unregistered
            && let Some(source) = &self.key_source
        {
            let keys = source.load(topic).map_err(|err| BroadcastError::from_key_source(topic, err))?;
            for key in &keys {
                KeyStore::validate(topic, key)?;
            }
            for key in keys {
                self.key_store.put(topic, key)?;
            }
        }

        let state = self.key_store.state(topic)?;
        if self.mode.is_production() && !state.can_encrypt() {
            return Err(BroadcastError::MissingKey {
                topic: topic.to_string(),
                reason: "no key material registered",
            });
        }
        Ok(state)
    }

    /// Unregisters a topic while holding its write gate.
    fn unregister(&self, topic: &str) -> Result<(), BroadcastError> {
        self.ensure_open()?;
        let gate = self.topic_gate(topic)?;
        let _guard = gate.write().map_err(|_| poisoned_gate(topic))?;
        self.key_store.remove(topic)?;
        Ok(())
    }

    /// Checks that the topic holds a decrypting key.
    fn subscribe(&self, topic: &str) -> Result<(), BroadcastError> {
        self.ensure_open()?;
        if !self.key_store.state(topic)?.can_decrypt() {
            return Err(BroadcastError::MissingKey {
                topic: topic.to_string(),
                reason: "no private or symmetric key registered",
            });
        }
        Ok(())
    }

    /// Encodes and sends one envelope. Returns whether it was encrypted.
    fn send_envelope(&self, topic: &str, visibility: &str, payload: &[u8]) -> Result<bool, BroadcastError> {
        self.ensure_open()?;
        let visibility = VisibilityExpression::parse(visibility)?;
        if payload.len() > MAX_PAYLOAD_BYTES {
            return Err(BroadcastError::PayloadTooLarge {
                max_bytes: MAX_PAYLOAD_BYTES,
                actual_bytes: payload.len(),
            });
        }

        let gate = self.topic_gate(topic)?;
        let _guard = gate.read().map_err(|_| poisoned_gate(topic))?;

        let envelope = if self.mode.is_production() {
            let key = self.key_store.encryption_key(topic)?.ok_or_else(|| BroadcastError::MissingKey {
                topic: topic.to_string(),
                reason: "no encryption key registered",
            })?;
            let max_bytes = MAX_PAYLOAD_BYTES.saturating_sub(CipherScheme::for_role(key.role()).overhead());
            if payload.len() > max_bytes {
                return Err(BroadcastError::PayloadTooLarge {
                    max_bytes,
                    actual_bytes: payload.len(),
                });
            }
            let ciphertext =
                SecureEnvelopeCodec::encrypt(payload, &key).map_err(|source| BroadcastError::Encryption {
                    topic: topic.to_string(),
                    source,
                })?;
            SecureEnvelope::encrypted(visibility, ciphertext)
        } else {
            SecureEnvelope::plaintext(visibility, payload.to_vec())
        };

        let frame = envelope.encode().map_err(|err| BroadcastError::from_envelope(topic, err))?;
        self.transport.send(topic, frame)?;
        Ok(envelope.is_encrypted())
    }

    /// Polls, decodes, decrypts, and authorizes one message.
    fn take_message(
        &self,
        topic: &str,
        authorizations: &Authorizations,
    ) -> Result<ReceiveOutcome, BroadcastError> {
        self.ensure_open()?;
        let gate = self.topic_gate(topic)?;
        let _guard = gate.read().map_err(|_| poisoned_gate(topic))?;

        let Some(frame) = self.transport.poll(topic)? else {
            return Ok(ReceiveOutcome::Empty);
        };
        let envelope = SecureEnvelope::decode(&frame).map_err(|err| BroadcastError::from_envelope(topic, err))?;

        if !envelope.is_encrypted() {
            let (visibility, content) = envelope.into_parts();
            return Ok(self.authorize(topic, visibility, content, false, authorizations));
        }

        if !self.key_store.state(topic)?.can_decrypt() {
            return Err(BroadcastError::MissingKey {
                topic: topic.to_string(),
                reason: "no private or symmetric key registered",
            });
        }
        let decryption_error = |source| BroadcastError::Decryption {
            topic: topic.to_string(),
            source,
        };
        let scheme = SecureEnvelopeCodec::scheme(envelope.payload()).map_err(decryption_error)?;
        let key = self.key_store.decryption_key(topic, scheme.decrypting_role())?.ok_or_else(|| {
            BroadcastError::MissingKey {
                topic: topic.to_string(),
                reason: "no private or symmetric key registered",
            }
        })?;
        let content = SecureEnvelopeCodec::decrypt(envelope.payload(), &key).map_err(decryption_error)?;
        let (visibility, _) = envelope.into_parts();
        Ok(self.authorize(topic, visibility, content, true, authorizations))
    }

    /// Applies the authorizer to a readable message.
    fn authorize(
        &self,
        topic: &str,
        visibility: VisibilityExpression,
        content: Vec<u8>,
        was_encrypted: bool,
        authorizations: &Authorizations,
    ) -> ReceiveOutcome {
        if !self.authorizer.permits(&visibility, authorizations) {
            return ReceiveOutcome::Filtered {
                encrypted: was_encrypted,
            };
        }
        ReceiveOutcome::Delivered(SecureMessage {
            topic: topic.to_string(),
            visibility,
            content,
            was_encrypted,
        })
    }

    /// Fails once the engine is closed.
    fn ensure_open(&self) -> Result<(), BroadcastError> {
        if self.is_closed() { Err(BroadcastError::Closed) } else { Ok(()) }
    }

    /// Returns the reader/writer gate for a topic, creating it on first use.
    fn topic_gate(&self, topic: &str) -> Result<Arc<RwLock<()>>, BroadcastError> {
        let mut gates = self
            .topic_gates
            .lock()
            .map_err(|_| BroadcastError::Internal("topic gate registry poisoned".to_string()))?;
        Ok(Arc::clone(gates.entry(topic.to_string()).or_default()))
    }

    /// Drops the gate of a keyless topic once no call holds it.
    ///
    /// Gates are only handed out under the registry lock, so a count of one
    /// means no caller can be inside the gate.
    fn prune_gate(&self, topic: &str) {
        let Ok(mut gates) = self.topic_gates.lock() else {
            return;
        };
        let idle = gates.get(topic).is_some_and(|gate| Arc::strong_count(gate) == 1);
        if idle && matches!(self.key_store.state(topic), Ok(TopicState::Unregistered)) {
            gates.remove(topic);
        }
    }

    /// Returns the number of topics with a live gate.
    #[cfg(test)]
    pub(crate) fn gate_count(&self) -> usize {
        self.topic_gates.lock().map_or(0, |gates| gates.len())
    }

    /// Records the outcome of a topic-scoped operation.
    fn audit_result<T>(
        &self,
        event: &'static str,
        topic: &str,
        result: &Result<T, BroadcastError>,
        facts: PayloadFacts,
    ) {
        match result {
            Ok(_) => self.emit(event, topic, AuditOutcome::Success, None, facts),
            Err(err) => self.emit(event, topic, AuditOutcome::Failure, Some(err), facts),
        }
    }

    /// Emits one topic-scoped audit event.
    fn emit(
        &self,
        event: &'static str,
        topic: &str,
        outcome: AuditOutcome,
        error: Option<&BroadcastError>,
        facts: PayloadFacts,
    ) {
        self.audit.record(&BroadcastAuditEvent::new(BroadcastAuditEventParams {
            event,
            group: self.group.to_string(),
            topic: Some(topic.to_string()),
            mode: self.mode,
            outcome,
            error_kind: error.map(BroadcastError::kind),
            encrypted: facts.encrypted,
            payload_bytes: facts.payload_bytes,
        }));
    }
}

/// Builds the error reported for a poisoned topic gate.
fn poisoned_gate(topic: &str) -> BroadcastError {
    BroadcastError::Internal(format!("topic gate poisoned for {topic}"))
}
