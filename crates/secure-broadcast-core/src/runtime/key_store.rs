// crates/secure-broadcast-core/src/runtime/key_store.rs
// ============================================================================
// Module: Topic Key Store
// Description: Per-topic key material cache with structural validation.
// Purpose: Hold validated keys for one engine and answer role lookups.
// Dependencies: crate::core::keys, thiserror
// ============================================================================

//! ## Overview
//! The key store owns at most one key per (topic, role). It validates size and
//! structural well-formedness; it does not decide what a missing key means.
//! Invariants:
//! - Validation failures leave the stored state untouched.
//! - Re-putting identical material is a no-op success; different material
//!   overwrites the previous value.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::RwLock;

use thiserror::Error;

use crate::core::keys::KeyMaterial;
use crate::core::keys::KeyRole;
use crate::core::keys::MAX_KEY_BYTES;
use crate::core::keys::MIN_SYMMETRIC_KEY_BYTES;
use crate::core::keys::TopicKey;
use crate::core::keys::TopicState;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Key store errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyStoreError {
    /// Material exceeded [`MAX_KEY_BYTES`].
    #[error("key for topic {topic} exceeds size limit: {actual_bytes} bytes (max {max_bytes})")]
    TooLarge {
        /// Topic the key was offered for.
        topic: String,
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual material size.
        actual_bytes: usize,
    },
    /// Material is not structurally valid for its role.
    #[error("invalid {role} key for topic {topic}: {reason}")]
    InvalidFormat {
        /// Topic the key was offered for.
        topic: String,
        /// Declared key role.
        role: KeyRole,
        /// Validation failure description.
        reason: String,
    },
    /// Internal lock was poisoned.
    #[error("key store error: {0}")]
    Store(String),
}

// ============================================================================
// SECTION: Types
// ============================================================================

/// Result of a successful [`KeyStore::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPut {
    /// No key was held for the role.
    Inserted,
    /// Identical material was already held.
    Unchanged,
    /// Different material was replaced.
    Replaced,
}

/// Keys held for one topic.
#[derive(Default)]
struct TopicKeys {
    /// Public key slot.
    public: Option<KeyMaterial>,
    /// Private key slot.
    private: Option<KeyMaterial>,
    /// Symmetric key slot.
    symmetric: Option<KeyMaterial>,
}

impl TopicKeys {
    /// Returns the slot for a role.
    const fn slot(&self, role: KeyRole) -> Option<&KeyMaterial> {
        match role {
            KeyRole::Public => self.public.as_ref(),
            KeyRole::Private => self.private.as_ref(),
            KeyRole::Symmetric => self.symmetric.as_ref(),
        }
    }

    /// Returns the mutable slot for a role.
    const fn slot_mut(&mut self, role: KeyRole) -> &mut Option<KeyMaterial> {
        match role {
            KeyRole::Public => &mut self.public,
            KeyRole::Private => &mut self.private,
            KeyRole::Symmetric => &mut self.symmetric,
        }
    }

    /// Returns the key for a role when present.
    fn key(&self, role: KeyRole) -> Option<TopicKey> {
        self.slot(role).map(|material| TopicKey::new(role, material.clone()))
    }

    /// Summarizes which roles are present.
    const fn state(&self) -> TopicState {
        let public = self.public.is_some();
        let private = self.private.is_some();
        let symmetric = self.symmetric.is_some();
        if public || private || symmetric {
            TopicState::KeyLoaded {
                public,
                private,
                symmetric,
            }
        } else {
            TopicState::Unregistered
        }
    }
}

// ============================================================================
// SECTION: Key Store
// ============================================================================

/// Thread-safe per-topic key store owned by one engine.
#[derive(Default)]
pub struct KeyStore {
    /// Keys indexed by topic.
    entries: RwLock<BTreeMap<String, TopicKeys>>,
}

impl KeyStore {
    /// Creates an empty key store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates key material without storing it.
    ///
    /// # Errors
    ///
    /// Returns [`KeyStoreError::TooLarge`] when the material exceeds
    /// [`MAX_KEY_BYTES`] and [`KeyStoreError::InvalidFormat`] when it is empty
    /// or does not decode for its role.
    pub fn validate(topic: &str, key: &TopicKey) -> Result<(), KeyStoreError> {
        let material = key.material();
        if material.len() > MAX_KEY_BYTES {
            return Err(KeyStoreError::TooLarge {
                topic: topic.to_string(),
                max_bytes: MAX_KEY_BYTES,
                actual_bytes: material.len(),
            });
        }
        let invalid = |reason: &str| KeyStoreError::InvalidFormat {
            topic: topic.to_string(),
            role: key.role(),
            reason: reason.to_string(),
        };
        if material.is_empty() {
            return Err(invalid("key material is empty"));
        }
        match key.role() {
            KeyRole::Public | KeyRole::Private => {
                if material.x25519_bytes().is_none() {
                    return Err(invalid("expected a 32-byte X25519 key as raw, hex, or base64"));
                }
            }
            KeyRole::Symmetric => {
                if material.len() < MIN_SYMMETRIC_KEY_BYTES {
                    return Err(invalid("symmetric key is shorter than 16 bytes"));
                }
            }
        }
        Ok(())
    }

    /// Validates and stores a key for a topic.
    ///
    /// # Errors
    ///
    /// Returns [`KeyStoreError`] when validation fails or the store is poisoned.
    pub fn put(&self, topic: &str, key: TopicKey) -> Result<KeyPut, KeyStoreError> {
        Self::validate(topic, &key)?;
        let mut entries = self.write()?;
        let slot = entries.entry(topic.to_string()).or_default().slot_mut(key.role());
        let outcome = match slot.as_ref() {
            None => KeyPut::Inserted,
            Some(existing) if existing == key.material() => return Ok(KeyPut::Unchanged),
            Some(_) => KeyPut::Replaced,
        };
        *slot = Some(key.material().clone());
        Ok(outcome)
    }

    /// Returns the key held for (topic, role).
    ///
    /// # Errors
    ///
    /// Returns [`KeyStoreError::Store`] when the store is poisoned.
    pub fn get(&self, topic: &str, role: KeyRole) -> Result<Option<TopicKey>, KeyStoreError> {
        Ok(self.read()?.get(topic).and_then(|keys| keys.key(role)))
    }

    /// Removes every key for a topic. Returns true when keys were held.
    ///
    /// # Errors
    ///
    /// Returns [`KeyStoreError::Store`] when the store is poisoned.
    pub fn remove(&self, topic: &str) -> Result<bool, KeyStoreError> {
        Ok(self.write()?.remove(topic).is_some())
    }

    /// Returns the registration state of a topic.
    ///
    /// # Errors
    ///
    /// Returns [`KeyStoreError::Store`] when the store is poisoned.
    pub fn state(&self, topic: &str) -> Result<TopicState, KeyStoreError> {
        Ok(self.read()?.get(topic).map_or(TopicState::Unregistered, TopicKeys::state))
    }

    /// Returns the key used to encrypt for a topic: public, then private,
    /// then symmetric.
    ///
    /// # Errors
    ///
    /// Returns [`KeyStoreError::Store`] when the store is poisoned.
    pub fn encryption_key(&self, topic: &str) -> Result<Option<TopicKey>, KeyStoreError> {
        let entries = self.read()?;
        Ok(entries.get(topic).and_then(|keys| {
            keys.key(KeyRole::Public)
                .or_else(|| keys.key(KeyRole::Private))
                .or_else(|| keys.key(KeyRole::Symmetric))
        }))
    }

    /// Returns a decrypting key for a topic, preferring `preferred`.
    ///
    /// # Errors
    ///
    /// Returns [`KeyStoreError::Store`] when the store is poisoned.
    pub fn decryption_key(
        &self,
        topic: &str,
        preferred: KeyRole,
    ) -> Result<Option<TopicKey>, KeyStoreError> {
        let fallback = match preferred {
            KeyRole::Symmetric => KeyRole::Private,
            KeyRole::Public | KeyRole::Private => KeyRole::Symmetric,
        };
        let entries = self.read()?;
        Ok(entries.get(topic).and_then(|keys| {
            keys.key(preferred).filter(|key| key.role().can_decrypt()).or_else(|| keys.key(fallback))
        }))
    }

    /// Returns every topic that holds at least one key.
    ///
    /// # Errors
    ///
    /// Returns [`KeyStoreError::Store`] when the store is poisoned.
    pub fn topics(&self) -> Result<Vec<String>, KeyStoreError> {
        Ok(self.read()?.keys().cloned().collect())
    }

    /// Acquires the read lock.
    fn read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, BTreeMap<String, TopicKeys>>, KeyStoreError> {
        self.entries.read().map_err(|_| KeyStoreError::Store("key store lock poisoned".to_string()))
    }

    /// Acquires the write lock.
    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, BTreeMap<String, TopicKeys>>, KeyStoreError> {
        self.entries.write().map_err(|_| KeyStoreError::Store("key store lock poisoned".to_string()))
    }
}
