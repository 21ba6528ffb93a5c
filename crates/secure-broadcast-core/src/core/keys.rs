// crates/secure-broadcast-core/src/core/keys.rs
// ============================================================================
// Module: Topic Key Material
// Description: Key roles, zeroizing key material, and structural decoding.
// Purpose: Give the key store and codec one shared view of key bytes.
// Dependencies: base64, hex, serde, zeroize
// ============================================================================

//! ## Overview
//! A topic key is a role plus opaque bytes. Asymmetric keys are X25519 keys
//! accepted as raw 32 bytes, 64 hex characters, or base64 text; PEM-style
//! `-----` armor lines are skipped. Symmetric keys are raw bytes of at least
//! [`MIN_SYMMETRIC_KEY_BYTES`].
//!
//! Security posture: material is zeroized on drop and redacted from `Debug`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde::Serialize;
use zeroize::Zeroize;
use zeroize::ZeroizeOnDrop;
use zeroize::Zeroizing;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum accepted key material size in bytes.
pub const MAX_KEY_BYTES: usize = 4096;
/// Size of a decoded X25519 key.
pub const X25519_KEY_BYTES: usize = 32;
/// Minimum accepted symmetric key size in bytes.
pub const MIN_SYMMETRIC_KEY_BYTES: usize = 16;

// ============================================================================
// SECTION: Roles
// ============================================================================

/// Role a key plays for its topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyRole {
    /// X25519 public key; encrypts only.
    Public,
    /// X25519 private key; decrypts and, via its public half, encrypts.
    Private,
    /// Shared secret; encrypts and decrypts.
    Symmetric,
}

impl KeyRole {
    /// Maps an `is_private` flag onto an asymmetric role.
    #[must_use]
    pub const fn from_private_flag(is_private: bool) -> Self {
        if is_private { Self::Private } else { Self::Public }
    }

    /// Returns the stable label for this role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::Symmetric => "symmetric",
        }
    }

    /// Returns true when a key of this role can decrypt.
    #[must_use]
    pub const fn can_decrypt(self) -> bool {
        matches!(self, Self::Private | Self::Symmetric)
    }
}

impl fmt::Display for KeyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Material
// ============================================================================

/// Raw key bytes, zeroized on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial(Vec<u8>);

impl KeyMaterial {
    /// Wraps raw key bytes.
    #[must_use]
    pub const fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when no bytes are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Decodes the material as a 32-byte X25519 key.
    ///
    /// Returns `None` when the bytes match none of the accepted encodings.
    #[must_use]
    pub fn x25519_bytes(&self) -> Option<Zeroizing<[u8; X25519_KEY_BYTES]>> {
        decode_x25519(&self.0)
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeyMaterial(<redacted {} bytes>)", self.0.len())
    }
}

impl From<Vec<u8>> for KeyMaterial {
    fn from(value: Vec<u8>) -> Self {
        Self::new(value)
    }
}

impl From<&[u8]> for KeyMaterial {
    fn from(value: &[u8]) -> Self {
        Self::new(value.to_vec())
    }
}

/// Key bytes paired with the role they play for a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicKey {
    /// Key role.
    role: KeyRole,
    /// Key bytes.
    material: KeyMaterial,
}

impl TopicKey {
    /// Creates a topic key.
    #[must_use]
    pub fn new(role: KeyRole, material: impl Into<KeyMaterial>) -> Self {
        Self {
            role,
            material: material.into(),
        }
    }

    /// Creates a public key.
    #[must_use]
    pub fn public(material: impl Into<KeyMaterial>) -> Self {
        Self::new(KeyRole::Public, material)
    }

    /// Creates a private key.
    #[must_use]
    pub fn private(material: impl Into<KeyMaterial>) -> Self {
        Self::new(KeyRole::Private, material)
    }

    /// Creates a symmetric key.
    #[must_use]
    pub fn symmetric(material: impl Into<KeyMaterial>) -> Self {
        Self::new(KeyRole::Symmetric, material)
    }

    /// Returns the key role.
    #[must_use]
    pub const fn role(&self) -> KeyRole {
        self.role
    }

    /// Returns the key material.
    #[must_use]
    pub const fn material(&self) -> &KeyMaterial {
        &self.material
    }
}

// ============================================================================
// SECTION: Topic State
// ============================================================================

/// Key registration state of a single topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TopicState {
    /// No key material is held for the topic.
    Unregistered,
    /// At least one key is held.
    KeyLoaded {
        /// Public key present.
        public: bool,
        /// Private key present.
        private: bool,
        /// Symmetric key present.
        symmetric: bool,
    },
}

impl TopicState {
    /// Returns true when a payload can be encrypted for the topic.
    #[must_use]
    pub const fn can_encrypt(self) -> bool {
        matches!(self, Self::KeyLoaded { .. })
    }

    /// Returns true when an encrypted payload can be decrypted for the topic.
    #[must_use]
    pub const fn can_decrypt(self) -> bool {
        match self {
            Self::Unregistered => false,
            Self::KeyLoaded {
                private,
                symmetric,
                ..
            } => private || symmetric,
        }
    }
}

// ============================================================================
// SECTION: Decoding
// ============================================================================

/// Decodes X25519 key bytes from raw, hex, or base64 input.
fn decode_x25519(material: &[u8]) -> Option<Zeroizing<[u8; X25519_KEY_BYTES]>> {
    if material.len() == X25519_KEY_BYTES {
        return to_key_array(material);
    }
    let text = std::str::from_utf8(material).ok()?;
    let body: Zeroizing<String> = Zeroizing::new(
        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with("-----"))
            .collect(),
    );
    let is_hex = body.len() == X25519_KEY_BYTES * 2 && body.bytes().all(|b| b.is_ascii_hexdigit());
    let decoded = if is_hex {
        Zeroizing::new(hex::decode(body.as_bytes()).ok()?)
    } else {
        Zeroizing::new(STANDARD.decode(body.as_bytes()).ok()?)
    };
    to_key_array(&decoded)
}

/// Copies exactly [`X25519_KEY_BYTES`] bytes into a zeroizing array.
fn to_key_array(bytes: &[u8]) -> Option<Zeroizing<[u8; X25519_KEY_BYTES]>> {
    if bytes.len() != X25519_KEY_BYTES {
        return None;
    }
    let mut out = Zeroizing::new([0_u8; X25519_KEY_BYTES]);
    out.copy_from_slice(bytes);
    Some(out)
}
