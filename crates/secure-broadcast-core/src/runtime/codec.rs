// crates/secure-broadcast-core/src/runtime/codec.rs
// ============================================================================
// Module: Secure Envelope Codec
// Description: Payload encryption and decryption with topic key material.
// Purpose: Provide the confidentiality transform applied in production mode.
// Dependencies: chacha20poly1305, hkdf, rand, sha2, x25519-dalek, zeroize
// ============================================================================

//! ## Overview
//! The codec is a pure transform: it knows nothing about topics or visibility.
//!
//! - **Sealed** (public/private keys): a fresh ephemeral X25519 key agrees a
//!   secret with the recipient public key; HKDF-SHA256 derives an
//!   XChaCha20-Poly1305 key. Only the matching private key can open it.
//! - **Symmetric**: HKDF-SHA256 over the shared key and a random salt derives a
//!   per-message XChaCha20-Poly1305 key.
//!
//! Ciphertext layout: `version | scheme | scheme fields | nonce(24) | ct+tag`.
//! Everything before the AEAD output is bound as associated data.
//!
//! Security posture: derived keys and decoded secrets are zeroized; every
//! failure to authenticate is reported as [`CodecError::Decryption`] with no
//! further detail.

// ============================================================================
// SECTION: Imports
// ============================================================================

use chacha20poly1305::KeyInit;
use chacha20poly1305::XChaCha20Poly1305;
use chacha20poly1305::XNonce;
use chacha20poly1305::aead::Aead;
use chacha20poly1305::aead::Payload;
use hkdf::Hkdf;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;
use thiserror::Error;
use x25519_dalek::EphemeralSecret;
use x25519_dalek::PublicKey;
use x25519_dalek::StaticSecret;
use zeroize::Zeroizing;

use crate::core::keys::KeyRole;
use crate::core::keys::TopicKey;
use crate::core::keys::X25519_KEY_BYTES;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Current ciphertext format version.
pub const CIPHERTEXT_VERSION: u8 = 1;
/// Scheme tag for sealed-box ciphertext.
const SCHEME_SEALED: u8 = 1;
/// Scheme tag for symmetric ciphertext.
const SCHEME_SYMMETRIC: u8 = 2;
/// XChaCha20 nonce size.
const NONCE_BYTES: usize = 24;
/// Symmetric HKDF salt size.
const SALT_BYTES: usize = 16;
/// Poly1305 tag size.
const TAG_BYTES: usize = 16;
/// Derived AEAD key size.
const AEAD_KEY_BYTES: usize = 32;
/// HKDF info label for sealed ciphertext.
const SEALED_INFO: &[u8] = b"secure-broadcast/sealed/v1";
/// HKDF info label for symmetric ciphertext.
const SYMMETRIC_INFO: &[u8] = b"secure-broadcast/symmetric/v1";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Codec errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Key material does not decode for its role.
    #[error("invalid key material: {0}")]
    InvalidKey(String),
    /// Key role cannot decrypt.
    #[error("{0} keys cannot decrypt")]
    KeyCannotDecrypt(KeyRole),
    /// Ciphertext was produced for a different key role.
    #[error("ciphertext requires a {expected} key")]
    KeyMismatch {
        /// Role able to open the ciphertext.
        expected: KeyRole,
    },
    /// Ciphertext is structurally invalid.
    #[error("malformed ciphertext: {0}")]
    Malformed(String),
    /// Key derivation failed.
    #[error("key derivation failed")]
    KeyDerivation,
    /// Encryption failed.
    #[error("encryption failed: {0}")]
    Encryption(String),
    /// Ciphertext did not authenticate under the key.
    #[error("ciphertext authentication failed")]
    Decryption,
}

// ============================================================================
// SECTION: Schemes
// ============================================================================

/// Ciphertext scheme recorded in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherScheme {
    /// Ephemeral X25519 sealed box.
    Sealed,
    /// Shared symmetric key.
    Symmetric,
}

impl CipherScheme {
    /// Returns the key role able to open this scheme.
    #[must_use]
    pub const fn decrypting_role(self) -> KeyRole {
        match self {
            Self::Sealed => KeyRole::Private,
            Self::Symmetric => KeyRole::Symmetric,
        }
    }

    /// Returns the scheme used when encrypting with a key of `role`.
    #[must_use]
    pub const fn for_role(role: KeyRole) -> Self {
        match role {
            KeyRole::Public | KeyRole::Private => Self::Sealed,
            KeyRole::Symmetric => Self::Symmetric,
        }
    }

    /// Returns the bytes added to a payload by this scheme.
    #[must_use]
    pub const fn overhead(self) -> usize {
        self.header_len() + TAG_BYTES
    }

    /// Returns the header tag for this scheme.
    const fn tag(self) -> u8 {
        match self {
            Self::Sealed => SCHEME_SEALED,
            Self::Symmetric => SCHEME_SYMMETRIC,
        }
    }

    /// Returns the header size including version and scheme bytes.
    const fn header_len(self) -> usize {
        match self {
            Self::Sealed => 2 + X25519_KEY_BYTES + NONCE_BYTES,
            Self::Symmetric => 2 + SALT_BYTES + NONCE_BYTES,
        }
    }
}

// ============================================================================
// SECTION: Codec
// ============================================================================

/// Payload encryption codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecureEnvelopeCodec;

impl SecureEnvelopeCodec {
    /// Encrypts a payload for the given key.
    ///
    /// Public keys seal directly; private keys seal to their derived public
    /// half; symmetric keys use a per-message derived key.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] when the key does not decode or encryption fails.
    pub fn encrypt(payload: &[u8], key: &TopicKey) -> Result<Vec<u8>, CodecError> {
        match key.role() {
            KeyRole::Public => {
                let bytes = x25519_key(key)?;
                seal(payload, &PublicKey::from(*bytes))
            }
            KeyRole::Private => {
                let secret = StaticSecret::from(*x25519_key(key)?);
                seal(payload, &PublicKey::from(&secret))
            }
            KeyRole::Symmetric => encrypt_symmetric(payload, key.material().as_bytes()),
        }
    }

    /// Decrypts ciphertext produced by [`SecureEnvelopeCodec::encrypt`].
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] when the key cannot decrypt, the ciphertext is
    /// malformed, or authentication fails.
    pub fn decrypt(ciphertext: &[u8], key: &TopicKey) -> Result<Vec<u8>, CodecError> {
        if !key.role().can_decrypt() {
            return Err(CodecError::KeyCannotDecrypt(key.role()));
        }
        let scheme = Self::scheme(ciphertext)?;
        let expected = scheme.decrypting_role();
        if key.role() != expected {
            return Err(CodecError::KeyMismatch {
                expected,
            });
        }
        let header_len = scheme.header_len();
        if ciphertext.len() < header_len + TAG_BYTES {
            return Err(CodecError::Malformed("ciphertext truncated".to_string()));
        }
        let (header, body) = ciphertext.split_at(header_len);
        let fields = &header[2 ..];
        match scheme {
            CipherScheme::Sealed => {
                let (ephemeral, nonce) = fields.split_at(X25519_KEY_BYTES);
                open_sealed(header, ephemeral, nonce, body, key)
            }
            CipherScheme::Symmetric => {
                let (salt, nonce) = fields.split_at(SALT_BYTES);
                let aead_key = derive_key(salt, key.material().as_bytes(), SYMMETRIC_INFO)?;
                aead_open(&aead_key[..], nonce, body, header)
            }
        }
    }

    /// Reads the scheme from a ciphertext header.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Malformed`] for unknown versions or schemes.
    pub fn scheme(ciphertext: &[u8]) -> Result<CipherScheme, CodecError> {
        let [version, tag, ..] = ciphertext else {
            return Err(CodecError::Malformed("ciphertext truncated".to_string()));
        };
        if *version != CIPHERTEXT_VERSION {
            return Err(CodecError::Malformed(format!("unsupported version {version}")));
        }
        match *tag {
            SCHEME_SEALED => Ok(CipherScheme::Sealed),
            SCHEME_SYMMETRIC => Ok(CipherScheme::Symmetric),
            other => Err(CodecError::Malformed(format!("unknown scheme {other}"))),
        }
    }
}

// ============================================================================
// SECTION: Sealed Scheme
// ============================================================================

/// Seals a payload to a recipient public key.
fn seal(payload: &[u8], recipient: &PublicKey) -> Result<Vec<u8>, CodecError> {
    let ephemeral = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_public = PublicKey::from(&ephemeral);
    let shared = ephemeral.diffie_hellman(recipient);
    if !shared.was_contributory() {
        return Err(CodecError::InvalidKey("public key is a low-order point".to_string()));
    }
    let salt = sealed_salt(ephemeral_public.as_bytes(), recipient.as_bytes());
    let aead_key = derive_key(&salt, shared.as_bytes(), SEALED_INFO)?;

    let mut nonce = [0_u8; NONCE_BYTES];
    OsRng.fill_bytes(&mut nonce);

    let scheme = CipherScheme::Sealed;
    let mut out = Vec::with_capacity(scheme.header_len() + payload.len() + TAG_BYTES);
    out.push(CIPHERTEXT_VERSION);
    out.push(scheme.tag());
    out.extend_from_slice(ephemeral_public.as_bytes());
    out.extend_from_slice(&nonce);
    let sealed = aead_seal(&aead_key[..], &nonce, payload, &out)?;
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Opens a sealed payload with the recipient private key.
fn open_sealed(
    header: &[u8],
    ephemeral: &[u8],
    nonce: &[u8],
    body: &[u8],
    key: &TopicKey,
) -> Result<Vec<u8>, CodecError> {
    let secret = StaticSecret::from(*x25519_key(key)?);
    let recipient = PublicKey::from(&secret);
    let ephemeral: [u8; X25519_KEY_BYTES] = ephemeral
        .try_into()
        .map_err(|_| CodecError::Malformed("ephemeral key truncated".to_string()))?;
    let ephemeral = PublicKey::from(ephemeral);
    let shared = secret.diffie_hellman(&ephemeral);
    if !shared.was_contributory() {
        return Err(CodecError::Decryption);
    }
    let salt = sealed_salt(ephemeral.as_bytes(), recipient.as_bytes());
    let aead_key = derive_key(&salt, shared.as_bytes(), SEALED_INFO)?;
    aead_open(&aead_key[..], nonce, body, header)
}

/// Binds both public keys into the HKDF salt.
fn sealed_salt(
    ephemeral: &[u8; X25519_KEY_BYTES],
    recipient: &[u8; X25519_KEY_BYTES],
) -> [u8; X25519_KEY_BYTES * 2] {
    let mut salt = [0_u8; X25519_KEY_BYTES * 2];
    salt[.. X25519_KEY_BYTES].copy_from_slice(ephemeral);
    salt[X25519_KEY_BYTES ..].copy_from_slice(recipient);
    salt
}

// ============================================================================
// SECTION: Symmetric Scheme
// ============================================================================

/// Encrypts a payload with a shared key.
fn encrypt_symmetric(payload: &[u8], shared_key: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut salt = [0_u8; SALT_BYTES];
    OsRng.fill_bytes(&mut salt);
    let mut nonce = [0_u8; NONCE_BYTES];
    OsRng.fill_bytes(&mut nonce);
    let aead_key = derive_key(&salt, shared_key, SYMMETRIC_INFO)?;

    let scheme = CipherScheme::Symmetric;
    let mut out = Vec::with_capacity(scheme.header_len() + payload.len() + TAG_BYTES);
    out.push(CIPHERTEXT_VERSION);
    out.push(scheme.tag());
    out.extend_from_slice(&salt);
    out.extend_from_slice(&nonce);
    let sealed = aead_seal(&aead_key[..], &nonce, payload, &out)?;
    out.extend_from_slice(&sealed);
    Ok(out)
}

// ============================================================================
// SECTION: Primitives
// ============================================================================

/// Decodes an asymmetric key into X25519 bytes.
fn x25519_key(key: &TopicKey) -> Result<Zeroizing<[u8; X25519_KEY_BYTES]>, CodecError> {
    key.material()
        .x25519_bytes()
        .ok_or_else(|| CodecError::InvalidKey(format!("{} key is not a 32-byte X25519 key", key.role())))
}

/// Derives an AEAD key with HKDF-SHA256.
fn derive_key(
    salt: &[u8],
    ikm: &[u8],
    info: &[u8],
) -> Result<Zeroizing<[u8; AEAD_KEY_BYTES]>, CodecError> {
    let hkdf = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut okm = Zeroizing::new([0_u8; AEAD_KEY_BYTES]);
    hkdf.expand(info, &mut okm[..]).map_err(|_| CodecError::KeyDerivation)?;
    Ok(okm)
}

/// Encrypts with XChaCha20-Poly1305.
fn aead_seal(key: &[u8], nonce: &[u8], msg: &[u8], aad: &[u8]) -> Result<Vec<u8>, CodecError> {
    let cipher = XChaCha20Poly1305::new_from_slice(key)
        .map_err(|_| CodecError::Encryption("invalid cipher key length".to_string()))?;
    cipher
        .encrypt(XNonce::from_slice(nonce), Payload {
            msg,
            aad,
        })
        .map_err(|_| CodecError::Encryption("aead seal failed".to_string()))
}

/// Decrypts with XChaCha20-Poly1305.
fn aead_open(key: &[u8], nonce: &[u8], body: &[u8], aad: &[u8]) -> Result<Vec<u8>, CodecError> {
    let cipher = XChaCha20Poly1305::new_from_slice(key).map_err(|_| CodecError::Decryption)?;
    cipher
        .decrypt(XNonce::from_slice(nonce), Payload {
            msg: body,
            aad,
        })
        .map_err(|_| CodecError::Decryption)
}
