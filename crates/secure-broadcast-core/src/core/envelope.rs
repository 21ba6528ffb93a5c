// crates/secure-broadcast-core/src/core/envelope.rs
// ============================================================================
// Module: Secure Envelope
// Description: The message unit crossing the transport and its binary frame.
// Purpose: Encode envelopes deterministically and reject malformed frames.
// Dependencies: thiserror, visibility-logic
// ============================================================================

//! ## Overview
//! A [`SecureEnvelope`] carries a visibility expression, a payload, and an
//! `encrypted` flag. On the wire it is a length-prefixed binary frame:
//!
//! | Field | Size |
//! |-------|------|
//! | magic `SBX` | 3 |
//! | version | 1 |
//! | flags (bit 0 = encrypted) | 1 |
//! | visibility length (u16 BE) | 2 |
//! | visibility bytes | n |
//! | payload length (u32 BE) | 4 |
//! | payload bytes | m |
//!
//! Plaintext payloads are written verbatim and contiguously.
//! Invariants:
//! - Decoding re-validates the visibility expression.
//! - Unknown flag bits and trailing bytes are rejected.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;
use visibility_logic::VisibilityExpression;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Frame magic prefix.
pub const ENVELOPE_MAGIC: [u8; 3] = *b"SBX";
/// Current frame version.
pub const ENVELOPE_VERSION: u8 = 1;
/// Maximum payload size in bytes (plaintext or ciphertext).
pub const MAX_PAYLOAD_BYTES: usize = 8 * 1024 * 1024;
/// Flag bit marking an encrypted payload.
const FLAG_ENCRYPTED: u8 = 0b0000_0001;
/// Fixed header size preceding the visibility bytes.
const PREFIX_BYTES: usize = ENVELOPE_MAGIC.len() + 1 + 1 + 2;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Envelope encoding and decoding errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    /// Payload exceeds [`MAX_PAYLOAD_BYTES`].
    #[error("payload exceeds size limit: {actual_bytes} bytes (max {max_bytes})")]
    PayloadTooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual payload size.
        actual_bytes: usize,
    },
    /// Frame is structurally invalid.
    #[error("malformed envelope: {0}")]
    Malformed(String),
}

// ============================================================================
// SECTION: Envelope
// ============================================================================

/// Message unit carried over the transport.
///
/// # Invariants
/// - `encrypted` is true exactly when `payload` is ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecureEnvelope {
    /// Visibility expression gating readers.
    visibility: VisibilityExpression,
    /// Plaintext or ciphertext payload.
    payload: Vec<u8>,
    /// Whether `payload` is ciphertext.
    encrypted: bool,
}

impl SecureEnvelope {
    /// Creates an envelope carrying a plaintext payload.
    #[must_use]
    pub const fn plaintext(visibility: VisibilityExpression, payload: Vec<u8>) -> Self {
        Self {
            visibility,
            payload,
            encrypted: false,
        }
    }

    /// Creates an envelope carrying ciphertext.
    #[must_use]
    pub const fn encrypted(visibility: VisibilityExpression, ciphertext: Vec<u8>) -> Self {
        Self {
            visibility,
            payload: ciphertext,
            encrypted: true,
        }
    }

    /// Returns the visibility expression.
    #[must_use]
    pub const fn visibility(&self) -> &VisibilityExpression {
        &self.visibility
    }

    /// Returns the payload bytes.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Returns true when the payload is ciphertext.
    #[must_use]
    pub const fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    /// Splits the envelope into its visibility and payload.
    #[must_use]
    pub fn into_parts(self) -> (VisibilityExpression, Vec<u8>) {
        (self.visibility, self.payload)
    }

    /// Encodes the envelope into its wire frame.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::PayloadTooLarge`] when the payload exceeds
    /// [`MAX_PAYLOAD_BYTES`].
    pub fn encode(&self) -> Result<Vec<u8>, EnvelopeError> {
        enforce_payload_limit(self.payload.len())?;
        let visibility = self.visibility.as_str().as_bytes();
        let visibility_len = u16::try_from(visibility.len()).map_err(|_| {
            EnvelopeError::Malformed("visibility expression too long for frame".to_string())
        })?;
        let payload_len = u32::try_from(self.payload.len()).map_err(|_| {
            EnvelopeError::PayloadTooLarge {
                max_bytes: MAX_PAYLOAD_BYTES,
                actual_bytes: self.payload.len(),
            }
        })?;

        let mut frame = Vec::with_capacity(PREFIX_BYTES + visibility.len() + 4 + self.payload.len());
        frame.extend_from_slice(&ENVELOPE_MAGIC);
        frame.push(ENVELOPE_VERSION);
        frame.push(if self.encrypted { FLAG_ENCRYPTED } else { 0 });
        frame.extend_from_slice(&visibility_len.to_be_bytes());
        frame.extend_from_slice(visibility);
        frame.extend_from_slice(&payload_len.to_be_bytes());
        frame.extend_from_slice(&self.payload);
        Ok(frame)
    }

    /// Decodes a wire frame.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError`] when the frame is truncated, carries an
    /// unknown version or flag, holds an invalid visibility expression, or
    /// declares an oversized payload.
    pub fn decode(frame: &[u8]) -> Result<Self, EnvelopeError> {
        let mut reader = FrameReader::new(frame);
        if reader.take(ENVELOPE_MAGIC.len())? != ENVELOPE_MAGIC {
            return Err(EnvelopeError::Malformed("bad magic".to_string()));
        }
        let version = reader.byte()?;
        if version != ENVELOPE_VERSION {
            return Err(EnvelopeError::Malformed(format!("unsupported version {version}")));
        }
        let flags = reader.byte()?;
        if flags & !FLAG_ENCRYPTED != 0 {
            return Err(EnvelopeError::Malformed(format!("unknown flags {flags:#04x}")));
        }

        let visibility_len = usize::from(u16::from_be_bytes(reader.array::<2>()?));
        let visibility_bytes = reader.take(visibility_len)?;
        let visibility_text = std::str::from_utf8(visibility_bytes)
            .map_err(|_| EnvelopeError::Malformed("visibility is not utf-8".to_string()))?;
        let visibility = VisibilityExpression::parse(visibility_text)
            .map_err(|err| EnvelopeError::Malformed(format!("visibility: {err}")))?;

        let payload_len = usize::try_from(u32::from_be_bytes(reader.array::<4>()?))
            .map_err(|_| EnvelopeError::Malformed("payload length overflow".to_string()))?;
        enforce_payload_limit(payload_len)?;
        let payload = reader.take(payload_len)?.to_vec();
        if !reader.is_empty() {
            return Err(EnvelopeError::Malformed("trailing bytes after payload".to_string()));
        }

        Ok(Self {
            visibility,
            payload,
            encrypted: flags & FLAG_ENCRYPTED != 0,
        })
    }
}

// ============================================================================
// SECTION: Received Message
// ============================================================================

/// Message returned to a receiving caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecureMessage {
    /// Topic the message was received from.
    pub topic: String,
    /// Visibility expression the message was broadcast with.
    pub visibility: VisibilityExpression,
    /// Plaintext content.
    pub content: Vec<u8>,
    /// Whether the message crossed the transport encrypted.
    pub was_encrypted: bool,
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Rejects payloads larger than [`MAX_PAYLOAD_BYTES`].
const fn enforce_payload_limit(actual_bytes: usize) -> Result<(), EnvelopeError> {
    if actual_bytes > MAX_PAYLOAD_BYTES {
        return Err(EnvelopeError::PayloadTooLarge {
            max_bytes: MAX_PAYLOAD_BYTES,
            actual_bytes,
        });
    }
    Ok(())
}

/// Bounds-checked cursor over a frame.
struct FrameReader<'a> {
    /// Remaining unread bytes.
    rest: &'a [u8],
}

impl<'a> FrameReader<'a> {
    /// Creates a reader over the frame.
    const fn new(frame: &'a [u8]) -> Self {
        Self {
            rest: frame,
        }
    }

    /// Takes `len` bytes or fails on truncation.
    fn take(&mut self, len: usize) -> Result<&'a [u8], EnvelopeError> {
        if self.rest.len() < len {
            return Err(EnvelopeError::Malformed("truncated frame".to_string()));
        }
        let (head, tail) = self.rest.split_at(len);
        self.rest = tail;
        Ok(head)
    }

    /// Takes a single byte.
    fn byte(&mut self) -> Result<u8, EnvelopeError> {
        Ok(self.take(1)?[0])
    }

    /// Takes a fixed-size array.
    fn array<const N: usize>(&mut self) -> Result<[u8; N], EnvelopeError> {
        let mut out = [0_u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Returns true when all bytes were consumed.
    const fn is_empty(&self) -> bool {
        self.rest.is_empty()
    }
}
