// crates/secure-broadcast-broker/src/key_file.rs
// ============================================================================
// Module: Key File Loading
// Description: Reads `<topic>.pub` / `<topic>.priv` key files with size limits.
// Purpose: Feed topic registration with key material from a directory.
// Dependencies: secure-broadcast-core
// ============================================================================

//! ## Overview
//! [`KeyFileLoader`] classifies a named key source by its extension and reads
//! its bytes with a hard ceiling. [`KeyDirectory`] applies the loader to a
//! directory and implements [`KeySource`] for the broadcast engine.
//! Invariants:
//! - Only `pub` and `priv` extensions (any case) yield key material.
//! - Content larger than [`MAX_KEY_BYTES`] never reaches the key store.
//! - Missing files and unrecognized kinds mean "no key", not an error.
//!
//! Security posture: topic names are untrusted and may not traverse outside
//! the configured directory.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io::ErrorKind;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;

use secure_broadcast_core::KeyRole;
use secure_broadcast_core::KeySource;
use secure_broadcast_core::KeySourceError;
use secure_broadcast_core::MAX_KEY_BYTES;
use secure_broadcast_core::TopicKey;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum topic name length accepted as a key file stem.
pub const MAX_KEY_NAME_LENGTH: usize = 255;

// ============================================================================
// SECTION: Key File Kind
// ============================================================================

/// Recognized key file kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFileKind {
    /// `.pub` public key file.
    Public,
    /// `.priv` private key file.
    Private,
}

impl KeyFileKind {
    /// Every recognized kind, public first.
    pub const ALL: [Self; 2] = [Self::Public, Self::Private];

    /// Classifies a file extension, ignoring case.
    #[must_use]
    pub fn from_extension(extension: &str) -> Option<Self> {
        if extension.eq_ignore_ascii_case("pub") {
            Some(Self::Public)
        } else if extension.eq_ignore_ascii_case("priv") {
            Some(Self::Private)
        } else {
            None
        }
    }

    /// Returns the canonical lowercase extension.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Public => "pub",
            Self::Private => "priv",
        }
    }

    /// Returns the key role loaded from this kind.
    #[must_use]
    pub const fn role(self) -> KeyRole {
        match self {
            Self::Public => KeyRole::Public,
            Self::Private => KeyRole::Private,
        }
    }
}

// ============================================================================
// SECTION: Key File Loader
// ============================================================================

/// Reads key files from arbitrary readers.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyFileLoader;

impl KeyFileLoader {
    /// Reads key material for a named source.
    ///
    /// Returns `None` when the name's extension is not a recognized key kind
    /// or the content is empty; the reader is left untouched for unknown kinds.
    ///
    /// # Errors
    ///
    /// Returns [`KeySourceError::TooLarge`] when the content exceeds
    /// [`MAX_KEY_BYTES`] and [`KeySourceError::Io`] when reading fails.
    pub fn read_key_data(name: &str, reader: impl Read) -> Result<Option<TopicKey>, KeySourceError> {
        let Some(kind) = Path::new(name)
            .extension()
            .and_then(|extension| extension.to_str())
            .and_then(KeyFileKind::from_extension)
        else {
            return Ok(None);
        };
        let bytes = read_with_limit(name, reader)?;
        if bytes.is_empty() {
            return Ok(None);
        }
        Ok(Some(TopicKey::new(kind.role(), bytes)))
    }
}

/// Reads at most one byte past the ceiling and rejects oversized content.
fn read_with_limit(name: &str, reader: impl Read) -> Result<Vec<u8>, KeySourceError> {
    let limit = u64::try_from(MAX_KEY_BYTES + 1)
        .map_err(|_| KeySourceError::Io("key size limit overflow".to_string()))?;
    let mut bytes = Vec::new();
    reader
        .take(limit)
        .read_to_end(&mut bytes)
        .map_err(|err| KeySourceError::Io(err.to_string()))?;
    if bytes.len() > MAX_KEY_BYTES {
        return Err(KeySourceError::TooLarge {
            source_name: name.to_string(),
            max_bytes: MAX_KEY_BYTES,
            actual_bytes: bytes.len(),
        });
    }
    Ok(bytes)
}

// ============================================================================
// SECTION: Key Directory
// ============================================================================

/// Directory of `<topic>.pub` / `<topic>.priv` key files.
#[derive(Debug, Clone)]
pub struct KeyDirectory {
    /// Directory holding key files.
    root: PathBuf,
}

impl KeyDirectory {
    /// Creates a key source rooted at the provided directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
        }
    }

    /// Returns the key directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the path of a topic's key file of the given kind.
    ///
    /// # Errors
    ///
    /// Returns [`KeySourceError::InvalidName`] when the topic cannot be used
    /// as a file stem.
    pub fn key_path(&self, topic: &str, kind: KeyFileKind) -> Result<PathBuf, KeySourceError> {
        validate_topic_name(topic)?;
        Ok(self.root.join(format!("{topic}.{}", kind.extension())))
    }
}

impl KeySource for KeyDirectory {
    fn load(&self, topic: &str) -> Result<Vec<TopicKey>, KeySourceError> {
        let mut keys = Vec::new();
        for kind in KeyFileKind::ALL {
            let path = self.key_path(topic, kind)?;
            let file = match File::open(&path) {
                Ok(file) => file,
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(KeySourceError::Io(err.to_string())),
            };
            let name = format!("{topic}.{}", kind.extension());
            if let Some(key) = KeyFileLoader::read_key_data(&name, file)? {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}

/// Rejects topic names that could escape the key directory.
fn validate_topic_name(topic: &str) -> Result<(), KeySourceError> {
    if topic.is_empty() || topic.len() > MAX_KEY_NAME_LENGTH {
        return Err(KeySourceError::InvalidName(format!(
            "topic name must be 1 to {MAX_KEY_NAME_LENGTH} bytes"
        )));
    }
    if topic == "." || topic == ".." || topic.contains(['/', '\\', '\0']) {
        return Err(KeySourceError::InvalidName(format!("'{topic}' is not a valid key file stem")));
    }
    Ok(())
}
