// crates/secure-broadcast-config/src/settings.rs
// ============================================================================
// Module: Broadcast Settings
// Description: Typed view over the flat broadcaster configuration map.
// Purpose: Resolve transport, mode, key, and audit settings with fail-closed
//          validation.
// Dependencies: secure-broadcast-core, thiserror
// ============================================================================

//! ## Overview
//! The broadcaster consumes a flat `key -> value` map. [`BroadcastSettings`]
//! resolves that map into typed settings; every key except
//! [`TRANSPORT_KEY`] is optional. Unknown keys are kept verbatim so transport
//! constructors can read backend-specific properties.
//! Security posture: config inputs are untrusted; invalid values are rejected
//! rather than defaulted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;

use secure_broadcast_core::Authorizations;
use secure_broadcast_core::BroadcastMode;
use thiserror::Error;

use crate::properties;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Key naming the transport backend.
pub const TRANSPORT_KEY: &str = "broadcaster.transport";
/// Key selecting production mode (`true` / `false`).
pub const PRODUCTION_KEY: &str = "broadcaster.production";
/// Key naming the directory holding `<topic>.pub` / `<topic>.priv` files.
pub const KEY_DIRECTORY_KEY: &str = "broadcaster.key_directory";
/// Key holding the comma-separated caller authorizations.
pub const AUTHORIZATIONS_KEY: &str = "broadcaster.authorizations";
/// Key selecting the audit log target (`stderr`, `none`, or a file path).
pub const AUDIT_LOG_KEY: &str = "broadcaster.audit_log";
/// Key holding the per-topic queue depth for the channel transport.
pub const CHANNEL_CAPACITY_KEY: &str = "broadcaster.channel.capacity";
/// Default per-topic queue depth for the channel transport.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;
/// Maximum per-topic queue depth for the channel transport.
pub const MAX_CHANNEL_CAPACITY: usize = 65_536;
/// Maximum length of a transport identifier.
pub const MAX_TRANSPORT_NAME_LENGTH: usize = 128;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Audit Target
// ============================================================================

/// Destination for broadcast audit records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AuditLogTarget {
    /// Audit records are discarded.
    #[default]
    None,
    /// Audit records are written to stderr as JSON lines.
    Stderr,
    /// Audit records are appended to a file as JSON lines.
    File(PathBuf),
}

impl AuditLogTarget {
    /// Parses an audit target value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a file path exceeds path limits.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
            return Ok(Self::None);
        }
        if trimmed.eq_ignore_ascii_case("stderr") {
            return Ok(Self::Stderr);
        }
        validate_path_string(AUDIT_LOG_KEY, trimmed)?;
        Ok(Self::File(PathBuf::from(trimmed)))
    }
}

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Resolved broadcaster settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastSettings {
    /// Transport identifier resolved through the transport registry.
    pub transport: String,
    /// Encryption mode, fixed for the engine's lifetime.
    pub mode: BroadcastMode,
    /// Optional key directory consulted when a topic registers without a key.
    pub key_directory: Option<PathBuf>,
    /// Caller authorizations used by `receive`.
    pub authorizations: Authorizations,
    /// Audit record destination.
    pub audit_log: AuditLogTarget,
    /// Per-topic queue depth for the channel transport.
    pub channel_capacity: usize,
    /// Every property from the source map, including unrecognized keys.
    pub properties: BTreeMap<String, String>,
}

impl BroadcastSettings {
    /// Resolves settings from a flat configuration map.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the transport is missing or any
    /// value is malformed.
    pub fn from_map(config: &BTreeMap<String, String>) -> Result<Self, ConfigError> {
        let transport = parse_transport(config.get(TRANSPORT_KEY).map(String::as_str))?;
        let mode = match non_empty(config, PRODUCTION_KEY) {
            None => BroadcastMode::default(),
            Some(flag) => BroadcastMode::from_production_flag(flag).ok_or_else(|| {
                ConfigError::Invalid(format!("{PRODUCTION_KEY} must be true or false"))
            })?,
        };
        let key_directory = match non_empty(config, KEY_DIRECTORY_KEY) {
            None => None,
            Some(dir) => {
                validate_path_string(KEY_DIRECTORY_KEY, dir)?;
                Some(PathBuf::from(dir))
            }
        };
        let authorizations = config
            .get(AUTHORIZATIONS_KEY)
            .map_or_else(Authorizations::new, |list| Authorizations::parse_list(list));
        let audit_log = match config.get(AUDIT_LOG_KEY) {
            None => AuditLogTarget::None,
            Some(value) => AuditLogTarget::parse(value)?,
        };
        let channel_capacity = match non_empty(config, CHANNEL_CAPACITY_KEY) {
            None => DEFAULT_CHANNEL_CAPACITY,
            Some(value) => parse_capacity(value)?,
        };
        Ok(Self {
            transport,
            mode,
            key_directory,
            authorizations,
            audit_log,
            channel_capacity,
            properties: config.clone(),
        })
    }

    /// Loads a TOML property file and resolves it into settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let map = properties::load_properties(path)?;
        Self::from_map(&map)
    }

    /// Returns a raw property value by its flat key.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the trimmed value for a key when present and non-blank.
fn non_empty<'a>(config: &'a BTreeMap<String, String>, key: &str) -> Option<&'a str> {
    config.get(key).map(|value| value.trim()).filter(|value| !value.is_empty())
}

/// Validates the transport identifier.
fn parse_transport(value: Option<&str>) -> Result<String, ConfigError> {
    let Some(name) = value.map(str::trim).filter(|name| !name.is_empty()) else {
        return Err(ConfigError::Invalid(format!("{TRANSPORT_KEY} is required")));
    };
    if name.len() > MAX_TRANSPORT_NAME_LENGTH {
        return Err(ConfigError::Invalid(format!("{TRANSPORT_KEY} exceeds max length")));
    }
    Ok(name.to_string())
}

/// Parses and bounds the channel capacity.
fn parse_capacity(value: &str) -> Result<usize, ConfigError> {
    let capacity = value.parse::<usize>().map_err(|_| {
        ConfigError::Invalid(format!("{CHANNEL_CAPACITY_KEY} must be a positive integer"))
    })?;
    if capacity == 0 || capacity > MAX_CHANNEL_CAPACITY {
        return Err(ConfigError::Invalid(format!(
            "{CHANNEL_CAPACITY_KEY} must be between 1 and {MAX_CHANNEL_CAPACITY}"
        )));
    }
    Ok(capacity)
}

/// Validates a path string against length constraints.
pub(crate) fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}
