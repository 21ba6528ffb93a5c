// crates/secure-broadcast-config/src/lib.rs
// ============================================================================
// Module: Secure Broadcast Config Library
// Description: Public API surface for broadcaster configuration.
// Purpose: Expose the settings model and the property file loader.
// Dependencies: crate::{properties, settings}
// ============================================================================

//! ## Overview
//! Configuration for the broadcaster is a flat string map. This crate resolves
//! that map into [`BroadcastSettings`] and loads it from a TOML property file
//! when the caller does not supply one directly.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod properties;
pub mod settings;


// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use properties::CONFIG_ENV_VAR;
pub use properties::DEFAULT_CONFIG_NAME;
pub use properties::MAX_CONFIG_FILE_SIZE;
pub use properties::load_properties;
pub use properties::parse_properties;
pub use settings::AUDIT_LOG_KEY;
pub use settings::AUTHORIZATIONS_KEY;
pub use settings::AuditLogTarget;
pub use settings::BroadcastSettings;
pub use settings::CHANNEL_CAPACITY_KEY;
pub use settings::ConfigError;
pub use settings::DEFAULT_CHANNEL_CAPACITY;
pub use settings::KEY_DIRECTORY_KEY;
pub use settings::MAX_CHANNEL_CAPACITY;
pub use settings::MAX_TRANSPORT_NAME_LENGTH;
pub use settings::PRODUCTION_KEY;
pub use settings::TRANSPORT_KEY;
