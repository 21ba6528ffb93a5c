// crates/secure-broadcast-broker/src/factory.rs
// ============================================================================
// Module: Broadcaster Factory
// Description: Builds broadcast engines from flat configuration maps.
// Purpose: Resolve transport, mode, keys, and audit wiring at construction.
// Dependencies: secure-broadcast-config, secure-broadcast-core
// ============================================================================

//! ## Overview
//! [`BroadcasterFactory`] turns a configuration map into a ready
//! [`BroadcastEngine`]. Construction either succeeds completely or fails with
//! no engine: configuration problems surface as
//! [`BroadcastError::Configuration`], unresolvable transports as
//! [`BroadcastError::BackendInstantiation`], and invalid preload keys with the
//! same errors topic registration reports.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use secure_broadcast_config::AuditLogTarget;
use secure_broadcast_config::BroadcastSettings;
use secure_broadcast_core::BroadcastAuditSink;
use secure_broadcast_core::BroadcastEngine;
use secure_broadcast_core::BroadcastError;
use secure_broadcast_core::FileAuditSink;
use secure_broadcast_core::NoopAuditSink;
use secure_broadcast_core::StderrAuditSink;

use crate::key_file::KeyDirectory;
use crate::registry::BuiltinTransports;
use crate::registry::TransportRegistry;

// ============================================================================
// SECTION: Factory
// ============================================================================

/// Builds broadcast engines from configuration.
#[derive(Clone)]
pub struct BroadcasterFactory {
    /// Transport constructors resolved by identifier.
    registry: TransportRegistry,
}

impl Default for BroadcasterFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcasterFactory {
    /// Creates a factory with the built-in transports.
    #[must_use]
    pub fn new() -> Self {
        Self::with_registry(TransportRegistry::with_builtin_transports(BuiltinTransports::default()))
    }

    /// Creates a factory resolving transports through the given registry.
    #[must_use]
    pub const fn with_registry(registry: TransportRegistry) -> Self {
        Self {
            registry,
        }
    }

    /// Returns the transport registry.
    #[must_use]
    pub const fn registry(&self) -> &TransportRegistry {
        &self.registry
    }

    /// Creates an engine for a group from a flat configuration map.
    ///
    /// # Errors
    ///
    /// Returns [`BroadcastError::Configuration`] for missing or invalid
    /// settings and [`BroadcastError::BackendInstantiation`] when the transport
    /// cannot be created.
    pub fn create(
        &self,
        config: &BTreeMap<String, String>,
        group: &str,
    ) -> Result<BroadcastEngine, BroadcastError> {
        let settings = BroadcastSettings::from_map(config)
            .map_err(|err| BroadcastError::Configuration(err.to_string()))?;
        self.create_from_settings(&settings, group)
    }

    /// Creates an engine and registers one topic key as part of construction.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`BroadcasterFactory::create`] plus the key
    /// validation errors of topic registration; no engine is returned when the
    /// preload key is rejected.
    pub fn create_with_key(
        &self,
        config: &BTreeMap<String, String>,
        group: &str,
        key_material: &[u8],
        topic: &str,
        is_private: bool,
    ) -> Result<BroadcastEngine, BroadcastError> {
        let engine = self.create(config, group)?;
        if let Err(err) = engine.register_topic_with_key(topic, key_material, is_private) {
            // Registration failure is reported; transport release is best effort.
            let _ = engine.close();
            return Err(err);
        }
        Ok(engine)
    }

    /// Creates an engine from already resolved settings.
    ///
    /// # Errors
    ///
    /// Returns [`BroadcastError::Configuration`] when the audit log cannot be
    /// opened and [`BroadcastError::BackendInstantiation`] when the transport
    /// cannot be created.
    pub fn create_from_settings(
        &self,
        settings: &BroadcastSettings,
        group: &str,
    ) -> Result<BroadcastEngine, BroadcastError> {
        let audit = audit_sink(&settings.audit_log)?;
        let transport = self.registry.instantiate(settings)?;
        let mut builder = BroadcastEngine::builder(group, transport)
            .mode(settings.mode)
            .authorizations(settings.authorizations.clone())
            .audit_sink(audit);
        if let Some(dir) = &settings.key_directory {
            builder = builder.key_source(Arc::new(KeyDirectory::new(dir)));
        }
        Ok(builder.build())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Opens the configured audit sink.
fn audit_sink(target: &AuditLogTarget) -> Result<Arc<dyn BroadcastAuditSink>, BroadcastError> {
    match target {
        AuditLogTarget::None => Ok(Arc::new(NoopAuditSink)),
        AuditLogTarget::Stderr => Ok(Arc::new(StderrAuditSink)),
        AuditLogTarget::File(path) => FileAuditSink::new(path)
            .map(|sink| Arc::new(sink) as Arc<dyn BroadcastAuditSink>)
            .map_err(|err| BroadcastError::Configuration(format!("cannot open audit log: {err}"))),
    }
}
