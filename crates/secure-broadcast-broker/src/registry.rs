// crates/secure-broadcast-broker/src/registry.rs
// ============================================================================
// Module: Transport Registry
// Description: Named transport constructors resolved from configuration.
// Purpose: Map a configured transport identifier onto a concrete backend.
// Dependencies: secure-broadcast-config, secure-broadcast-core, thiserror
// ============================================================================

//! ## Overview
//! [`TransportRegistry`] is a static table of named constructors. The factory
//! resolves `broadcaster.transport` through it; an unknown identifier or a
//! failing constructor becomes [`BroadcastError::BackendInstantiation`].
//! Invariants:
//! - Transport identifiers are unique within the registry.
//! - Constructors receive the fully resolved settings.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use secure_broadcast_config::BroadcastSettings;
use secure_broadcast_core::BroadcastError;
use secure_broadcast_core::Transport;
use secure_broadcast_core::TransportError;
use thiserror::Error;

use crate::transport::ChannelTransport;
use crate::transport::InMemoryTransport;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Identifier of the built-in in-memory transport.
pub const MEMORY_TRANSPORT: &str = "memory";
/// Identifier of the built-in channel transport.
pub const CHANNEL_TRANSPORT: &str = "channel";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Transport registry errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Identifier already has a constructor.
    #[error("transport already registered: {0}")]
    AlreadyRegistered(String),
    /// Identifier has no constructor.
    #[error("transport not registered: {0}")]
    NotRegistered(String),
    /// Constructor failed.
    #[error("transport {backend} failed to start: {source}")]
    Construction {
        /// Transport identifier.
        backend: String,
        /// Constructor failure.
        source: TransportError,
    },
}

impl From<RegistryError> for BroadcastError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::AlreadyRegistered(_) => Self::Configuration(err.to_string()),
            RegistryError::NotRegistered(backend) => Self::BackendInstantiation {
                backend,
                reason: "transport not registered".to_string(),
            },
            RegistryError::Construction {
                backend,
                source,
            } => Self::BackendInstantiation {
                backend,
                reason: source.to_string(),
            },
        }
    }
}

// ============================================================================
// SECTION: Builtins
// ============================================================================

/// State shared by the built-in transports.
#[derive(Debug, Default)]
pub struct BuiltinTransports {
    /// Storage root handed out to every `memory` transport.
    pub memory: InMemoryTransport,
}

impl BuiltinTransports {
    /// Creates builtins whose `memory` transports share the given storage.
    #[must_use]
    pub const fn with_memory(memory: InMemoryTransport) -> Self {
        Self {
            memory,
        }
    }
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Result of a transport constructor.
pub type TransportResult = Result<Box<dyn Transport>, TransportError>;

/// Constructor producing a transport from resolved settings.
pub type TransportConstructor = Arc<dyn Fn(&BroadcastSettings) -> TransportResult + Send + Sync>;

/// Named transport constructors.
#[derive(Clone, Default)]
pub struct TransportRegistry {
    /// Constructors keyed by transport identifier.
    constructors: BTreeMap<String, TransportConstructor>,
}

impl TransportRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the `memory` and `channel` transports.
    #[must_use]
    pub fn with_builtin_transports(builtins: BuiltinTransports) -> Self {
        let memory = builtins.memory;
        let mut constructors: BTreeMap<String, TransportConstructor> = BTreeMap::new();
        constructors.insert(
            MEMORY_TRANSPORT.to_string(),
            Arc::new(move |_: &BroadcastSettings| -> TransportResult {
                Ok(Box::new(memory.handle()))
            }),
        );
        constructors.insert(
            CHANNEL_TRANSPORT.to_string(),
            Arc::new(|settings: &BroadcastSettings| -> TransportResult {
                let capacity = NonZeroUsize::new(settings.channel_capacity).ok_or_else(|| {
                    TransportError::Backend("channel capacity must be positive".to_string())
                })?;
                Ok(Box::new(ChannelTransport::new(capacity)))
            }),
        );
        Self {
            constructors,
        }
    }

    /// Registers a constructor under the given identifier.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AlreadyRegistered`] when the identifier is taken.
    pub fn register<F>(&mut self, name: impl Into<String>, constructor: F) -> Result<(), RegistryError>
    where
        F: Fn(&BroadcastSettings) -> TransportResult + Send + Sync + 'static,
    {
        let name = name.into();
        if self.constructors.contains_key(&name) {
            return Err(RegistryError::AlreadyRegistered(name));
        }
        self.constructors.insert(name, Arc::new(constructor));
        Ok(())
    }

    /// Returns true when a constructor exists for the identifier.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Returns registered identifiers in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    /// Instantiates the transport named by the settings.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotRegistered`] for unknown identifiers and
    /// [`RegistryError::Construction`] when the constructor fails.
    pub fn instantiate(&self, settings: &BroadcastSettings) -> Result<Box<dyn Transport>, RegistryError> {
        let name = settings.transport.as_str();
        let Some(constructor) = self.constructors.get(name) else {
            return Err(RegistryError::NotRegistered(name.to_string()));
        };
        constructor(settings).map_err(|source| RegistryError::Construction {
            backend: name.to_string(),
            source,
        })
    }
}
