// crates/secure-broadcast-core/src/core/mode.rs
// ============================================================================
// Module: Broadcast Mode
// Description: Production and non-production engine modes.
// Purpose: Model the encryption switch fixed at engine construction.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Production engines encrypt every payload before it reaches the transport.
//! Non-production engines send plaintext frames, which keeps local development
//! and tests free of key provisioning.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Engine encryption mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BroadcastMode {
    /// Payloads are encrypted with the topic key.
    Production,
    /// Payloads travel as plaintext.
    #[default]
    NonProduction,
}

impl BroadcastMode {
    /// Parses a production flag (`"true"` / `"false"`, ASCII case-insensitive).
    ///
    /// Returns `None` for any other value.
    #[must_use]
    pub fn from_production_flag(flag: &str) -> Option<Self> {
        let flag = flag.trim();
        if flag.eq_ignore_ascii_case("true") {
            Some(Self::Production)
        } else if flag.eq_ignore_ascii_case("false") {
            Some(Self::NonProduction)
        } else {
            None
        }
    }

    /// Returns true for [`BroadcastMode::Production`].
    #[must_use]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }

    /// Returns the stable label for this mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::NonProduction => "non_production",
        }
    }
}

impl fmt::Display for BroadcastMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
