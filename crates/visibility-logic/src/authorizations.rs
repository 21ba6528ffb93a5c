// crates/visibility-logic/src/authorizations.rs
// ============================================================================
// Module: Authorization Sets
// Description: The set of access tokens held by a receiving caller.
// Purpose: Provide a deterministic, serializable token set for evaluation.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! [`Authorizations`] is an ordered set of access tokens. Empty entries from
//! comma-separated input are dropped and surrounding whitespace is trimmed.

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

/// Access tokens held by a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Authorizations(BTreeSet<String>);

impl Authorizations {
    /// Creates an empty authorization set.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Parses a comma-separated token list such as `"S,USA, CAN"`.
    #[must_use]
    pub fn parse_list(list: &str) -> Self {
        list.split(',').map(str::trim).filter(|token| !token.is_empty()).collect()
    }

    /// Adds a token to the set.
    pub fn insert(&mut self, token: impl Into<String>) {
        self.0.insert(token.into());
    }

    /// Returns true when the token is held.
    #[must_use]
    pub fn contains(&self, token: &str) -> bool {
        self.0.contains(token)
    }

    /// Returns the number of held tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when no tokens are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over held tokens in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for Authorizations {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}
