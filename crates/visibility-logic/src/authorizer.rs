// crates/visibility-logic/src/authorizer.rs
// ============================================================================
// Module: Authorizer Policy
// Description: Pluggable receive-time visibility policy.
// Purpose: Decide whether a caller may read a message with a given visibility.
// Dependencies: crate::{authorizations, expression}
// ============================================================================

//! ## Overview
//! The broadcast engine consults an [`Authorizer`] for every decrypted message
//! before handing it to the caller. [`ExpressionAuthorizer`] is the default
//! policy; any `Fn(&VisibilityExpression, &Authorizations) -> bool` closure
//! can be used as a custom policy.
//! Security posture: an authorizer must fail closed; `false` filters the message.

use crate::authorizations::Authorizations;
use crate::expression::VisibilityExpression;

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Receive-time visibility policy.
pub trait Authorizer: Send + Sync {
    /// Returns true when `authorizations` may read a message tagged with `visibility`.
    fn permits(&self, visibility: &VisibilityExpression, authorizations: &Authorizations) -> bool;
}

impl<F> Authorizer for F
where
    F: Fn(&VisibilityExpression, &Authorizations) -> bool + Send + Sync,
{
    fn permits(&self, visibility: &VisibilityExpression, authorizations: &Authorizations) -> bool {
        self(visibility, authorizations)
    }
}

// ============================================================================
// SECTION: Default Policy
// ============================================================================

/// Evaluates the visibility formula directly against the caller's tokens.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpressionAuthorizer;

impl Authorizer for ExpressionAuthorizer {
    fn permits(&self, visibility: &VisibilityExpression, authorizations: &Authorizations) -> bool {
        visibility.is_satisfied_by(authorizations)
    }
}
