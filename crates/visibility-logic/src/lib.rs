// crates/visibility-logic/src/lib.rs
// ============================================================================
// Module: Visibility Logic Root
// Description: Public API surface for visibility expressions and authorizers.
// Purpose: Wire together the expression grammar, authorization sets, and the
//          pluggable authorizer policy.
// Dependencies: crate::{authorizations, authorizer, expression}
// ============================================================================

//! ## Overview
//! Visibility expressions are boolean formulas over access tokens (`&` for AND,
//! `|` for OR, parentheses for grouping) attached to every broadcast message.
//! This crate parses and validates those formulas, models the caller's
//! authorization set, and exposes the [`Authorizer`] policy seam used by the
//! broadcast engine at receive time.
//! Invariants:
//! - A [`VisibilityExpression`] value always holds a syntactically valid formula.
//! - Evaluation never fails; an unsatisfied formula is a plain `false`.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod authorizations;
pub mod authorizer;
pub mod expression;


// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use authorizations::Authorizations;
pub use authorizer::Authorizer;
pub use authorizer::ExpressionAuthorizer;
pub use expression::MAX_EXPRESSION_BYTES;
pub use expression::MAX_EXPRESSION_NESTING;
pub use expression::VisibilityError;
pub use expression::VisibilityExpression;
pub use expression::VisibilityNode;
