// crates/visibility-logic/src/expression.rs
// ============================================================================
// Module: Visibility Expression Parser
// Description: Lexer, recursive-descent parser, and evaluator for visibility
//              expressions.
// Purpose: Reject malformed formulas before any payload is encrypted and
//          evaluate well-formed ones against an authorization set.
// Dependencies: crate::authorizations, serde
// ============================================================================

//! ## Overview
//!
//! A visibility expression gates who may read a broadcast message. Input is
//! untrusted and is validated in full before a message leaves the engine.
//!
//! ### Grammar
//! - **Tokens**: one or more of `A-Z`, `a-z`, `0-9`, `_` (case-sensitive).
//! - **Operators**: `&` (all of), `|` (any of).
//! - **Grouping**: `( ... )`.
//! - Mixing `&` and `|` at the same nesting level is rejected; parentheses
//!   must make the grouping explicit (`S&(USA|CAN)`, not `S&USA|CAN`).
//! - Any other character, including whitespace, is a syntax error.
//!
//! ### Example
//!
//! ```
//! use visibility_logic::Authorizations;
//! use visibility_logic::VisibilityExpression;
//!
//! let expression = VisibilityExpression::parse("S&(USA|CAN)").unwrap();
//! let caller: Authorizations = ["S", "USA"].into_iter().collect();
//! assert!(expression.is_satisfied_by(&caller));
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use crate::authorizations::Authorizations;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum allowed expression size in bytes.
pub const MAX_EXPRESSION_BYTES: usize = 4096;
/// Maximum supported parenthesis nesting depth.
pub const MAX_EXPRESSION_NESTING: usize = 32;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors produced while parsing a visibility expression.
///
/// # Invariants
/// - Positions are byte offsets into the original input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisibilityError {
    /// Input was empty.
    Empty,
    /// Input exceeded [`MAX_EXPRESSION_BYTES`].
    TooLong {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual input length in bytes.
        actual_bytes: usize,
    },
    /// Input exceeded [`MAX_EXPRESSION_NESTING`].
    NestingTooDeep {
        /// Maximum allowed nesting depth.
        max_depth: usize,
        /// Byte offset where the limit was crossed.
        position: usize,
    },
    /// A character outside the accepted charset was found.
    UnexpectedCharacter {
        /// The offending character.
        found: char,
        /// Byte offset in the original input.
        position: usize,
    },
    /// A token appeared where the grammar does not allow it.
    UnexpectedToken {
        /// Human-friendly expectation summary.
        expected: &'static str,
        /// The token that was actually seen.
        found: String,
        /// Byte offset in the original input.
        position: usize,
    },
    /// `&` and `|` were mixed at one nesting level without parentheses.
    MixedOperators {
        /// Byte offset of the conflicting operator.
        position: usize,
    },
    /// Input continued after a complete expression.
    TrailingInput {
        /// Byte offset where unexpected input begins.
        position: usize,
    },
}

impl fmt::Display for VisibilityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "visibility expression is empty"),
            Self::TooLong {
                max_bytes,
                actual_bytes,
            } => write!(
                f,
                "visibility expression exceeds size limit: {actual_bytes} bytes (max {max_bytes})"
            ),
            Self::NestingTooDeep {
                max_depth,
                position,
            } => write!(f, "visibility expression nesting exceeds {max_depth} at {position}"),
            Self::UnexpectedCharacter {
                found,
                position,
            } => write!(f, "invalid character `{found}` at {position}"),
            Self::UnexpectedToken {
                expected,
                found,
                position,
            } => write!(f, "unexpected `{found}` at {position}, expected {expected}"),
            Self::MixedOperators {
                position,
            } => write!(f, "mixed `&` and `|` without parentheses at {position}"),
            Self::TrailingInput {
                position,
            } => write!(f, "unexpected trailing input at {position}"),
        }
    }
}

impl std::error::Error for VisibilityError {}

// ============================================================================
// SECTION: Expression Tree
// ============================================================================

/// Parsed visibility expression node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisibilityNode {
    /// Single access token.
    Token(String),
    /// Satisfied when every child is satisfied.
    All(Vec<Self>),
    /// Satisfied when at least one child is satisfied.
    Any(Vec<Self>),
}

impl VisibilityNode {
    /// Evaluates the node against an authorization set.
    #[must_use]
    pub fn evaluate(&self, authorizations: &Authorizations) -> bool {
        match self {
            Self::Token(token) => authorizations.contains(token),
            Self::All(children) => children.iter().all(|child| child.evaluate(authorizations)),
            Self::Any(children) => children.iter().any(|child| child.evaluate(authorizations)),
        }
    }

    /// Collects every token referenced by the node.
    fn collect_tokens<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            Self::Token(token) => {
                out.insert(token.as_str());
            }
            Self::All(children) | Self::Any(children) => {
                for child in children {
                    child.collect_tokens(out);
                }
            }
        }
    }
}

/// Validated visibility expression paired with its source text.
///
/// # Invariants
/// - `raw` always parses to `root`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VisibilityExpression {
    /// Original expression text.
    raw: String,
    /// Parsed expression tree.
    root: VisibilityNode,
}

impl VisibilityExpression {
    /// Parses and validates a visibility expression.
    ///
    /// # Errors
    ///
    /// Returns [`VisibilityError`] when the input is empty, oversized, contains
    /// characters outside the accepted charset, or is structurally invalid.
    pub fn parse(raw: &str) -> Result<Self, VisibilityError> {
        if raw.len() > MAX_EXPRESSION_BYTES {
            return Err(VisibilityError::TooLong {
                max_bytes: MAX_EXPRESSION_BYTES,
                actual_bytes: raw.len(),
            });
        }
        let tokens = Lexer::new(raw).lex()?;
        let mut parser = Parser::new(tokens);
        let root = parser.parse_expression()?;
        parser.expect_eof()?;
        Ok(Self {
            raw: raw.to_string(),
            root,
        })
    }

    /// Returns the original expression text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns the parsed expression tree.
    #[must_use]
    pub const fn root(&self) -> &VisibilityNode {
        &self.root
    }

    /// Returns the distinct tokens referenced by the expression.
    #[must_use]
    pub fn tokens(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        self.root.collect_tokens(&mut out);
        out
    }

    /// Returns true when the authorization set satisfies the expression.
    #[must_use]
    pub fn is_satisfied_by(&self, authorizations: &Authorizations) -> bool {
        self.root.evaluate(authorizations)
    }
}

impl fmt::Display for VisibilityExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for VisibilityExpression {
    type Err = VisibilityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for VisibilityExpression {
    type Error = VisibilityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<VisibilityExpression> for String {
    fn from(value: VisibilityExpression) -> Self {
        value.raw
    }
}

// ============================================================================
// SECTION: Lexer
// ============================================================================

/// Lexer token produced from the expression input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    /// Access token.
    Ident(&'a str),
    /// `&` operator.
    And,
    /// `|` operator.
    Or,
    /// Left parenthesis.
    LParen,
    /// Right parenthesis.
    RParen,
    /// End-of-input marker.
    Eof,
}

/// Token paired with its byte offset.
#[derive(Debug, Clone, Copy)]
struct SpannedToken<'a> {
    /// Token value.
    token: Token<'a>,
    /// Byte offset into the input.
    position: usize,
}

/// Lexer for visibility expressions.
struct Lexer<'a> {
    /// Source input being tokenized.
    input: &'a str,
    /// Current byte offset into the input.
    offset: usize,
}

impl<'a> Lexer<'a> {
    /// Creates a new lexer for the given input.
    const fn new(input: &'a str) -> Self {
        Self {
            input,
            offset: 0,
        }
    }

    /// Lexes the input into a sequence of tokens.
    fn lex(&mut self) -> Result<Vec<SpannedToken<'a>>, VisibilityError> {
        let mut tokens = Vec::new();
        let bytes = self.input.as_bytes();

        while self.offset < bytes.len() {
            match bytes[self.offset] {
                b'&' => self.push_simple(&mut tokens, Token::And),
                b'|' => self.push_simple(&mut tokens, Token::Or),
                b'(' => self.push_simple(&mut tokens, Token::LParen),
                b')' => self.push_simple(&mut tokens, Token::RParen),
                b'a' ..= b'z' | b'A' ..= b'Z' | b'0' ..= b'9' | b'_' => {
                    let start = self.offset;
                    while let Some(&b) = bytes.get(self.offset) {
                        if b.is_ascii_alphanumeric() || b == b'_' {
                            self.offset += 1;
                        } else {
                            break;
                        }
                    }
                    tokens.push(SpannedToken {
                        token: Token::Ident(&self.input[start .. self.offset]),
                        position: start,
                    });
                }
                _ => {
                    let found = self.input[self.offset ..].chars().next().unwrap_or('\u{fffd}');
                    return Err(VisibilityError::UnexpectedCharacter {
                        found,
                        position: self.offset,
                    });
                }
            }
        }

        if tokens.is_empty() {
            return Err(VisibilityError::Empty);
        }

        tokens.push(SpannedToken {
            token: Token::Eof,
            position: self.offset,
        });
        Ok(tokens)
    }

    /// Pushes a single-byte token and advances.
    fn push_simple(&mut self, tokens: &mut Vec<SpannedToken<'a>>, token: Token<'a>) {
        tokens.push(SpannedToken {
            token,
            position: self.offset,
        });
        self.offset += 1;
    }
}

// ============================================================================
// SECTION: Parser
// ============================================================================

/// Recursive-descent parser for visibility expressions.
struct Parser<'a> {
    /// Token stream with source positions; always ends with `Eof`.
    tokens: Vec<SpannedToken<'a>>,
    /// Current token index.
    index: usize,
    /// Current parenthesis nesting depth.
    nesting: usize,
}

impl<'a> Parser<'a> {
    /// Creates a parser over the token stream.
    const fn new(tokens: Vec<SpannedToken<'a>>) -> Self {
        Self {
            tokens,
            index: 0,
            nesting: 0,
        }
    }

    /// Parses one nesting level: a term optionally joined by a single operator kind.
    fn parse_expression(&mut self) -> Result<VisibilityNode, VisibilityError> {
        let first = self.parse_term()?;
        let operator = self.current().token;
        if !matches!(operator, Token::And | Token::Or) {
            return Ok(first);
        }

        let mut parts = vec![first];
        while self.matches(operator) {
            parts.push(self.parse_term()?);
        }

        let current = *self.current();
        if matches!(current.token, Token::And | Token::Or) {
            return Err(VisibilityError::MixedOperators {
                position: current.position,
            });
        }

        if matches!(operator, Token::And) {
            Ok(VisibilityNode::All(parts))
        } else {
            Ok(VisibilityNode::Any(parts))
        }
    }

    /// Parses a token or a parenthesized expression.
    fn parse_term(&mut self) -> Result<VisibilityNode, VisibilityError> {
        let SpannedToken {
            token,
            position,
        } = *self.current();
        match token {
            Token::Ident(name) => {
                self.advance();
                Ok(VisibilityNode::Token(name.to_string()))
            }
            Token::LParen => {
                self.advance();
                self.with_nesting(position, |parser| {
                    let expr = parser.parse_expression()?;
                    parser.expect(Token::RParen, "`)`")?;
                    Ok(expr)
                })
            }
            Token::And | Token::Or | Token::RParen | Token::Eof => {
                Err(VisibilityError::UnexpectedToken {
                    expected: "authorization token or `(`",
                    found: describe(token),
                    position,
                })
            }
        }
    }

    /// Runs a parser step while enforcing the nesting limit.
    fn with_nesting<T>(
        &mut self,
        position: usize,
        f: impl FnOnce(&mut Self) -> Result<T, VisibilityError>,
    ) -> Result<T, VisibilityError> {
        let next_depth = self.nesting + 1;
        if next_depth > MAX_EXPRESSION_NESTING {
            return Err(VisibilityError::NestingTooDeep {
                max_depth: MAX_EXPRESSION_NESTING,
                position,
            });
        }
        self.nesting = next_depth;
        let result = f(self);
        self.nesting = self.nesting.saturating_sub(1);
        result
    }

    /// Consumes the expected token or returns an error.
    fn expect(&mut self, token: Token<'_>, expected: &'static str) -> Result<(), VisibilityError> {
        if self.matches(token) {
            Ok(())
        } else {
            Err(VisibilityError::UnexpectedToken {
                expected,
                found: describe(self.current().token),
                position: self.current().position,
            })
        }
    }

    /// Ensures the parser is at end-of-input.
    fn expect_eof(&self) -> Result<(), VisibilityError> {
        if matches!(self.current().token, Token::Eof) {
            Ok(())
        } else {
            Err(VisibilityError::TrailingInput {
                position: self.current().position,
            })
        }
    }

    /// Consumes the token if it matches the expected kind.
    fn matches(&mut self, kind: Token<'_>) -> bool {
        if std::mem::discriminant(&self.current().token) == std::mem::discriminant(&kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Returns the current token.
    fn current(&self) -> &SpannedToken<'a> {
        debug_assert!(self.index < self.tokens.len(), "parser index out of bounds");
        &self.tokens[self.index]
    }

    /// Advances to the next token, stopping at `Eof`.
    const fn advance(&mut self) {
        if self.index + 1 < self.tokens.len() {
            self.index += 1;
        }
    }
}

/// Formats a token for diagnostics.
fn describe(token: Token<'_>) -> String {
    match token {
        Token::Ident(name) => name.to_string(),
        Token::And => "&".to_string(),
        Token::Or => "|".to_string(),
        Token::LParen => "(".to_string(),
        Token::RParen => ")".to_string(),
        Token::Eof => "end of input".to_string(),
    }
}
