// crates/secure-broadcast-web/src/visibility.rs
// ============================================================================
// Module: Visibility Form Decoding
// Description: Decodes the multipart `visibility` part into an expression.
// Purpose: Accept raw or URL-encoded `{"formalVisibility": "..."}` JSON.
// Dependencies: serde, serde_json, url
// ============================================================================

//! ## Overview
//! Clients send the visibility descriptor as JSON, sometimes URL-encoded.
//! Raw JSON is tried first; otherwise the text is URL-decoded once and parsed
//! again. Only the `formalVisibility` field is consumed; other descriptor
//! fields are ignored. Expression syntax is checked later by the engine.

use serde::Deserialize;
use url::form_urlencoded;

use crate::error::WebError;

/// Visibility descriptor carried in the `visibility` form part.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityDescriptor {
    /// Boolean visibility formula.
    pub formal_visibility: Option<String>,
}

/// Extracts the visibility formula from a descriptor part.
///
/// # Errors
///
/// Returns [`WebError::MalformedVisibilityJson`] when neither the raw nor the
/// URL-decoded text is a descriptor with a `formalVisibility` string.
pub fn decode_visibility(raw: &str) -> Result<String, WebError> {
    let trimmed = raw.trim();
    let descriptor = match serde_json::from_str::<VisibilityDescriptor>(trimmed) {
        Ok(descriptor) => descriptor,
        Err(json_err) => {
            let decoded = url_decode(trimmed).ok_or_else(|| {
                WebError::MalformedVisibilityJson(json_err.to_string())
            })?;
            serde_json::from_str(decoded.trim())
                .map_err(|err| WebError::MalformedVisibilityJson(err.to_string()))?
        }
    };
    descriptor.formal_visibility.ok_or_else(|| {
        WebError::MalformedVisibilityJson("missing formalVisibility".to_string())
    })
}

/// Decodes a single URL-encoded value, or `None` when it is not one.
fn url_decode(text: &str) -> Option<String> {
    let mut pairs = form_urlencoded::parse(text.as_bytes());
    let (key, value) = pairs.next()?;
    if pairs.next().is_some() || !value.is_empty() || text.contains('=') {
        return None;
    }
    Some(key.into_owned())
}
