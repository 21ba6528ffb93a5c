// crates/secure-broadcast-web/src/error.rs
// ============================================================================
// Module: Web Errors
// Description: Request failures and their HTTP mapping.
// Purpose: Separate bad requests from deployment faults in responses.
// Dependencies: axum, secure-broadcast-core, serde, thiserror
// ============================================================================

//! ## Overview
//! [`WebError`] renders as a JSON `{"error", "kind"}` body. Client mistakes
//! (missing parts, malformed JSON, invalid visibility, oversized payloads) map
//! to `400`; configuration, key, and transport failures map to `500`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use secure_broadcast_core::BroadcastError;
use serde::Serialize;
use thiserror::Error;

/// Web request errors.
#[derive(Debug, Error)]
pub enum WebError {
    /// Required multipart part was absent.
    #[error("missing form part: {0}")]
    MissingPart(&'static str),
    /// Multipart body could not be read.
    #[error("invalid multipart body: {0}")]
    Multipart(String),
    /// Visibility descriptor was not valid JSON.
    #[error("malformed visibility json: {0}")]
    MalformedVisibilityJson(String),
    /// Broadcast engine failed.
    #[error(transparent)]
    Broadcast(#[from] BroadcastError),
    /// Blocking engine task failed.
    #[error("broadcast task failed: {0}")]
    Task(String),
    /// Listener could not be bound or served.
    #[error("server error: {0}")]
    Server(String),
}

impl WebError {
    /// Returns a stable label for the error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MissingPart(_) => "missing_part",
            Self::Multipart(_) => "multipart",
            Self::MalformedVisibilityJson(_) => "malformed_visibility_json",
            Self::Broadcast(err) => err.kind(),
            Self::Task(_) => "task",
            Self::Server(_) => "server",
        }
    }

    /// Returns the HTTP status for the error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MissingPart(_) | Self::Multipart(_) | Self::MalformedVisibilityJson(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Broadcast(err) if err.is_input_error() => StatusCode::BAD_REQUEST,
            Self::Broadcast(_) | Self::Task(_) | Self::Server(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Human-readable failure.
    pub error: String,
    /// Stable failure label.
    pub kind: &'static str,
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
            kind: self.kind(),
        };
        (self.status(), Json(body)).into_response()
    }
}
