// crates/secure-broadcast-web/src/server.rs
// ============================================================================
// Module: Broadcast HTTP Server
// Description: `POST /topics/{topic}` multipart endpoint over axum.
// Purpose: Broadcast one payload per request through a short-lived engine.
// Dependencies: axum, secure-broadcast-broker, secure-broadcast-config, tokio
// ============================================================================

//! ## Overview
//! Each request builds an engine from the shared settings, registers the
//! topic, broadcasts, and closes the engine. Engine calls are synchronous and
//! run on the blocking pool.
//! Security posture: request bodies are untrusted; the body limit and the
//! engine's visibility check apply before anything is sent.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::extract::Multipart;
use axum::extract::Path;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::post;
use secure_broadcast_broker::BroadcasterFactory;
use secure_broadcast_config::BroadcastSettings;
use secure_broadcast_core::MAX_PAYLOAD_BYTES;
use serde::Serialize;

use crate::error::WebError;
use crate::visibility::decode_visibility;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Group used for engines created by the web endpoint.
pub const DEFAULT_GROUP: &str = "web";
/// Property naming the listen address.
pub const BIND_KEY: &str = "broadcaster.web.bind";
/// Listen address used when [`BIND_KEY`] is absent.
pub const DEFAULT_BIND: &str = "127.0.0.1:8080";
/// Maximum request body size.
pub const MAX_REQUEST_BYTES: usize = MAX_PAYLOAD_BYTES + 64 * 1024;
/// Multipart part holding the visibility descriptor.
const VISIBILITY_PART: &str = "visibility";
/// Multipart part holding the payload bytes.
const PAYLOAD_PART: &str = "payload";

// ============================================================================
// SECTION: State
// ============================================================================

/// Shared state for request handlers.
#[derive(Clone)]
pub struct WebState {
    /// Engine factory.
    factory: BroadcasterFactory,
    /// Settings every request engine is built from.
    settings: Arc<BroadcastSettings>,
    /// Group name for request engines.
    group: Arc<str>,
}

impl WebState {
    /// Creates handler state.
    #[must_use]
    pub fn new(factory: BroadcasterFactory, settings: BroadcastSettings, group: &str) -> Self {
        Self {
            factory,
            settings: Arc::new(settings),
            group: Arc::from(group),
        }
    }

    /// Returns the settings request engines are built from.
    #[must_use]
    pub fn settings(&self) -> &BroadcastSettings {
        &self.settings
    }
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Builds the HTTP router.
pub fn router(state: WebState) -> Router {
    Router::new()
        .route("/topics/{topic}", post(post_topic))
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BYTES))
        .with_state(state)
}

/// Serves the router on the given address until the listener fails.
///
/// # Errors
///
/// Returns [`WebError::Server`] when binding or serving fails.
pub async fn serve(addr: SocketAddr, state: WebState) -> Result<(), WebError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| WebError::Server(format!("bind {addr} failed: {err}")))?;
    axum::serve(listener, router(state))
        .await
        .map_err(|err| WebError::Server(format!("http server failed: {err}")))
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// Successful broadcast response body.
#[derive(Debug, Serialize)]
pub struct BroadcastReceipt {
    /// Topic the payload was broadcast to.
    pub topic: String,
    /// Payload size in bytes.
    pub payload_bytes: usize,
}

/// Decoded multipart form.
#[derive(Debug)]
struct BroadcastForm {
    /// Visibility formula.
    visibility: String,
    /// Payload bytes.
    payload: Vec<u8>,
}

/// Handles `POST /topics/{topic}`.
async fn post_topic(
    State(state): State<WebState>,
    Path(topic): Path<String>,
    multipart: Multipart,
) -> Response {
    match handle_post(state, topic, multipart).await {
        Ok(receipt) => Json(receipt).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Reads the form and broadcasts it on the blocking pool.
async fn handle_post(
    state: WebState,
    topic: String,
    multipart: Multipart,
) -> Result<BroadcastReceipt, WebError> {
    let form = read_form(multipart).await?;
    let payload_bytes = form.payload.len();
    let task_topic = topic.clone();
    tokio::task::spawn_blocking(move || {
        broadcast_topic(&state, &task_topic, &form.visibility, &form.payload)
    })
    .await
    .map_err(|err| WebError::Task(err.to_string()))??;
    Ok(BroadcastReceipt {
        topic,
        payload_bytes,
    })
}

/// Collects the visibility and payload parts.
async fn read_form(mut multipart: Multipart) -> Result<BroadcastForm, WebError> {
    let mut visibility = None;
    let mut payload = None;
    while let Some(field) =
        multipart.next_field().await.map_err(|err| WebError::Multipart(err.to_string()))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some(VISIBILITY_PART) => {
                let text = field.text().await.map_err(|err| WebError::Multipart(err.to_string()))?;
                visibility = Some(decode_visibility(&text)?);
            }
            Some(PAYLOAD_PART) => {
                let bytes =
                    field.bytes().await.map_err(|err| WebError::Multipart(err.to_string()))?;
                payload = Some(bytes.to_vec());
            }
            _ => {}
        }
    }
    Ok(BroadcastForm {
        visibility: visibility.ok_or(WebError::MissingPart(VISIBILITY_PART))?,
        payload: payload.ok_or(WebError::MissingPart(PAYLOAD_PART))?,
    })
}

// ============================================================================
// SECTION: Engine Lifecycle
// ============================================================================

/// Broadcasts one payload through a freshly created engine.
///
/// The engine is closed whether or not the broadcast succeeds.
///
/// # Errors
///
/// Returns [`WebError::Broadcast`] for construction, registration, broadcast,
/// or close failures; the first failure wins.
pub fn broadcast_topic(
    state: &WebState,
    topic: &str,
    visibility: &str,
    payload: &[u8],
) -> Result<(), WebError> {
    let engine = state.factory.create_from_settings(&state.settings, &state.group)?;
    let result = engine
        .register_topic(topic)
        .and_then(|_| engine.broadcast(topic, visibility, payload));
    let closed = engine.close();
    result?;
    closed?;
    Ok(())
}
