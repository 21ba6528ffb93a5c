// crates/secure-broadcast-web/src/lib.rs
// ============================================================================
// Module: Secure Broadcast Web Library
// Description: HTTP front end that forwards multipart posts to the engine.
// Purpose: Expose the router, handler state, and visibility decoding.
// Dependencies: crate::{error, server, visibility}
// ============================================================================

//! ## Overview
//! A thin HTTP caller of the broadcast engine: `POST /topics/{topic}` with a
//! `visibility` JSON part and a `payload` part broadcasts the payload through a
//! short-lived engine built from the configured settings.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod error;
pub mod server;
pub mod visibility;


// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use error::ErrorBody;
pub use error::WebError;
pub use server::BIND_KEY;
pub use server::BroadcastReceipt;
pub use server::DEFAULT_BIND;
pub use server::DEFAULT_GROUP;
pub use server::MAX_REQUEST_BYTES;
pub use server::WebState;
pub use server::broadcast_topic;
pub use server::router;
pub use server::serve;
pub use visibility::VisibilityDescriptor;
pub use visibility::decode_visibility;
