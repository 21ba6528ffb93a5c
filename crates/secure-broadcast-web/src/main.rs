// crates/secure-broadcast-web/src/main.rs
// ============================================================================
// Module: Secure Broadcast Web Binary
// Description: Process entry point for the broadcast HTTP server.
// Purpose: Load settings, bind the listener, and serve until failure.
// Dependencies: secure-broadcast-web, secure-broadcast-config, tokio
// ============================================================================

//! ## Overview
//! Loads broadcaster settings from the property file resolved by
//! `SECURE_BROADCAST_CONFIG` (or `secure-broadcast.toml`) and serves
//! `POST /topics/{topic}` on `broadcaster.web.bind`.

use std::io::Write;
use std::net::SocketAddr;
use std::process::ExitCode;

use secure_broadcast_broker::BroadcasterFactory;
use secure_broadcast_config::BroadcastSettings;
use secure_broadcast_web::BIND_KEY;
use secure_broadcast_web::DEFAULT_BIND;
use secure_broadcast_web::DEFAULT_GROUP;
use secure_broadcast_web::WebError;
use secure_broadcast_web::WebState;

/// Server entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Loads settings and serves requests.
async fn run() -> Result<(), WebError> {
    let settings =
        BroadcastSettings::load(None).map_err(|err| WebError::Server(err.to_string()))?;
    let bind = settings.property(BIND_KEY).unwrap_or(DEFAULT_BIND);
    let addr: SocketAddr = bind
        .trim()
        .parse()
        .map_err(|_| WebError::Server(format!("invalid {BIND_KEY}: {bind}")))?;
    let state = WebState::new(BroadcasterFactory::new(), settings, DEFAULT_GROUP);
    secure_broadcast_web::serve(addr, state).await
}

/// Writes a failure line to stderr and returns a failing exit code.
fn emit_error(message: &str) -> ExitCode {
    let mut stderr = std::io::stderr();
    let _ = writeln!(&mut stderr, "secure-broadcast-web: {message}");
    ExitCode::FAILURE
}
