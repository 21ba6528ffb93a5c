// crates/secure-broadcast-core/src/runtime/audit.rs
// ============================================================================
// Module: Broadcast Audit Logging
// Description: Structured audit events for topic and message operations.
// Purpose: Emit redacted JSON-line audit records without hard dependencies.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! The engine records one audit event per topic operation, broadcast, delivered
//! or filtered receive, and close. Events name the operation, topic, mode,
//! outcome, and error kind. Sinks route them to stderr, an append-only file,
//! or nowhere.
//!
//! Security posture: events never carry payload bytes, key material, or
//! decrypted content; only sizes and flags.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::core::mode::BroadcastMode;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Outcome recorded for an audited operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    /// Operation completed.
    Success,
    /// Message was withheld by the authorizer.
    Filtered,
    /// Operation failed with an error.
    Failure,
}

/// Broadcast audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct BroadcastAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Engine group.
    pub group: String,
    /// Topic when the operation targets one.
    pub topic: Option<String>,
    /// Engine mode.
    pub mode: BroadcastMode,
    /// Operation outcome.
    pub outcome: AuditOutcome,
    /// Error kind label on failure.
    pub error_kind: Option<&'static str>,
    /// Whether the payload crossed the transport encrypted.
    pub encrypted: Option<bool>,
    /// Plaintext payload size in bytes.
    pub payload_bytes: Option<usize>,
}

/// Inputs required to construct an audit event.
#[derive(Debug, Clone)]
pub struct BroadcastAuditEventParams {
    /// Event identifier.
    pub event: &'static str,
    /// Engine group.
    pub group: String,
    /// Topic when the operation targets one.
    pub topic: Option<String>,
    /// Engine mode.
    pub mode: BroadcastMode,
    /// Operation outcome.
    pub outcome: AuditOutcome,
    /// Error kind label on failure.
    pub error_kind: Option<&'static str>,
    /// Whether the payload crossed the transport encrypted.
    pub encrypted: Option<bool>,
    /// Plaintext payload size in bytes.
    pub payload_bytes: Option<usize>,
}

impl BroadcastAuditEvent {
    /// Creates a new audit event with a consistent timestamp.
    #[must_use]
    pub fn new(params: BroadcastAuditEventParams) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            event: params.event,
            timestamp_ms,
            group: params.group,
            topic: params.topic,
            mode: params.mode,
            outcome: params.outcome,
            error_kind: params.error_kind,
            encrypted: params.encrypted,
            payload_bytes: params.payload_bytes,
        }
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink for broadcast events.
pub trait BroadcastAuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: &BroadcastAuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl BroadcastAuditSink for StderrAuditSink {
    fn record(&self, event: &BroadcastAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl BroadcastAuditSink for FileAuditSink {
    fn record(&self, event: &BroadcastAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl BroadcastAuditSink for NoopAuditSink {
    fn record(&self, _event: &BroadcastAuditEvent) {}
}
