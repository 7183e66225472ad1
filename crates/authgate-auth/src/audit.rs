//! Audit trail for completed workflows.
//!
//! Records are appended only after a workflow has otherwise succeeded, and
//! an append failure never fails the workflow; the engine logs it and moves
//! on. The serialized field names are the wire contract of the downstream
//! audit store and must not change.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::RwLock;

/// Audit event types recorded by the workflows.
pub mod events {
    /// A user completed a login.
    pub const LOGIN: &str = "USER_LOGIN";
    /// A user account was registered.
    pub const REGISTER: &str = "USER_REGISTER";
    /// A password-reset email was dispatched.
    pub const RESET_PASSWORD: &str = "USER_RESET_PASSWORD";
    /// An authenticated user changed their password.
    pub const UPDATE_PASSWORD: &str = "USER_UPDATE_PASSWORD";
}

/// Audit record severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Routine successful operation.
    Info,
    /// Degraded but completed operation.
    Warn,
    /// Failed operation.
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => f.write_str("INFO"),
            Self::Warn => f.write_str("WARN"),
            Self::Error => f.write_str("ERROR"),
        }
    }
}

/// A single audit entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    /// The user the record is about.
    #[serde(rename = "idUsuario")]
    pub subject_id: String,
    /// Record severity.
    #[serde(rename = "level")]
    pub severity: Severity,
    /// Event type, one of the [`events`] constants.
    #[serde(rename = "tipo")]
    pub event_type: String,
    /// Human-readable message.
    #[serde(rename = "mensaje")]
    pub message: String,
    /// When the event happened.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl AuditRecord {
    /// Creates a record timestamped now.
    #[must_use]
    pub fn new(
        subject_id: impl Into<String>,
        severity: Severity,
        event_type: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            severity,
            event_type: event_type.into(),
            message: message.into(),
            timestamp: OffsetDateTime::now_utc(),
        }
    }
}

/// Failure to persist an audit record.
#[derive(Debug, thiserror::Error)]
#[error("audit append failed: {0}")]
pub struct AuditError(pub String);

/// Destination for audit records.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Appends a record.
    async fn append(&self, record: AuditRecord) -> Result<(), AuditError>;
}

/// In-memory sink, mainly for tests.
#[derive(Default)]
pub struct MemoryAuditSink {
    records: RwLock<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the appended records.
    pub async fn records(&self) -> Vec<AuditRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn append(&self, record: AuditRecord) -> Result<(), AuditError> {
        self.records.write().await.push(record);
        Ok(())
    }
}

/// Sink that emits records into the structured log under the `audit`
/// target. Used when no persistent store is wired up.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn append(&self, record: AuditRecord) -> Result<(), AuditError> {
        tracing::info!(
            target: "audit",
            subject_id = %record.subject_id,
            severity = %record.severity,
            event_type = %record.event_type,
            message = %record.message,
            "audit record"
        );
        Ok(())
    }
}
