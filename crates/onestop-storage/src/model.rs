//! Audit log records.
//!
//! Domain records live in `onestop-types`; this module holds only the
//! storage-level audit event shape and its append form.

use crate::{StorageError, StorageResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Input for appending one audit event.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditAppend {
    pub timestamp: DateTime<Utc>,
    /// Acting principal: a user id, a reviewer email, or `system`
    pub actor: String,
    /// What happened, e.g. `project_submitted`
    pub action: String,
    /// Identifier of the affected record
    pub subject: String,
    pub success: bool,
    pub message: String,
    pub payload: serde_json::Value,
}

/// One stored, hash-linked audit event.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    /// Gapless sequence starting at 1
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub action: String,
    pub subject: String,
    pub success: bool,
    pub message: String,
    pub payload: serde_json::Value,
    /// Hash of the previous event, absent only for the first
    pub previous_hash: Option<String>,
    /// BLAKE3 over the previous hash, sequence, and event fields
    pub hash: String,
}

/// Chain hash shared by every adapter. Each event commits to its
/// predecessor's hash and its own sequence position.
pub(crate) fn compute_audit_hash(
    event: &AuditAppend,
    previous_hash: Option<&str>,
    sequence: u64,
) -> StorageResult<String> {
    let serializable = serde_json::json!({
        "previous_hash": previous_hash,
        "sequence": sequence,
        "timestamp": event.timestamp,
        "actor": event.actor,
        "action": event.action,
        "subject": event.subject,
        "success": event.success,
        "message": event.message,
        "payload": event.payload,
    });
    let serialized = serde_json::to_vec(&serializable)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    Ok(blake3::hash(&serialized).to_hex().to_string())
}
