//! Audit transaction record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of event recorded in the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// An incoming request entered the cache pipeline
    Request,
    /// Served from the durable tier
    CacheHit,
    /// Served from the in-process tier
    MemoryHit,
    /// Served via similarity fallback
    SemanticHit,
    /// Caller computation completed and was cached
    ComputeSuccess,
    /// Caller computation failed
    ComputeError,
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Request => "request",
            Self::CacheHit => "cache_hit",
            Self::MemoryHit => "memory_hit",
            Self::SemanticHit => "semantic_hit",
            Self::ComputeSuccess => "compute_success",
            Self::ComputeError => "compute_error",
        };
        f.write_str(name)
    }
}

/// An append-only audit trail record
///
/// Never mutated after creation. Hit and compute transactions reference
/// their originating request transaction through `correlation_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditTransaction {
    /// Unique transaction id
    id: Uuid,
    /// Event kind
    kind: TransactionKind,
    /// When the event occurred
    timestamp: DateTime<Utc>,
    /// Fingerprint of the request payload involved
    payload_hash: String,
    /// Id of the request transaction this event belongs to
    correlation_id: Option<Uuid>,
    /// Free-form event details
    data: Option<serde_json::Value>,
}

impl AuditTransaction {
    /// Creates a new transaction record
    pub fn new(kind: TransactionKind, payload_hash: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            timestamp: Utc::now(),
            payload_hash: payload_hash.into(),
            correlation_id: None,
            data: None,
        }
    }

    /// Links this transaction to a prior request transaction
    pub fn with_correlation(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Attaches event details
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn payload_hash(&self) -> &str {
        &self.payload_hash
    }

    pub fn correlation_id(&self) -> Option<Uuid> {
        self.correlation_id
    }

    pub fn data(&self) -> Option<&serde_json::Value> {
        self.data.as_ref()
    }
}
