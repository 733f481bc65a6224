//! Audit sink and ledger anchor traits

use std::fmt::Debug;

use async_trait::async_trait;
use uuid::Uuid;

use super::AuditTransaction;
use crate::domain::CacheError;

/// Append-only recorder for cache decisions
///
/// Recording is best-effort from the cache's perspective: a failing sink
/// must never fail the request being served. Callers are responsible for
/// recording a request transaction before any transaction that references
/// it.
#[async_trait]
pub trait AuditSink: Send + Sync + Debug {
    /// Appends a transaction and returns its id
    async fn record(&self, transaction: AuditTransaction) -> Result<Uuid, CacheError>;
}

/// External immutable ledger for audit digests
///
/// A pure enhancement layered over an [`AuditSink`]; anchoring failures
/// have no bearing on cache behavior.
#[async_trait]
pub trait LedgerAnchor: Send + Sync + Debug {
    /// Submits a transaction digest, returning an anchor reference
    async fn anchor(&self, digest: &str) -> Result<String, CacheError>;
}
