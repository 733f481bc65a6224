//! In-memory append-only audit log

use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::audit::{AuditSink, AuditTransaction};
use crate::domain::CacheError;

/// Append-only audit log held in memory
///
/// Records are never mutated or removed after being appended; the snapshot
/// accessors exist for compliance review and tests.
#[derive(Debug, Default)]
pub struct InMemoryAuditLog {
    transactions: RwLock<Vec<AuditTransaction>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all recorded transactions, in append order
    pub fn snapshot(&self) -> Vec<AuditTransaction> {
        self.transactions.read().unwrap().clone()
    }

    /// Number of recorded transactions
    pub fn len(&self) -> usize {
        self.transactions.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Finds a transaction by id
    pub fn find(&self, id: Uuid) -> Option<AuditTransaction> {
        self.transactions
            .read()
            .unwrap()
            .iter()
            .find(|tx| tx.id() == id)
            .cloned()
    }

    /// Returns the transactions correlated to a request transaction
    pub fn by_correlation(&self, correlation_id: Uuid) -> Vec<AuditTransaction> {
        self.transactions
            .read()
            .unwrap()
            .iter()
            .filter(|tx| tx.correlation_id() == Some(correlation_id))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditLog {
    async fn record(&self, transaction: AuditTransaction) -> Result<Uuid, CacheError> {
        let id = transaction.id();
        self.transactions
            .write()
            .map_err(|e| CacheError::audit_unavailable(format!("failed to acquire lock: {}", e)))?
            .push(transaction);

        Ok(id)
    }
}
