//! Ledger-anchoring audit decorator

use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::audit::{AuditSink, AuditTransaction, LedgerAnchor};
use crate::domain::CacheError;

/// Audit sink that anchors transaction digests to an external ledger
///
/// Wraps any [`AuditSink`]; after the inner sink has accepted a
/// transaction, a SHA-256 digest of its serialized form is submitted to
/// the ledger. Anchoring is best-effort: a failing ledger is logged and
/// otherwise invisible, so cache behavior is identical whether the
/// decorator is present or not.
#[derive(Debug)]
pub struct AnchoredAuditLog {
    inner: Arc<dyn AuditSink>,
    ledger: Arc<dyn LedgerAnchor>,
}

impl AnchoredAuditLog {
    pub fn new(inner: Arc<dyn AuditSink>, ledger: Arc<dyn LedgerAnchor>) -> Self {
        Self { inner, ledger }
    }

    fn digest(transaction: &AuditTransaction) -> Result<String, CacheError> {
        let serialized = serde_json::to_string(transaction).map_err(|e| {
            CacheError::internal(format!("failed to serialize transaction: {}", e))
        })?;

        let mut hasher = Sha256::new();
        hasher.update(serialized.as_bytes());
        Ok(hex::encode(hasher.finalize()))
    }
}

#[async_trait]
impl AuditSink for AnchoredAuditLog {
    async fn record(&self, transaction: AuditTransaction) -> Result<Uuid, CacheError> {
        let digest = Self::digest(&transaction)?;
        let id = self.inner.record(transaction).await?;

        match self.ledger.anchor(&digest).await {
            Ok(anchor_ref) => {
                debug!(transaction_id = %id, anchor_ref = %anchor_ref, "audit transaction anchored");
            }
            Err(e) => {
                warn!(transaction_id = %id, error = %e, "failed to anchor audit transaction");
            }
        }

        Ok(id)
    }
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// Ledger that records submitted digests
    #[derive(Debug, Default)]
    pub struct RecordingLedger {
        digests: Mutex<Vec<String>>,
        error: Option<String>,
    }

    impl RecordingLedger {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_error(mut self, error: impl Into<String>) -> Self {
            self.error = Some(error.into());
            self
        }

        pub fn digests(&self) -> Vec<String> {
            self.digests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LedgerAnchor for RecordingLedger {
        async fn anchor(&self, digest: &str) -> Result<String, CacheError> {
            if let Some(ref error) = self.error {
                return Err(CacheError::audit_unavailable(error.clone()));
            }

            let mut digests = self.digests.lock().unwrap();
            digests.push(digest.to_string());
            Ok(format!("anchor-{}", digests.len()))
        }
    }
}
