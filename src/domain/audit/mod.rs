//! Audit domain - transaction records and sink contract

mod entity;
mod repository;

pub use entity::{AuditTransaction, TransactionKind};
pub use repository::{AuditSink, LedgerAnchor};
