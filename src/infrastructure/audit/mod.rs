//! Audit log implementations

mod anchored;
mod in_memory;

pub use anchored::AnchoredAuditLog;
pub use in_memory::InMemoryAuditLog;

#[cfg(test)]
pub use anchored::mock::RecordingLedger;
#[cfg(test)]
pub use in_memory::mock::FailingAuditSink;
