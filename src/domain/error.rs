use thiserror::Error;

/// Core cache errors
///
/// Only `InvalidPayload` and `Compute` propagate to callers of the cache
/// facade; the backend variants are caught internally and degrade the
/// lookup to a miss.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Invalid payload: {message}")]
    InvalidPayload { message: String },

    #[error("Durable tier unavailable: {message}")]
    DurableUnavailable { message: String },

    #[error("Similarity backend unavailable: {message}")]
    SimilarityUnavailable { message: String },

    #[error("Audit backend unavailable: {message}")]
    AuditUnavailable { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Compute error: {message}")]
    Compute { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl CacheError {
    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::InvalidPayload {
            message: message.into(),
        }
    }

    pub fn durable_unavailable(message: impl Into<String>) -> Self {
        Self::DurableUnavailable {
            message: message.into(),
        }
    }

    pub fn similarity_unavailable(message: impl Into<String>) -> Self {
        Self::SimilarityUnavailable {
            message: message.into(),
        }
    }

    pub fn audit_unavailable(message: impl Into<String>) -> Self {
        Self::AuditUnavailable {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn compute(message: impl Into<String>) -> Self {
        Self::Compute {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// True for errors the facade swallows and converts into a miss
    pub fn is_degradable(&self) -> bool {
        matches!(
            self,
            Self::DurableUnavailable { .. }
                | Self::SimilarityUnavailable { .. }
                | Self::AuditUnavailable { .. }
        )
    }
}
