//! # DomainError
//!
//! Centralized error handling for the echohub ecosystem.
//! Maps domain-specific failures to actionable error types.

use thiserror::Error;

/// The primary error type for all service and port operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A required field is missing or malformed.
    #[error("validation error: {0}")]
    Validation(String),

    /// Referenced node, identity or notification is absent.
    #[error("{entity} not found with ID {id}")]
    NotFound { entity: &'static str, id: String },

    /// Ownership or role mismatch.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Key generation, encryption or decryption failed. Never masked.
    #[error("crypto failure: {0}")]
    CryptoFailure(String),

    #[error("too many requests: {0}")]
    RateLimited(String),

    /// Resource already exists (e.g., duplicate username)
    #[error("conflict: {0}")]
    Conflict(String),

    /// Infrastructure failure. Detail is logged where it happens, not returned.
    #[error("internal service error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Stable machine-readable kind for API clients.
    pub fn kind(&self) -> &'static str {
        match self {
            DomainError::Validation(_) => "validation_error",
            DomainError::NotFound { .. } => "not_found",
            DomainError::Unauthorized(_) => "unauthorized",
            DomainError::CryptoFailure(_) => "crypto_failure",
            DomainError::RateLimited(_) => "rate_limited",
            DomainError::Conflict(_) => "conflict",
            DomainError::Internal(_) => "internal",
        }
    }
}

/// A specialized Result type for echohub logic.
pub type Result<T> = std::result::Result<T, DomainError>;
