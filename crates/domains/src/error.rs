//! # DomainError
//!
//! Centralized error handling for the post engine.
//! Maps domain-specific failures to actionable error types.

use thiserror::Error;

/// The primary error type for all domain and service operations.
#[derive(Error, Debug)]
pub enum DomainError {
    /// Resource not found (e.g., Post, Reply, User)
    #[error("{0} not found with ID {1}")]
    NotFound(&'static str, String),

    /// Validation failure (e.g., post too long, empty reply)
    #[error("validation error: {0}")]
    Validation(String),

    /// The acting principal lacks rights over the resource
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Object store or mail transport failure
    #[error("external service error: {0}")]
    ExternalService(String),

    /// Infrastructure failure (e.g., DB down)
    #[error("internal service error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound(entity, id.to_string())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn external(msg: impl Into<String>) -> Self {
        Self::ExternalService(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// A specialized Result type for domain logic.
pub type Result<T> = std::result::Result<T, DomainError>;
