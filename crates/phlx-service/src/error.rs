//! # Service Error Types
//!
//! Unified error handling for the orchestration layer.

use phlx_domain::DomainError;
use phlx_persistence::PersistenceError;
use thiserror::Error;

/// Service-level errors
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl ServiceError {
    /// Stable machine-readable code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Domain(e) => match e {
                DomainError::InvalidCoordinate { .. } => "INVALID_COORDINATE",
                DomainError::InvalidBoundary(_) => "INVALID_BOUNDARY",
                DomainError::NotFound { .. } => "NOT_FOUND",
                DomainError::DuplicateId { .. } => "DUPLICATE_ID",
                DomainError::InvalidTransition { .. } => "INVALID_TRANSITION",
                DomainError::InvalidCommand(_) => "INVALID_COMMAND",
                DomainError::InvalidRiskModel(_) => "INVALID_RISK_MODEL",
            },
            Self::Persistence(e) => match e {
                PersistenceError::NotFound { .. } => "NOT_FOUND",
                PersistenceError::WriteConflict { .. } => "WRITE_CONFLICT",
                PersistenceError::Serialization(_) => "SERIALIZATION_ERROR",
            },
            Self::Config(_) => "CONFIG_ERROR",
            Self::Transport(_) => "TRANSPORT_ERROR",
        }
    }

    /// The caller asked for something that does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.error_code() == "NOT_FOUND"
    }
}

/// Result type alias for service operations
pub type Result<T> = std::result::Result<T, ServiceError>;
