//! Domain-level error types.

use thiserror::Error;

/// Domain-level errors.
///
/// Every variant is raised before any mutation is applied, so an aggregate
/// that returned an error is unchanged.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    #[error("Invalid coordinate: lat={lat}, lon={lon}")]
    InvalidCoordinate { lat: f64, lon: f64 },

    #[error("Invalid boundary: {0}")]
    InvalidBoundary(String),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Duplicate id: {entity_type} {id} already exists")]
    DuplicateId { entity_type: String, id: String },

    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Invalid risk model: {0}")]
    InvalidRiskModel(String),
}

impl DomainError {
    pub(crate) fn not_found(entity_type: &str, id: impl ToString) -> Self {
        Self::NotFound {
            entity_type: entity_type.to_string(),
            id: id.to_string(),
        }
    }

    pub(crate) fn transition(from: impl ToString, to: impl ToString) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;
