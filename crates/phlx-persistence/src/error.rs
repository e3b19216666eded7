//! Persistence layer error types

use thiserror::Error;
use uuid::Uuid;

use crate::Revision;

/// Persistence layer errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    #[error("Entity not found: {entity_type} with key {key}")]
    NotFound { entity_type: String, key: String },

    #[error(
        "Write conflict on {entity_type} {id}: expected revision {expected}, found {actual}"
    )]
    WriteConflict {
        entity_type: String,
        id: Uuid,
        expected: Revision,
        actual: Revision,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PersistenceError {
    pub fn not_found(entity_type: &str, key: impl ToString) -> Self {
        Self::NotFound {
            entity_type: entity_type.to_string(),
            key: key.to_string(),
        }
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PersistenceError>;
