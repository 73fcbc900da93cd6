//! Persistence layer error types

use thiserror::Error;

/// Errors that can occur in the persistence layer
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Database connection error
    #[error("Database connection error: {0}")]
    Connection(String),

    /// Item not found
    #[error("Item not found: {entity_type} with identifier '{identifier}'")]
    NotFound {
        entity_type: String,
        identifier: String,
    },

    /// Duplicate entry
    #[error("Duplicate entry: {entity_type} with name '{name}' already exists")]
    Duplicate { entity_type: String, name: String },

    /// A record referenced a column its collection does not have
    #[error("Unknown column '{column}' for collection '{collection}'")]
    UnknownColumn { collection: String, column: String },

    /// Schema statement (create/drop table) failed
    #[error("Schema statement failed: {0}")]
    Schema(String),

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Database error from SQLx
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PersistenceError {
    /// Convert to HTTP status code for API responses
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Duplicate { .. } => StatusCode::CONFLICT,
            Self::UnknownColumn { .. } => StatusCode::BAD_REQUEST,
            Self::Serialization(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn not_found(entity_type: &str, identifier: &str) -> Self {
        Self::NotFound {
            entity_type: entity_type.to_string(),
            identifier: identifier.to_string(),
        }
    }
}
