use std::fmt;
use thiserror::Error;
use uuid::Uuid;
use crate::domains::variable::import::CsvImportError;

/// Database errors
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Connection pool error: {0}")]
    ConnectionPool(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Error executing statement: {0}")]
    Execution(String),

    #[error("Record not found: {0} with ID {1}")]
    NotFound(String, String),

    #[error("Conflict error: {0}")]
    Conflict(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Database error: {0}")]
    Other(String),
}

impl serde::Serialize for DbError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("DbError", 2)?;
        let (kind, message) = match self {
            DbError::Sqlx(err) => ("Sqlx", err.to_string()),
            DbError::ConnectionPool(s) => ("ConnectionPool", s.clone()),
            DbError::Transaction(s) => ("Transaction", s.clone()),
            DbError::Query(s) => ("Query", s.clone()),
            DbError::Execution(s) => ("Execution", s.clone()),
            DbError::NotFound(entity, id) => {
                ("NotFound", format!("Record not found: {} with ID {}", entity, id))
            }
            DbError::Conflict(s) => ("Conflict", s.clone()),
            DbError::Migration(s) => ("Migration", s.clone()),
            DbError::Other(s) => ("Other", s.clone()),
        };
        state.serialize_field("type", kind)?;
        state.serialize_field("message", &message)?;
        state.end()
    }
}

/// Manual Clone implementation for DbError (sqlx::Error is not Clone)
impl Clone for DbError {
    fn clone(&self) -> Self {
        match self {
            DbError::Sqlx(err) => DbError::Other(format!("SQLx error: {}", err)),
            DbError::ConnectionPool(s) => DbError::ConnectionPool(s.clone()),
            DbError::Transaction(s) => DbError::Transaction(s.clone()),
            DbError::Query(s) => DbError::Query(s.clone()),
            DbError::Execution(s) => DbError::Execution(s.clone()),
            DbError::NotFound(s1, s2) => DbError::NotFound(s1.clone(), s2.clone()),
            DbError::Conflict(s) => DbError::Conflict(s.clone()),
            DbError::Migration(s) => DbError::Migration(s.clone()),
            DbError::Other(s) => DbError::Other(s.clone()),
        }
    }
}

/// Domain-level errors
#[derive(Debug, Error, Clone, serde::Serialize)]
pub enum DomainError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Authorization failed: {0}")]
    AuthorizationFailed(String),

    #[error("Invalid UUID: {0}")]
    InvalidUuid(String),

    #[error("Entity not found: {0} with ID {1}")]
    EntityNotFound(String, Uuid),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("CSV import failed: {0}")]
    CsvImport(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<CsvImportError> for DomainError {
    fn from(error: CsvImportError) -> Self {
        DomainError::CsvImport(error.to_string())
    }
}

/// Service-level errors (application specific)
#[derive(Debug, Error, Clone, serde::Serialize)]
pub enum ServiceError {
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Session expired")]
    SessionExpired,

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Validation errors
#[derive(Debug, Error, Clone, serde::Serialize)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required {
        field: String,
    },

    #[error("Field '{field}' must be at least {min} characters")]
    MinLength {
        field: String,
        min: usize,
    },

    #[error("Field '{field}' cannot exceed {max} characters")]
    MaxLength {
        field: String,
        max: usize,
    },

    #[error("Field '{field}' must be between {min} and {max}")]
    Range {
        field: String,
        min: String,
        max: String,
    },

    #[error("Field '{field}' contains invalid format: {reason}")]
    Format {
        field: String,
        reason: String,
    },

    #[error("Field '{field}' must be unique")]
    Unique {
        field: String,
    },

    #[error("Field '{field}' contains an invalid value: {reason}")]
    InvalidValue {
        field: String,
        reason: String,
    },

    #[error("Entity is invalid: {0}")]
    Entity(String),

    #[error("Relationship error: {0}")]
    Relationship(String),

    #[error("Validation error: {0}")]
    Custom(String),
}

impl ValidationError {
    pub fn required(field: &str) -> Self {
        Self::Required {
            field: field.to_string(),
        }
    }

    pub fn min_length(field: &str, min: usize) -> Self {
        Self::MinLength {
            field: field.to_string(),
            min,
        }
    }

    pub fn max_length(field: &str, max: usize) -> Self {
        Self::MaxLength {
            field: field.to_string(),
            max,
        }
    }

    pub fn range<T: fmt::Display>(field: &str, min: T, max: T) -> Self {
        Self::Range {
            field: field.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        }
    }

    pub fn format(field: &str, reason: &str) -> Self {
        Self::Format {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn unique(field: &str) -> Self {
        Self::Unique {
            field: field.to_string(),
        }
    }

    pub fn invalid_value(field: &str, reason: &str) -> Self {
        Self::InvalidValue {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn entity(message: &str) -> Self {
        Self::Entity(message.to_string())
    }

    pub fn relationship(message: &str) -> Self {
        Self::Relationship(message.to_string())
    }

    pub fn custom(message: &str) -> Self {
        Self::Custom(message.to_string())
    }
}
