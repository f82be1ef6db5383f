use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sea-orm.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// Record not found.
    #[error("Record not found: {context}")]
    NotFound { context: String },

    /// A record with the same natural key already exists.
    #[error("Record already exists: {context}")]
    Duplicate { context: String },

    /// Invalid input data, or a statement that could not be built.
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
}

impl RepositoryError {
    /// Create a NotFound error for a tag lookup by name.
    pub fn tag_not_found(name: &str) -> Self {
        Self::NotFound {
            context: format!("tag={name}"),
        }
    }

    /// Whether this error is a violated unique constraint or primary key.
    #[must_use]
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::Database(err) => matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))),
            Self::Duplicate { .. } => true,
            _ => false,
        }
    }
}

impl From<sea_orm::sea_query::error::Error> for RepositoryError {
    fn from(err: sea_orm::sea_query::error::Error) -> Self {
        Self::InvalidInput {
            message: err.to_string(),
        }
    }
}

/// Result type alias for repository operations.
pub type Result<T> = std::result::Result<T, RepositoryError>;
