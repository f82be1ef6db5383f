//! Crate-level error returned by jobs.

use thiserror::Error;

use crate::remote::RemoteError;
use crate::repository::RepositoryError;
use crate::resolve::{ResolveError, ResolveMode};
use crate::sync::SyncError;

/// A fatal job error. Each kind maps to its own process exit code.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("targets not in the database: {}", targets.join(", "))]
    MissingTarget { targets: Vec<String> },

    #[error("targets unknown to the remote service: {}", targets.join(", "))]
    BadTarget { targets: Vec<String> },

    #[error("no such tag: {tag}")]
    BadTag { tag: String },

    #[error("{kind} cannot be resolved in {mode} mode")]
    InvalidMode { kind: &'static str, mode: ResolveMode },

    #[error("integrity violation while staging edges of user {user_id}: {message}")]
    IntegrityViolation { user_id: i64, message: String },

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Config(_) => 2,
            Error::MissingTarget { .. } => 3,
            Error::BadTarget { .. } => 4,
            Error::BadTag { .. } => 5,
            Error::IntegrityViolation { .. } => 6,
            Error::Remote(_) => 7,
            Error::Repository(_) => 8,
            Error::InvalidMode { .. } => 1,
        }
    }
}

impl From<ResolveError> for Error {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::MissingTarget { targets } => Error::MissingTarget { targets },
            ResolveError::BadTarget { targets } => Error::BadTarget { targets },
            ResolveError::BadTag { tag } => Error::BadTag { tag },
            ResolveError::InvalidMode { kind, mode } => Error::InvalidMode { kind, mode },
            ResolveError::Remote(e) => Error::Remote(e),
            ResolveError::Repository(e) => Error::Repository(e),
        }
    }
}

impl From<SyncError> for Error {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::IntegrityViolation { user_id, message } => {
                Error::IntegrityViolation { user_id, message }
            }
            SyncError::BadTarget { user_id, .. } => Error::BadTarget {
                targets: vec![user_id.to_string()],
            },
            SyncError::Remote(e) => Error::Remote(e),
            SyncError::Repository(e) => Error::Repository(e),
        }
    }
}

impl From<sea_orm::DbErr> for Error {
    fn from(err: sea_orm::DbErr) -> Self {
        Error::Repository(err.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct_per_kind() {
        let errors = [
            Error::config("bad"),
            Error::MissingTarget { targets: vec![] },
            Error::BadTarget { targets: vec![] },
            Error::BadTag { tag: "t".into() },
            Error::IntegrityViolation {
                user_id: 1,
                message: "dup".into(),
            },
            Error::Remote(RemoteError::NoCredentials),
            Error::Repository(RepositoryError::InvalidInput {
                message: "x".into(),
            }),
        ];
        let codes: Vec<u8> = errors.iter().map(Error::exit_code).collect();
        assert_eq!(codes, vec![2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn sync_bad_target_names_the_user() {
        let err: Error = SyncError::BadTarget {
            user_id: 42,
            resource: "user 42".into(),
        }
        .into();
        assert_eq!(err.exit_code(), 4);
        assert!(err.to_string().contains("42"));
    }

    #[test]
    fn resolve_errors_flatten() {
        let err: Error = ResolveError::BadTag { tag: "press".into() }.into();
        assert!(matches!(err, Error::BadTag { ref tag } if tag == "press"));

        let err: Error = ResolveError::Remote(RemoteError::NoCredentials).into();
        assert_eq!(err.exit_code(), 7);
    }
}
