use thiserror::Error;

use crate::remote::RemoteError;
use crate::repository::RepositoryError;

/// Errors that abort a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A staged pair collided and the run was not robust.
    #[error("integrity violation while staging edges of user {user_id}: {message}")]
    IntegrityViolation { user_id: i64, message: String },

    /// A user to sync does not exist remotely.
    #[error("bad target: user {user_id} does not exist ({resource})")]
    BadTarget { user_id: i64, resource: String },

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sea_orm::DbErr> for SyncError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Repository(err.into())
    }
}
