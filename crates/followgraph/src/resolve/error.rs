use thiserror::Error;

use super::target::ResolveMode;
use crate::remote::RemoteError;
use crate::repository::RepositoryError;

/// Errors from turning targets into users.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Targets required to be stored locally are not.
    #[error("targets not in the database: {}", targets.join(", "))]
    MissingTarget { targets: Vec<String> },

    /// The remote service says these targets do not exist.
    #[error("targets unknown to the remote service: {}", targets.join(", "))]
    BadTarget { targets: Vec<String> },

    #[error("no such tag: {tag}")]
    BadTag { tag: String },

    #[error("{kind} cannot be resolved in {mode} mode")]
    InvalidMode { kind: &'static str, mode: ResolveMode },

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
