use thiserror::Error;

/// Errors surfaced by [`RemoteClient`](super::RemoteClient) operations.
///
/// Rate limiting never appears here: the credential pool absorbs it.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// A pool was built without any credentials.
    #[error("no credentials configured")]
    NoCredentials,

    /// The service kept failing transiently past the retry budget.
    #[error("remote service unavailable after {attempts} attempts: {message}")]
    Service { message: String, attempts: u32 },

    #[error("not found: {resource}")]
    NotFound { resource: String },

    #[error("forbidden: {resource}")]
    Forbidden { resource: String },

    #[error("remote call {operation} failed (status {status:?}, code {api_code:?}): {message}")]
    Unclassified {
        operation: String,
        status: Option<u16>,
        api_code: Option<i64>,
        message: String,
    },

    /// The response did not have the expected shape.
    #[error("failed to decode {operation} response: {message}")]
    Decode { operation: String, message: String },
}

impl RemoteError {
    pub fn decode(operation: impl Into<String>, message: impl ToString) -> Self {
        Self::Decode {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden { .. })
    }

    /// Whether retries were exhausted on a transient failure.
    pub fn is_service(&self) -> bool {
        matches!(self, Self::Service { .. })
    }
}

/// Result of a remote call whose "does not exist" and "not allowed" answers
/// are expected and handled by the caller rather than treated as failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Found(T),
    NotFound { resource: String },
    Forbidden { resource: String },
}

impl<T> Outcome<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Found(v) => Outcome::Found(f(v)),
            Outcome::NotFound { resource } => Outcome::NotFound { resource },
            Outcome::Forbidden { resource } => Outcome::Forbidden { resource },
        }
    }

    /// Collapse into an `Option`, logging what was skipped.
    ///
    /// Forbidden resources are always skipped. Missing ones are skipped
    /// unless `strict`, in which case they become an error again.
    pub fn into_option(self, strict: bool) -> Result<Option<T>, RemoteError> {
        match self {
            Outcome::Found(v) => Ok(Some(v)),
            Outcome::Forbidden { resource } => {
                tracing::warn!(resource = %resource, "Skipping forbidden resource");
                Ok(None)
            }
            Outcome::NotFound { resource } if strict => Err(RemoteError::NotFound { resource }),
            Outcome::NotFound { resource } => {
                tracing::warn!(resource = %resource, "Skipping missing resource");
                Ok(None)
            }
        }
    }
}

/// Turn expected remote errors into [`Outcome`] values.
pub trait Classified<T> {
    fn classified(self) -> Result<Outcome<T>, RemoteError>;
}

impl<T> Classified<T> for Result<T, RemoteError> {
    fn classified(self) -> Result<Outcome<T>, RemoteError> {
        match self {
            Ok(v) => Ok(Outcome::Found(v)),
            Err(RemoteError::NotFound { resource }) => Ok(Outcome::NotFound { resource }),
            Err(RemoteError::Forbidden { resource }) => Ok(Outcome::Forbidden { resource }),
            Err(other) => Err(other),
        }
    }
}
