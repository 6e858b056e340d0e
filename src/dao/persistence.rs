use std::error::Error;
use thiserror::Error;

/// Result alias for persistence operations.
pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// Error raised by rotation stores regardless of the underlying database.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("persistence unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl PersistenceError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        PersistenceError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}
