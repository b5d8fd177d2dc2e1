use std::error::Error;
use thiserror::Error;

use crate::state::match_aggregate::MatchId;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not serve the call.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Human readable context.
        message: String,
        /// Underlying backend error.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The stored version no longer matches the version the writer read.
    #[error("match `{id}` is no longer at version {expected}")]
    VersionConflict {
        /// Match whose commit was refused.
        id: MatchId,
        /// Version the writer read before mutating.
        expected: u64,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}
