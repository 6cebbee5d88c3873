//! Error types for the derivation graph.

use cask_repo::RepoError;
use cask_types::{ContentId, ErrorKind, MAX_DERIVATION_DEPTH};

/// Errors that can occur during derivation graph operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// A referenced content does not exist.
    #[error("content not found: {id}")]
    ContentNotFound { id: ContentId },

    /// Deriving below `parent` would exceed the depth cap.
    #[error("cannot derive below {parent}: level {level} exceeds maximum depth {MAX_DERIVATION_DEPTH}")]
    DepthExceeded { parent: ContentId, level: u32 },

    /// Repository failure.
    #[error("repository error: {0}")]
    Repo(#[source] RepoError),
}

impl GraphError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ContentNotFound { .. } => ErrorKind::NotFound,
            Self::DepthExceeded { .. } => ErrorKind::DepthExceeded,
            Self::Repo(e) => e.kind(),
        }
    }
}

impl From<RepoError> for GraphError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::ContentNotFound { id } => Self::ContentNotFound { id },
            RepoError::DepthExceeded { parent, level } => Self::DepthExceeded { parent, level },
            other => Self::Repo(other),
        }
    }
}

/// Convenience alias for graph results.
pub type GraphResult<T> = Result<T, GraphError>;
