//! Error types for repository operations.

use cask_types::{ContentId, ErrorKind, ObjectId, MAX_DERIVATION_DEPTH};
use thiserror::Error;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepoError {
    /// The content does not exist.
    #[error("content not found: {id}")]
    ContentNotFound { id: ContentId },

    /// The object does not exist.
    #[error("object not found: {id}")]
    ObjectNotFound { id: ObjectId },

    /// A content with this id already exists.
    #[error("content already exists: {id}")]
    ContentExists { id: ContentId },

    /// An object with this id already exists.
    #[error("object already exists: {id}")]
    ObjectExists { id: ObjectId },

    /// The child already has a relationship record.
    #[error("derivation record already exists for content {child}")]
    RelationshipExists { child: ContentId },

    /// Creating the child would exceed the derivation depth cap.
    #[error("derivation depth exceeded below {parent}: level {level} > {MAX_DERIVATION_DEPTH}")]
    DepthExceeded { parent: ContentId, level: u32 },

    /// Child and relationship record disagree, or the child's level is not
    /// one below its parent.
    #[error("inconsistent derivation record: {0}")]
    InvalidDerivation(String),

    /// An internal lock was poisoned by a panicking writer.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

impl RepoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ContentNotFound { .. } | Self::ObjectNotFound { .. } => ErrorKind::NotFound,
            Self::ContentExists { .. }
            | Self::ObjectExists { .. }
            | Self::RelationshipExists { .. } => ErrorKind::AlreadyExists,
            Self::DepthExceeded { .. } => ErrorKind::DepthExceeded,
            Self::InvalidDerivation(_) => ErrorKind::InvalidInput,
            Self::LockPoisoned(_) => ErrorKind::BackendFailure,
        }
    }
}

/// Convenience type alias for repository operations.
pub type RepoResult<T> = std::result::Result<T, RepoError>;
