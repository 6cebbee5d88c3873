use cask_types::ErrorKind;

/// Errors from key generator construction.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum KeyError {
    /// Shard length outside `1..=max`.
    #[error("invalid shard length {length}: must be between 1 and {max}")]
    InvalidShardLength { length: usize, max: usize },
}

impl KeyError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidInput
    }
}

/// Result alias for key generator construction.
pub type KeyResult<T> = Result<T, KeyError>;
