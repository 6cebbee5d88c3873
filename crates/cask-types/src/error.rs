use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("invalid status: {0:?}")]
    InvalidStatus(String),

    #[error("invalid derivation kind: {0:?}")]
    InvalidDerivationKind(String),
}

impl TypeError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidInput
    }
}

/// Coarse classification shared by every error type in the workspace.
///
/// Wrapping an error in another crate's error type preserves its kind, so
/// callers can branch on `err.kind()` without matching nested variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A content, object, parent, or backend does not exist.
    NotFound,
    /// An entity with the same identity already exists.
    AlreadyExists,
    /// A derivation would exceed the maximum derivation depth.
    DepthExceeded,
    /// The backend cannot perform the requested operation.
    UnsupportedOperation,
    /// The underlying storage medium failed.
    BackendFailure,
    /// Malformed input: bad key, illegal transition, bad configuration.
    InvalidInput,
    /// The operation conflicts with existing state.
    Conflict,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotFound => "not found",
            Self::AlreadyExists => "already exists",
            Self::DepthExceeded => "depth exceeded",
            Self::UnsupportedOperation => "unsupported operation",
            Self::BackendFailure => "backend failure",
            Self::InvalidInput => "invalid input",
            Self::Conflict => "conflict",
        };
        f.write_str(s)
    }
}
