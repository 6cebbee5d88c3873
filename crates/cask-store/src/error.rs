use cask_types::ErrorKind;

/// Errors from storage backend operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No object is stored under the key.
    #[error("object not found: {key}")]
    NotFound { key: String },

    /// No backend is registered under the name.
    #[error("backend not found: {name}")]
    BackendNotFound { name: String },

    /// A backend is already registered under the name.
    #[error("backend already registered: {name}")]
    BackendExists { name: String },

    /// The backend cannot perform this operation (e.g. URL issuance without
    /// a public address).
    #[error("{operation} is not supported by the {backend} backend")]
    Unsupported {
        backend: &'static str,
        operation: &'static str,
    },

    /// The key cannot be mapped onto the backend's namespace.
    #[error("invalid object key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    /// I/O error from the underlying storage medium.
    #[error("I/O error during {operation} of {key}: {source}")]
    Io {
        operation: &'static str,
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// A remote backend rejected or failed the request.
    #[error("{backend} backend failed during {operation} of {key}: {message}")]
    Backend {
        backend: &'static str,
        operation: &'static str,
        key: String,
        message: String,
    },

    /// Backend configuration is incomplete or inconsistent.
    #[error("invalid backend configuration: {0}")]
    Config(String),

    /// An internal lock was poisoned by a panicking writer.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

impl StoreError {
    /// Wrap an I/O error, mapping "file not found" onto [`StoreError::NotFound`].
    pub fn io(operation: &'static str, key: impl Into<String>, source: std::io::Error) -> Self {
        let key = key.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound { key }
        } else {
            Self::Io {
                operation,
                key,
                source,
            }
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } | Self::BackendNotFound { .. } => ErrorKind::NotFound,
            Self::BackendExists { .. } => ErrorKind::AlreadyExists,
            Self::Unsupported { .. } => ErrorKind::UnsupportedOperation,
            Self::InvalidKey { .. } | Self::Config(_) => ErrorKind::InvalidInput,
            Self::Io { .. } | Self::Backend { .. } | Self::LockPoisoned(_) => {
                ErrorKind::BackendFailure
            }
        }
    }

    /// Returns `true` if the error means the object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_not_found_maps_to_not_found() {
        let err = StoreError::io(
            "download",
            "a/b",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.is_not_found());
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn other_io_errors_are_backend_failures() {
        let err = StoreError::io(
            "upload",
            "a/b",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope"),
        );
        assert_eq!(err.kind(), ErrorKind::BackendFailure);
        assert!(err.to_string().contains("upload of a/b"));
    }

    #[test]
    fn unsupported_kind() {
        let err = StoreError::Unsupported {
            backend: "memory",
            operation: "upload_url",
        };
        assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);
        assert_eq!(err.to_string(), "upload_url is not supported by the memory backend");
    }
}
