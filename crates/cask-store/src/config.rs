use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::StoreResult;
use crate::fs::FsBackend;
use crate::memory::MemoryBackend;
use crate::s3::{S3Backend, S3Config};
use crate::traits::Backend;

/// Backend settings, tagged by backend type.
///
/// ```toml
/// [[backends]]
/// name = "local"
/// type = "filesystem"
/// base_dir = "/var/lib/cask"
/// url_prefix = "https://files.example.com"
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendConfig {
    Memory,
    Filesystem {
        base_dir: PathBuf,
        #[serde(default)]
        url_prefix: Option<String>,
    },
    S3(S3Config),
}

impl BackendConfig {
    /// Instantiate the backend. S3 backends connect (and optionally create
    /// their bucket) here.
    pub async fn build(&self) -> StoreResult<Arc<dyn Backend>> {
        Ok(match self {
            Self::Memory => Arc::new(MemoryBackend::new()),
            Self::Filesystem {
                base_dir,
                url_prefix,
            } => {
                let mut backend = FsBackend::new(base_dir.clone());
                if let Some(prefix) = url_prefix {
                    backend = backend.with_url_prefix(prefix.clone());
                }
                Arc::new(backend)
            }
            Self::S3(config) => Arc::new(S3Backend::connect(config.clone()).await?),
        })
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Filesystem { .. } => "filesystem",
            Self::S3(_) => "s3",
        }
    }
}

/// A backend configuration together with its registry name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedBackend {
    pub name: String,
    #[serde(flatten)]
    pub backend: BackendConfig,
}

impl NamedBackend {
    pub fn new(name: impl Into<String>, backend: BackendConfig) -> Self {
        Self {
            name: name.into(),
            backend,
        }
    }
}
