use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::KeyResult;
use crate::generator::KeyGenerator;
use crate::strategies::{
    GitLikeKeyGenerator, HashedKeyGenerator, LegacyKeyGenerator, TenantAwareKeyGenerator,
    DEFAULT_SHARD_LENGTH,
};

/// Declarative choice of key strategy, as written in configuration files.
///
/// ```toml
/// [key_strategy]
/// type = "tenant_aware"
/// inner = { type = "git_like", shard_length = 2 }
/// ```
///
/// Custom strategies are code-only and cannot be configured here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KeyStrategy {
    Legacy,
    GitLike {
        #[serde(default = "default_shard_length")]
        shard_length: usize,
    },
    Hashed {
        #[serde(default = "default_shard_length")]
        shard_length: usize,
    },
    TenantAware {
        inner: Box<KeyStrategy>,
    },
}

fn default_shard_length() -> usize {
    DEFAULT_SHARD_LENGTH
}

impl Default for KeyStrategy {
    fn default() -> Self {
        Self::GitLike {
            shard_length: DEFAULT_SHARD_LENGTH,
        }
    }
}

impl KeyStrategy {
    /// Instantiate the configured generator.
    pub fn build(&self) -> KeyResult<Arc<dyn KeyGenerator>> {
        Ok(match self {
            Self::Legacy => Arc::new(LegacyKeyGenerator),
            Self::GitLike { shard_length } => Arc::new(GitLikeKeyGenerator::new(*shard_length)?),
            Self::Hashed { shard_length } => Arc::new(HashedKeyGenerator::new(*shard_length)?),
            Self::TenantAware { inner } => Arc::new(TenantAwareKeyGenerator::new(inner.build()?)),
        })
    }
}
