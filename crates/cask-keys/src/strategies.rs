//! Built-in key generation strategies.

use std::fmt;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use cask_types::{ContentId, ObjectId};

use crate::error::{KeyError, KeyResult};
use crate::generator::{KeyContext, KeyGenerator, Placement};
use crate::sanitize::{sanitize_filename, sanitize_path_component};

/// Default number of hex characters used as the shard directory.
pub const DEFAULT_SHARD_LENGTH: usize = 2;

/// Largest accepted shard length. Object ids have 32 hex characters, so this
/// always leaves a non-empty leaf.
pub const MAX_SHARD_LENGTH: usize = 16;

fn check_shard_length(shard_length: usize) -> KeyResult<usize> {
    if shard_length == 0 || shard_length > MAX_SHARD_LENGTH {
        return Err(KeyError::InvalidShardLength {
            length: shard_length,
            max: MAX_SHARD_LENGTH,
        });
    }
    Ok(shard_length)
}

/// Lay out a sharded key for a hex digest:
/// `{prefix}/objects/{shard}/{leaf}[_{file name}]`.
fn sharded_key(ctx: &KeyContext, hex_id: &str, shard_length: usize) -> String {
    let (shard, leaf) = hex_id.split_at(shard_length.min(hex_id.len()));

    let prefix = match &ctx.placement {
        Placement::Unspecified => String::new(),
        Placement::Original => "originals/".to_string(),
        Placement::Derived {
            derivation_type,
            variant,
        } => {
            let kind = match sanitize_path_component(derivation_type) {
                s if s.is_empty() => "unknown".to_string(),
                s => s,
            };
            let variant = variant
                .as_deref()
                .map(sanitize_path_component)
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| "default".to_string());
            format!("derived/{kind}/{variant}/")
        }
    };

    match ctx.file_name() {
        Some(name) => format!(
            "{prefix}objects/{shard}/{leaf}_{}",
            sanitize_filename(name)
        ),
        None => format!("{prefix}objects/{shard}/{leaf}"),
    }
}

// ---------------------------------------------------------------------------
// Legacy / flat
// ---------------------------------------------------------------------------

/// `{content_id}/{object_id}[/{file name}]` with no sharding.
#[derive(Clone, Copy, Debug, Default)]
pub struct LegacyKeyGenerator;

impl KeyGenerator for LegacyKeyGenerator {
    fn generate_key(&self, content_id: &ContentId, object_id: &ObjectId, ctx: &KeyContext) -> String {
        match ctx.file_name() {
            Some(name) => format!("{content_id}/{object_id}/{}", sanitize_filename(name)),
            None => format!("{content_id}/{object_id}"),
        }
    }

    fn name(&self) -> &str {
        "legacy"
    }
}

// ---------------------------------------------------------------------------
// Git-like sharded
// ---------------------------------------------------------------------------

/// Shards by the leading hex characters of the dash-free object id.
///
/// With the default shard length of 2 the fan-out per directory is bounded
/// by 256 shards.
#[derive(Clone, Copy, Debug)]
pub struct GitLikeKeyGenerator {
    shard_length: usize,
}

impl GitLikeKeyGenerator {
    pub fn new(shard_length: usize) -> KeyResult<Self> {
        Ok(Self {
            shard_length: check_shard_length(shard_length)?,
        })
    }

    pub fn shard_length(&self) -> usize {
        self.shard_length
    }
}

impl Default for GitLikeKeyGenerator {
    fn default() -> Self {
        Self {
            shard_length: DEFAULT_SHARD_LENGTH,
        }
    }
}

impl KeyGenerator for GitLikeKeyGenerator {
    fn generate_key(&self, _content_id: &ContentId, object_id: &ObjectId, ctx: &KeyContext) -> String {
        sharded_key(ctx, &object_id.simple(), self.shard_length)
    }

    fn name(&self) -> &str {
        "git_like"
    }
}

// ---------------------------------------------------------------------------
// Hashed sharded
// ---------------------------------------------------------------------------

/// Shards by `SHA-256(content_id || object_id)`, giving deterministic,
/// content-addressed keys.
#[derive(Clone, Copy, Debug)]
pub struct HashedKeyGenerator {
    shard_length: usize,
}

impl HashedKeyGenerator {
    pub fn new(shard_length: usize) -> KeyResult<Self> {
        Ok(Self {
            shard_length: check_shard_length(shard_length)?,
        })
    }

    /// Lowercase hex digest the key is built from.
    pub fn digest(content_id: &ContentId, object_id: &ObjectId) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content_id.to_string().as_bytes());
        hasher.update(object_id.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl Default for HashedKeyGenerator {
    fn default() -> Self {
        Self {
            shard_length: DEFAULT_SHARD_LENGTH,
        }
    }
}

impl KeyGenerator for HashedKeyGenerator {
    fn generate_key(&self, content_id: &ContentId, object_id: &ObjectId, ctx: &KeyContext) -> String {
        sharded_key(ctx, &Self::digest(content_id, object_id), self.shard_length)
    }

    fn name(&self) -> &str {
        "hashed"
    }
}

// ---------------------------------------------------------------------------
// Tenant-aware
// ---------------------------------------------------------------------------

/// Prefixes another strategy's keys with `tenants/{tenant}/`.
///
/// Keys pass through unchanged when the context carries no tenant.
#[derive(Clone, Debug)]
pub struct TenantAwareKeyGenerator {
    inner: Arc<dyn KeyGenerator>,
}

impl TenantAwareKeyGenerator {
    pub fn new(inner: Arc<dyn KeyGenerator>) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &dyn KeyGenerator {
        self.inner.as_ref()
    }
}

impl KeyGenerator for TenantAwareKeyGenerator {
    fn generate_key(&self, content_id: &ContentId, object_id: &ObjectId, ctx: &KeyContext) -> String {
        let key = self.inner.generate_key(content_id, object_id, ctx);
        match ctx.tenant() {
            Some(tenant) => format!("tenants/{}/{key}", sanitize_path_component(tenant)),
            None => key,
        }
    }

    fn name(&self) -> &str {
        "tenant_aware"
    }
}

// ---------------------------------------------------------------------------
// Custom
// ---------------------------------------------------------------------------

type KeyFn = dyn Fn(&ContentId, &ObjectId, &KeyContext) -> String + Send + Sync;

/// Caller-supplied layout.
///
/// ```
/// use cask_keys::{CustomKeyGenerator, KeyContext, KeyGenerator};
/// use cask_types::{ContentId, ObjectId};
///
/// let generator = CustomKeyGenerator::new("by-content", |c, o, _| format!("c/{c}/{}", o.short_id()));
/// let key = generator.generate_key(&ContentId::new(), &ObjectId::new(), &KeyContext::new());
/// assert!(key.starts_with("c/"));
/// ```
pub struct CustomKeyGenerator {
    name: String,
    func: Box<KeyFn>,
}

impl CustomKeyGenerator {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&ContentId, &ObjectId, &KeyContext) -> String + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Box::new(func),
        }
    }
}

impl fmt::Debug for CustomKeyGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomKeyGenerator")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl KeyGenerator for CustomKeyGenerator {
    fn generate_key(&self, content_id: &ContentId, object_id: &ObjectId, ctx: &KeyContext) -> String {
        (self.func)(content_id, object_id, ctx)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
