//! Object key generation for Cask.
//!
//! A key generator maps `(content id, object id, context)` to the string a
//! storage backend files the object's bytes under. The strategy decides
//! physical placement: flat per-content folders, git-style shard
//! directories, tenant namespaces, or content-addressed hashes.
//!
//! # Strategies
//!
//! - [`LegacyKeyGenerator`] -- `{content}/{object}[/{file}]`, no sharding
//! - [`GitLikeKeyGenerator`] -- shard directories from the object id
//! - [`HashedKeyGenerator`] -- shard directories from `SHA-256(content || object)`
//! - [`TenantAwareKeyGenerator`] -- `tenants/{tenant}/` prefix over any strategy
//! - [`CustomKeyGenerator`] -- caller-supplied closure
//!
//! Changing strategy does not move existing objects: keys are persisted on
//! each object when it is created.

pub mod config;
pub mod error;
pub mod generator;
pub mod sanitize;
pub mod strategies;

pub use config::KeyStrategy;
pub use error::{KeyError, KeyResult};
pub use generator::{KeyContext, KeyGenerator, Placement};
pub use sanitize::{sanitize_filename, sanitize_path_component};
pub use strategies::{
    CustomKeyGenerator, GitLikeKeyGenerator, HashedKeyGenerator, LegacyKeyGenerator,
    TenantAwareKeyGenerator, DEFAULT_SHARD_LENGTH, MAX_SHARD_LENGTH,
};
