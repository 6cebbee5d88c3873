//! Pluggable blob storage for Cask.
//!
//! Every backend implements the async [`Backend`] trait, so the object
//! manager can move bytes without knowing where they land. Backends are
//! addressed by name through a [`BackendRegistry`] built from
//! [`NamedBackend`] configuration entries.
//!
//! # Storage Backends
//!
//! - [`MemoryBackend`] -- `HashMap`-based store for tests and demos
//! - [`FsBackend`] -- files under a local base directory
//! - [`S3Backend`] -- S3-compatible buckets via `aws-sdk-s3`
//!
//! # Design Rules
//!
//! 1. Keys are opaque to backends; placement is decided by the key generator.
//! 2. Operations on missing keys fail with [`StoreError::NotFound`], delete included.
//! 3. Backends without an externally reachable address refuse URL issuance.
//! 4. No lock is held across an `.await`.

pub mod config;
pub mod error;
pub mod fs;
pub mod memory;
pub mod registry;
pub mod s3;
pub mod traits;

pub use config::{BackendConfig, NamedBackend};
pub use error::{StoreError, StoreResult};
pub use fs::FsBackend;
pub use memory::MemoryBackend;
pub use registry::BackendRegistry;
pub use s3::{S3Backend, S3Config, S3Encryption};
pub use traits::{read_to_vec, Backend, ObjectMeta, ObjectReader, UploadParams};
