//! High-level SDK for Cask.
//!
//! [`ContentService`] is the main entry point for applications embedding
//! Cask: it creates contents and derived contents, attaches metadata, and
//! moves object bytes through the configured storage backends via the
//! [`ObjectManager`].

pub mod config;
pub mod error;
pub mod objects;
pub mod service;

pub use config::{CaskConfig, DEFAULT_BACKEND_NAME};
pub use error::{SdkError, SdkResult};
pub use objects::ObjectManager;
pub use service::ContentService;

// Re-export key types
pub use cask_keys::{KeyContext, KeyGenerator, KeyStrategy};
pub use cask_repo::{ContentFilter, DerivedContentFilter, InMemoryRepository, Repository};
pub use cask_store::{Backend, BackendConfig, BackendRegistry, NamedBackend, ObjectReader};
pub use cask_types::{
    Content, ContentId, ContentMetadata, ContentStatus, DerivationKind, DerivedContent, ErrorKind,
    NewContent, NewDerivedContent, Object, ObjectId, ObjectMetadata, ObjectStatus, OwnerId,
    TenantId, MAX_DERIVATION_DEPTH,
};
