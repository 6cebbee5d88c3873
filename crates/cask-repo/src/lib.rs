//! Content repository for Cask.
//!
//! The repository persists the metadata side of the system: contents and
//! their derivation records, the objects realizing each content, and the
//! metadata attached to both. Blob bytes never pass through here.
//!
//! # Modules
//!
//! - [`error`] -- Error types for repository operations
//! - [`filter`] -- [`ContentFilter`] and [`DerivedContentFilter`] queries
//! - [`traits`] -- The [`Repository`] trait defining the storage interface
//! - [`memory`] -- In-memory [`InMemoryRepository`] for tests and demos

pub mod error;
pub mod filter;
pub mod memory;
pub mod traits;

pub use error::{RepoError, RepoResult};
pub use filter::{ContentFilter, DerivedContentFilter};
pub use memory::InMemoryRepository;
pub use traits::Repository;
