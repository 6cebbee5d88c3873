//! Foundation types for Cask.
//!
//! This crate provides the identifiers, entities, and error kinds shared by
//! every other Cask crate.
//!
//! # Key Types
//!
//! - [`Content`] -- a logical piece of data, possibly derived from a parent
//! - [`DerivedContent`] -- the parent → child relationship record
//! - [`ContentMetadata`] -- per-content descriptive metadata (never inherited)
//! - [`Object`] -- a physical blob realizing a content on one backend
//! - [`ObjectMetadata`] -- backend-reported facts about an object's bytes
//! - [`ErrorKind`] -- coarse error classification preserved across crates

pub mod content;
pub mod error;
pub mod id;
pub mod object;

pub use content::{
    Attributes, Content, ContentMetadata, ContentStatus, DerivationKind, DerivedContent,
    NewContent, NewDerivedContent, MAX_DERIVATION_DEPTH,
};
pub use error::{ErrorKind, TypeError};
pub use id::{ContentId, ObjectId, OwnerId, TenantId};
pub use object::{Object, ObjectMetadata, ObjectStatus};
