//! The [`Repository`] trait defining the content storage interface.
//!
//! Any backend (in-memory, SQL, document store) implements this trait to
//! persist contents, derivation records, objects, and their metadata.

use cask_types::{
    Content, ContentId, ContentMetadata, DerivedContent, Object, ObjectId, ObjectMetadata,
};

use crate::error::RepoResult;
use crate::filter::{ContentFilter, DerivedContentFilter};

/// Persistence for contents, derivation records, and objects.
///
/// Implementations must be thread-safe (`Send + Sync`). Lookups return
/// `Ok(None)` when the record does not exist; mutations of missing records
/// fail with a not-found error.
pub trait Repository: Send + Sync {
    // ---- Contents ----

    /// Insert a new content. Fails if the id is taken.
    fn create_content(&self, content: &Content) -> RepoResult<()>;

    fn get_content(&self, id: ContentId) -> RepoResult<Option<Content>>;

    /// Replace a stored content. The derivation fields (parent, level, kind)
    /// and creation time of the stored record are kept.
    fn update_content(&self, content: &Content) -> RepoResult<()>;

    /// Remove a content together with its metadata and its own derivation
    /// record. Objects are not touched.
    ///
    /// Returns `Ok(true)` if the content existed.
    fn delete_content(&self, id: ContentId) -> RepoResult<bool>;

    fn list_contents(&self, filter: &ContentFilter) -> RepoResult<Vec<Content>>;

    /// Direct children of `parent_id`.
    fn contents_by_parent(&self, parent_id: ContentId) -> RepoResult<Vec<Content>>;

    /// Create or replace the metadata of an existing content.
    fn set_content_metadata(&self, metadata: &ContentMetadata) -> RepoResult<()>;

    fn content_metadata(&self, id: ContentId) -> RepoResult<Option<ContentMetadata>>;

    // ---- Derivation ----

    /// Insert a derived content and its relationship record in one step.
    ///
    /// The parent must exist and the child's level must be exactly one
    /// below it and within the depth cap. Both checks happen atomically
    /// with the insert.
    fn create_derived_content(&self, child: &Content, record: &DerivedContent) -> RepoResult<()>;

    /// Attach a relationship record to an already stored child.
    fn create_derived_relationship(&self, record: &DerivedContent) -> RepoResult<()>;

    /// The relationship record whose child is `child_id`.
    fn derived_relationship(&self, child_id: ContentId) -> RepoResult<Option<DerivedContent>>;

    fn list_derived_content(&self, filter: &DerivedContentFilter) -> RepoResult<Vec<DerivedContent>>;

    /// Relationship records of every descendant of `root_id` within
    /// `max_depth` hops, breadth-first.
    fn derived_content_tree(
        &self,
        root_id: ContentId,
        max_depth: u32,
    ) -> RepoResult<Vec<DerivedContent>>;

    // ---- Objects ----

    /// Insert an object, assigning the next version for its content.
    ///
    /// Returns the stored record.
    fn create_object(&self, object: &Object) -> RepoResult<Object>;

    fn get_object(&self, id: ObjectId) -> RepoResult<Option<Object>>;

    /// Replace a stored object. Version and creation time are kept.
    fn update_object(&self, object: &Object) -> RepoResult<()>;

    /// Remove an object and its metadata.
    ///
    /// Returns `Ok(true)` if the object existed.
    fn delete_object(&self, id: ObjectId) -> RepoResult<bool>;

    /// Objects of `content_id`, ordered by version.
    fn objects_by_content(&self, content_id: ContentId) -> RepoResult<Vec<Object>>;

    /// Create or replace the metadata of an existing object.
    fn set_object_metadata(&self, metadata: &ObjectMetadata) -> RepoResult<()>;

    fn object_metadata(&self, id: ObjectId) -> RepoResult<Option<ObjectMetadata>>;
}
