//! In-memory repository for testing and ephemeral use.
//!
//! [`InMemoryRepository`] keeps every table in one `HashMap`-backed state
//! behind a single `RwLock`, so multi-record writes (a derived content and
//! its relationship record, an object and its version) are atomic.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use cask_types::{
    Content, ContentId, ContentMetadata, DerivedContent, Object, ObjectId, ObjectMetadata,
    MAX_DERIVATION_DEPTH,
};
use tracing::debug;

use crate::error::{RepoError, RepoResult};
use crate::filter::{page, ContentFilter, DerivedContentFilter};
use crate::traits::Repository;

#[derive(Debug, Default)]
struct State {
    contents: HashMap<ContentId, Content>,
    content_metadata: HashMap<ContentId, ContentMetadata>,
    /// Keyed by child id: a child has exactly one parent.
    relationships: HashMap<ContentId, DerivedContent>,
    objects: HashMap<ObjectId, Object>,
    object_metadata: HashMap<ObjectId, ObjectMetadata>,
    /// Highest version handed out per content. Survives object deletion so
    /// versions are never reused.
    last_version: HashMap<ContentId, u32>,
}

impl State {
    fn require_content(&self, id: ContentId) -> RepoResult<&Content> {
        self.contents
            .get(&id)
            .ok_or(RepoError::ContentNotFound { id })
    }
}

/// An in-memory implementation of [`Repository`].
///
/// Data is lost when the repository is dropped.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    state: RwLock<State>,
}

impl InMemoryRepository {
    /// Create a new empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RepoResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|e| RepoError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> RepoResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|e| RepoError::LockPoisoned(e.to_string()))
    }

    /// Number of stored contents.
    pub fn content_count(&self) -> usize {
        self.read().map(|s| s.contents.len()).unwrap_or(0)
    }

    /// Number of stored objects.
    pub fn object_count(&self) -> usize {
        self.read().map(|s| s.objects.len()).unwrap_or(0)
    }
}

fn check_child(state: &State, child: &Content, parent_id: ContentId) -> RepoResult<()> {
    if child.parent_id != Some(parent_id) {
        return Err(RepoError::InvalidDerivation(format!(
            "content {} does not name {} as its parent",
            child.id, parent_id
        )));
    }
    let parent = state.require_content(parent_id)?;
    let level = parent.derivation_level + 1;
    if level > MAX_DERIVATION_DEPTH {
        return Err(RepoError::DepthExceeded {
            parent: parent_id,
            level,
        });
    }
    if child.derivation_level != level {
        return Err(RepoError::InvalidDerivation(format!(
            "content {} has level {}, expected {}",
            child.id, child.derivation_level, level
        )));
    }
    Ok(())
}

impl Repository for InMemoryRepository {
    fn create_content(&self, content: &Content) -> RepoResult<()> {
        let mut state = self.write()?;
        if state.contents.contains_key(&content.id) {
            return Err(RepoError::ContentExists { id: content.id });
        }
        state.contents.insert(content.id, content.clone());
        debug!(content = %content.id, "content created");
        Ok(())
    }

    fn get_content(&self, id: ContentId) -> RepoResult<Option<Content>> {
        Ok(self.read()?.contents.get(&id).cloned())
    }

    fn update_content(&self, content: &Content) -> RepoResult<()> {
        let mut state = self.write()?;
        let stored = state
            .contents
            .get_mut(&content.id)
            .ok_or(RepoError::ContentNotFound { id: content.id })?;
        let mut updated = content.clone();
        updated.parent_id = stored.parent_id;
        updated.derivation_level = stored.derivation_level;
        updated.derivation_kind = stored.derivation_kind;
        updated.created_at = stored.created_at;
        *stored = updated;
        Ok(())
    }

    fn delete_content(&self, id: ContentId) -> RepoResult<bool> {
        let mut state = self.write()?;
        if state.contents.remove(&id).is_none() {
            return Ok(false);
        }
        state.content_metadata.remove(&id);
        state.relationships.remove(&id);
        state.last_version.remove(&id);
        debug!(content = %id, "content deleted");
        Ok(true)
    }

    fn list_contents(&self, filter: &ContentFilter) -> RepoResult<Vec<Content>> {
        let state = self.read()?;
        let mut contents: Vec<Content> = state
            .contents
            .values()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect();
        contents.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(page(contents, filter.offset, filter.limit))
    }

    fn contents_by_parent(&self, parent_id: ContentId) -> RepoResult<Vec<Content>> {
        let state = self.read()?;
        Ok(state
            .contents
            .values()
            .filter(|c| c.parent_id == Some(parent_id))
            .cloned()
            .collect())
    }

    fn set_content_metadata(&self, metadata: &ContentMetadata) -> RepoResult<()> {
        let mut state = self.write()?;
        state.require_content(metadata.content_id)?;
        state
            .content_metadata
            .insert(metadata.content_id, metadata.clone());
        Ok(())
    }

    fn content_metadata(&self, id: ContentId) -> RepoResult<Option<ContentMetadata>> {
        Ok(self.read()?.content_metadata.get(&id).cloned())
    }

    fn create_derived_content(&self, child: &Content, record: &DerivedContent) -> RepoResult<()> {
        if record.content_id != child.id {
            return Err(RepoError::InvalidDerivation(format!(
                "record names child {}, got content {}",
                record.content_id, child.id
            )));
        }
        let mut state = self.write()?;
        check_child(&state, child, record.parent_id)?;
        if state.contents.contains_key(&child.id) {
            return Err(RepoError::ContentExists { id: child.id });
        }
        state.contents.insert(child.id, child.clone());
        state.relationships.insert(child.id, record.clone());
        debug!(
            content = %child.id,
            parent = %record.parent_id,
            level = child.derivation_level,
            derivation_type = %record.derivation_type,
            "derived content created"
        );
        Ok(())
    }

    fn create_derived_relationship(&self, record: &DerivedContent) -> RepoResult<()> {
        let mut state = self.write()?;
        let child = state.require_content(record.content_id)?;
        check_child(&state, child, record.parent_id)?;
        if state.relationships.contains_key(&record.content_id) {
            return Err(RepoError::RelationshipExists {
                child: record.content_id,
            });
        }
        state.relationships.insert(record.content_id, record.clone());
        Ok(())
    }

    fn derived_relationship(&self, child_id: ContentId) -> RepoResult<Option<DerivedContent>> {
        Ok(self.read()?.relationships.get(&child_id).cloned())
    }

    fn list_derived_content(
        &self,
        filter: &DerivedContentFilter,
    ) -> RepoResult<Vec<DerivedContent>> {
        let state = self.read()?;
        let mut records: Vec<DerivedContent> = state
            .relationships
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then(a.content_id.cmp(&b.content_id))
        });
        Ok(page(records, filter.offset, filter.limit))
    }

    fn derived_content_tree(
        &self,
        root_id: ContentId,
        max_depth: u32,
    ) -> RepoResult<Vec<DerivedContent>> {
        let state = self.read()?;
        state.require_content(root_id)?;

        let mut children: HashMap<ContentId, Vec<&DerivedContent>> = HashMap::new();
        for record in state.relationships.values() {
            children.entry(record.parent_id).or_default().push(record);
        }

        let mut result = Vec::new();
        let mut visited = HashSet::from([root_id]);
        let mut queue = VecDeque::from([(root_id, 0u32)]);
        while let Some((id, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            for record in children.get(&id).into_iter().flatten() {
                if visited.insert(record.content_id) {
                    result.push((*record).clone());
                    queue.push_back((record.content_id, depth + 1));
                }
            }
        }
        Ok(result)
    }

    fn create_object(&self, object: &Object) -> RepoResult<Object> {
        let mut state = self.write()?;
        state.require_content(object.content_id)?;
        if state.objects.contains_key(&object.id) {
            return Err(RepoError::ObjectExists { id: object.id });
        }
        let counter = state.last_version.entry(object.content_id).or_insert(0);
        *counter += 1;
        let version = *counter;
        let mut stored = object.clone();
        stored.version = version;
        state.objects.insert(stored.id, stored.clone());
        debug!(object = %stored.id, content = %stored.content_id, version, "object created");
        Ok(stored)
    }

    fn get_object(&self, id: ObjectId) -> RepoResult<Option<Object>> {
        Ok(self.read()?.objects.get(&id).cloned())
    }

    fn update_object(&self, object: &Object) -> RepoResult<()> {
        let mut state = self.write()?;
        let stored = state
            .objects
            .get_mut(&object.id)
            .ok_or(RepoError::ObjectNotFound { id: object.id })?;
        let mut updated = object.clone();
        updated.version = stored.version;
        updated.created_at = stored.created_at;
        *stored = updated;
        Ok(())
    }

    fn delete_object(&self, id: ObjectId) -> RepoResult<bool> {
        let mut state = self.write()?;
        if state.objects.remove(&id).is_none() {
            return Ok(false);
        }
        state.object_metadata.remove(&id);
        debug!(object = %id, "object deleted");
        Ok(true)
    }

    fn objects_by_content(&self, content_id: ContentId) -> RepoResult<Vec<Object>> {
        let state = self.read()?;
        let mut objects: Vec<Object> = state
            .objects
            .values()
            .filter(|o| o.content_id == content_id)
            .cloned()
            .collect();
        objects.sort_by_key(|o| o.version);
        Ok(objects)
    }

    fn set_object_metadata(&self, metadata: &ObjectMetadata) -> RepoResult<()> {
        let mut state = self.write()?;
        if !state.objects.contains_key(&metadata.object_id) {
            return Err(RepoError::ObjectNotFound {
                id: metadata.object_id,
            });
        }
        state
            .object_metadata
            .insert(metadata.object_id, metadata.clone());
        Ok(())
    }

    fn object_metadata(&self, id: ObjectId) -> RepoResult<Option<ObjectMetadata>> {
        Ok(self.read()?.object_metadata.get(&id).cloned())
    }
}
