use std::sync::Arc;

use cask_graph::DerivationGraph;
use cask_keys::KeyGenerator;
use cask_repo::{ContentFilter, DerivedContentFilter, InMemoryRepository, Repository};
use cask_store::{BackendRegistry, ObjectReader};
use cask_types::{
    Content, ContentId, ContentMetadata, ContentStatus, DerivedContent, NewContent,
    NewDerivedContent, Object, ObjectId, ObjectMetadata, ObjectStatus,
};
use chrono::Utc;
use tokio::io::AsyncRead;
use tracing::info;

use crate::config::CaskConfig;
use crate::error::{SdkError, SdkResult};
use crate::objects::ObjectManager;

/// High-level Cask API.
///
/// Ties the derivation graph, the object manager, and the repository
/// together behind one facade.
#[derive(Clone)]
pub struct ContentService {
    repo: Arc<dyn Repository>,
    graph: DerivationGraph,
    objects: ObjectManager,
    default_backend: String,
}

impl std::fmt::Debug for ContentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentService")
            .field("objects", &self.objects)
            .field("default_backend", &self.default_backend)
            .finish_non_exhaustive()
    }
}

impl ContentService {
    pub fn new(
        repo: Arc<dyn Repository>,
        registry: Arc<BackendRegistry>,
        keys: Arc<dyn KeyGenerator>,
        default_backend: impl Into<String>,
    ) -> Self {
        Self {
            graph: DerivationGraph::new(repo.clone()),
            objects: ObjectManager::new(repo.clone(), registry, keys),
            repo,
            default_backend: default_backend.into(),
        }
    }

    /// Build backends and the key generator from `config`, over a fresh
    /// in-memory repository.
    pub async fn from_config(config: &CaskConfig) -> SdkResult<Self> {
        config.validate()?;
        let registry = BackendRegistry::from_configs(&config.backends).await?;
        let keys = config.key_strategy.build()?;
        info!(
            backends = ?registry.names(),
            default_backend = %config.default_backend,
            key_strategy = keys.name(),
            "content service ready"
        );
        Ok(Self::new(
            Arc::new(InMemoryRepository::new()),
            Arc::new(registry),
            keys,
            config.default_backend.clone(),
        ))
    }

    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repo
    }

    pub fn graph(&self) -> &DerivationGraph {
        &self.graph
    }

    pub fn objects(&self) -> &ObjectManager {
        &self.objects
    }

    pub fn default_backend(&self) -> &str {
        &self.default_backend
    }

    // ---- Content operations ----

    pub fn create_content(&self, attrs: NewContent) -> SdkResult<Content> {
        Ok(self.graph.create_root(attrs)?)
    }

    pub fn create_derived_content(
        &self,
        parent_id: ContentId,
        request: NewDerivedContent,
    ) -> SdkResult<Content> {
        Ok(self.graph.create_derived(parent_id, request)?)
    }

    pub fn get_content(&self, id: ContentId) -> SdkResult<Content> {
        self.repo.get_content(id)?.ok_or(SdkError::ContentNotFound(id))
    }

    pub fn list_contents(&self, filter: &ContentFilter) -> SdkResult<Vec<Content>> {
        Ok(self.repo.list_contents(filter)?)
    }

    pub fn update_content_status(&self, id: ContentId, status: ContentStatus) -> SdkResult<Content> {
        let mut content = self.get_content(id)?;
        if content.status == status {
            return Ok(content);
        }
        if !content.status.can_transition_to(status) {
            return Err(SdkError::InvalidTransition {
                entity: "content",
                id: id.to_string(),
                from: content.status.to_string(),
                to: status.to_string(),
            });
        }
        content.status = status;
        content.updated_at = Utc::now();
        self.repo.update_content(&content)?;
        Ok(content)
    }

    /// Delete a content, its objects (bytes first), metadata, and its
    /// relationship record.
    ///
    /// Contents with derived children are refused; delete the children
    /// first.
    pub async fn delete_content(&self, id: ContentId) -> SdkResult<()> {
        self.get_content(id)?;
        let children = self.repo.contents_by_parent(id)?;
        if !children.is_empty() {
            return Err(SdkError::HasChildren {
                id,
                children: children.len(),
            });
        }
        for object in self.repo.objects_by_content(id)? {
            self.objects.delete_object(object.id).await?;
        }
        self.repo.delete_content(id)?;
        info!(content = %id, "deleted content");
        Ok(())
    }

    /// Attach metadata to a content, replacing any previous metadata.
    pub fn set_content_metadata(&self, mut metadata: ContentMetadata) -> SdkResult<ContentMetadata> {
        metadata.updated_at = Some(Utc::now());
        self.repo.set_content_metadata(&metadata)?;
        Ok(metadata)
    }

    pub fn get_content_metadata(&self, id: ContentId) -> SdkResult<Option<ContentMetadata>> {
        Ok(self.repo.content_metadata(id)?)
    }

    // ---- Derivation queries ----

    pub fn direct_children(&self, parent_id: ContentId) -> SdkResult<Vec<Content>> {
        Ok(self.graph.direct_children(parent_id)?)
    }

    pub fn content_tree(&self, root_id: ContentId, max_depth: u32) -> SdkResult<Vec<Content>> {
        Ok(self.graph.tree(root_id, max_depth)?)
    }

    pub fn lineage(&self, id: ContentId) -> SdkResult<Vec<Content>> {
        Ok(self.graph.lineage(id)?)
    }

    pub fn derived_relationship(&self, child_id: ContentId) -> SdkResult<Option<DerivedContent>> {
        Ok(self.graph.relationship(child_id)?)
    }

    pub fn list_derived_content(
        &self,
        filter: &DerivedContentFilter,
    ) -> SdkResult<Vec<DerivedContent>> {
        Ok(self.repo.list_derived_content(filter)?)
    }

    // ---- Object operations ----

    /// Create an object on `backend`, or on the default backend when `None`.
    pub fn create_object(
        &self,
        content_id: ContentId,
        backend: Option<&str>,
        file_name: Option<&str>,
    ) -> SdkResult<Object> {
        let backend = backend.unwrap_or(self.default_backend.as_str());
        self.objects.create_object(content_id, backend, file_name)
    }

    pub async fn upload_object(
        &self,
        object_id: ObjectId,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        mime_type: Option<&str>,
    ) -> SdkResult<Object> {
        self.objects.upload_object(object_id, reader, mime_type).await
    }

    pub async fn refresh_object_metadata(&self, object_id: ObjectId) -> SdkResult<ObjectMetadata> {
        self.objects.refresh_object_metadata(object_id).await
    }

    pub async fn download_object(&self, object_id: ObjectId) -> SdkResult<ObjectReader> {
        self.objects.download_object(object_id).await
    }

    pub async fn delete_object(&self, object_id: ObjectId) -> SdkResult<()> {
        self.objects.delete_object(object_id).await
    }

    pub async fn upload_url(&self, object_id: ObjectId) -> SdkResult<String> {
        self.objects.upload_url(object_id).await
    }

    pub async fn download_url(&self, object_id: ObjectId) -> SdkResult<String> {
        self.objects.download_url(object_id).await
    }

    pub async fn preview_url(&self, object_id: ObjectId) -> SdkResult<String> {
        self.objects.preview_url(object_id).await
    }

    pub fn get_object(&self, object_id: ObjectId) -> SdkResult<Object> {
        self.objects.get_object(object_id)
    }

    pub fn objects_for_content(&self, content_id: ContentId) -> SdkResult<Vec<Object>> {
        self.objects.objects_for_content(content_id)
    }

    pub fn object_metadata(&self, object_id: ObjectId) -> SdkResult<Option<ObjectMetadata>> {
        self.objects.object_metadata(object_id)
    }

    pub fn update_object_status(&self, object_id: ObjectId, status: ObjectStatus) -> SdkResult<Object> {
        self.objects.update_object_status(object_id, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cask_types::{ErrorKind, OwnerId, TenantId};

    async fn service() -> ContentService {
        ContentService::from_config(&CaskConfig::default()).await.unwrap()
    }

    fn attrs(name: &str) -> NewContent {
        NewContent::new(TenantId::new(), OwnerId::new(), name)
    }

    #[tokio::test]
    async fn from_default_config() {
        let svc = service().await;
        assert_eq!(svc.default_backend(), "memory");
        assert_eq!(svc.objects().registry().names(), vec!["memory".to_string()]);
        assert_eq!(svc.objects().key_generator().name(), "git_like");
    }

    #[tokio::test]
    async fn content_status_transitions() {
        let svc = service().await;
        let c = svc.create_content(attrs("a")).unwrap();
        let c = svc.update_content_status(c.id, ContentStatus::Uploaded).unwrap();
        assert_eq!(c.status, ContentStatus::Uploaded);
        let err = svc
            .update_content_status(c.id, ContentStatus::Created)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn delete_refused_while_children_exist() {
        let svc = service().await;
        let r = svc.create_content(attrs("r")).unwrap();
        let d = svc
            .create_derived_content(r.id, NewDerivedContent::new(attrs("d"), "preview"))
            .unwrap();

        let err = svc.delete_content(r.id).await.unwrap_err();
        assert!(matches!(err, SdkError::HasChildren { children: 1, .. }));
        assert_eq!(err.kind(), ErrorKind::Conflict);

        svc.delete_content(d.id).await.unwrap();
        svc.delete_content(r.id).await.unwrap();
        assert_eq!(
            svc.get_content(r.id).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[tokio::test]
    async fn metadata_is_timestamped() {
        let svc = service().await;
        let c = svc.create_content(attrs("a")).unwrap();
        let stored = svc
            .set_content_metadata(ContentMetadata::new(c.id).with_tags(["x", "y"]))
            .unwrap();
        assert!(stored.updated_at.is_some());
        assert_eq!(svc.get_content_metadata(c.id).unwrap(), Some(stored));
    }

    #[tokio::test]
    async fn create_object_on_default_backend() {
        let svc = service().await;
        let c = svc.create_content(attrs("a")).unwrap();
        let o = svc.create_object(c.id, None, Some("a.txt")).unwrap();
        assert_eq!(o.backend_name, "memory");
        assert!(o.object_key.starts_with("originals/objects/"));
        assert!(o.object_key.ends_with("_a.txt"));
    }
}
