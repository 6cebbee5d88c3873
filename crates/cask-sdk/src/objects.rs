use std::sync::Arc;

use cask_keys::{KeyContext, KeyGenerator};
use cask_repo::Repository;
use cask_store::{Backend, BackendRegistry, ObjectMeta, ObjectReader, UploadParams};
use cask_types::{
    Content, ContentId, ContentStatus, DerivationKind, Object, ObjectId, ObjectMetadata,
    ObjectStatus,
};
use chrono::Utc;
use serde_json::Value;
use tokio::io::AsyncRead;
use tracing::{debug, info, warn};

use crate::error::{SdkError, SdkResult};

/// Moves object bytes between the repository's records and the storage
/// backends.
///
/// Keys are generated once, at object creation, and persisted on the
/// record; later calls never regenerate them.
#[derive(Clone)]
pub struct ObjectManager {
    repo: Arc<dyn Repository>,
    registry: Arc<BackendRegistry>,
    keys: Arc<dyn KeyGenerator>,
}

impl std::fmt::Debug for ObjectManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectManager")
            .field("registry", &self.registry)
            .field("keys", &self.keys)
            .finish_non_exhaustive()
    }
}

impl ObjectManager {
    pub fn new(
        repo: Arc<dyn Repository>,
        registry: Arc<BackendRegistry>,
        keys: Arc<dyn KeyGenerator>,
    ) -> Self {
        Self {
            repo,
            registry,
            keys,
        }
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    pub fn key_generator(&self) -> &Arc<dyn KeyGenerator> {
        &self.keys
    }

    fn require_content(&self, id: ContentId) -> SdkResult<Content> {
        self.repo
            .get_content(id)?
            .ok_or(SdkError::ContentNotFound(id))
    }

    pub fn get_object(&self, id: ObjectId) -> SdkResult<Object> {
        self.repo.get_object(id)?.ok_or(SdkError::ObjectNotFound(id))
    }

    fn object_and_backend(&self, id: ObjectId) -> SdkResult<(Object, Arc<dyn Backend>)> {
        let object = self.get_object(id)?;
        let backend = self.registry.get(&object.backend_name)?;
        Ok((object, backend))
    }

    /// Key context for a new object of `content`: original or derived
    /// placement, the derivation type/variant, and the tenant.
    fn key_context(&self, content: &Content, file_name: Option<&str>) -> SdkResult<KeyContext> {
        let mut ctx = match content.derivation_kind {
            DerivationKind::Original => KeyContext::original(),
            DerivationKind::Derived => match self.repo.derived_relationship(content.id)? {
                Some(record) => KeyContext::derived(record.derivation_type, record.variant),
                None => KeyContext::derived(String::new(), None),
            },
        };
        ctx = ctx.with_tenant(content.tenant_id.to_string());
        if let Some(name) = file_name {
            ctx = ctx.with_file_name(name);
        }
        Ok(ctx)
    }

    /// Transition `object` to `next`, persisting the change.
    fn set_status(&self, object: &mut Object, next: ObjectStatus) -> SdkResult<()> {
        if object.status == next {
            return Ok(());
        }
        if !object.status.can_transition_to(next) {
            return Err(SdkError::InvalidTransition {
                entity: "object",
                id: object.id.to_string(),
                from: object.status.to_string(),
                to: next.to_string(),
            });
        }
        object.status = next;
        object.updated_at = Utc::now();
        self.repo.update_object(object)?;
        Ok(())
    }

    // ---- Lifecycle ----

    /// Register a new, empty object for `content_id` on `backend_name`.
    ///
    /// The key is generated here and persisted before any bytes move. When
    /// `file_name` is `None`, the content metadata's file name is used.
    pub fn create_object(
        &self,
        content_id: ContentId,
        backend_name: &str,
        file_name: Option<&str>,
    ) -> SdkResult<Object> {
        let content = self.require_content(content_id)?;
        self.registry.get(backend_name)?;

        let stored_name = match file_name {
            Some(_) => None,
            None => self
                .repo
                .content_metadata(content_id)?
                .and_then(|m| m.file_name),
        };
        let ctx = self.key_context(&content, file_name.or(stored_name.as_deref()))?;

        let id = ObjectId::new();
        let key = self.keys.generate_key(&content_id, &id, &ctx);
        let object = self
            .repo
            .create_object(&Object::new(id, content_id, backend_name, key))?;
        info!(
            object = %object.id,
            content = %content_id,
            backend = %backend_name,
            key = %object.object_key,
            version = object.version,
            "created object"
        );
        Ok(object)
    }

    /// Write the reader's bytes to the object's backend.
    ///
    /// The object is `uploading` while bytes move. A failed write marks it
    /// `failed`. After the write, metadata is refreshed from the backend;
    /// if that refresh fails the object stays `uploading` and
    /// [`refresh_object_metadata`](Self::refresh_object_metadata) can finish
    /// the job later.
    pub async fn upload_object(
        &self,
        object_id: ObjectId,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        mime_type: Option<&str>,
    ) -> SdkResult<Object> {
        let (mut object, backend) = self.object_and_backend(object_id)?;
        self.set_status(&mut object, ObjectStatus::Uploading)?;

        let mut params = UploadParams::new(object.object_key.clone());
        if let Some(mime) = mime_type {
            params = params.with_mime_type(mime);
        }
        if let Err(err) = backend.upload_with_params(reader, &params).await {
            warn!(object = %object_id, key = %object.object_key, error = %err, "upload failed");
            if let Err(status_err) = self.set_status(&mut object, ObjectStatus::Failed) {
                warn!(object = %object_id, error = %status_err, "could not mark object failed");
            }
            return Err(err.into());
        }

        let meta = backend.object_meta(&object.object_key).await?;
        self.finish_upload(&mut object, meta, mime_type.map(str::to_string))?;
        Ok(object)
    }

    /// Re-read the object's metadata from its backend and persist it.
    ///
    /// Objects whose bytes arrived out of band (a presigned upload) or whose
    /// earlier refresh failed move to `uploaded`.
    pub async fn refresh_object_metadata(&self, object_id: ObjectId) -> SdkResult<ObjectMetadata> {
        let (mut object, backend) = self.object_and_backend(object_id)?;
        let declared = self
            .repo
            .object_metadata(object_id)?
            .and_then(|m| m.mime_type);
        let meta = backend.object_meta(&object.object_key).await?;
        self.finish_upload(&mut object, meta, declared)
    }

    /// Persist the backend's metadata and promote the object and its content
    /// to `uploaded`.
    ///
    /// The content is read, promoted, and written back without holding a
    /// lock across the two repository calls, so a concurrent
    /// `update_content_status` on the same content can be overwritten.
    fn finish_upload(
        &self,
        object: &mut Object,
        meta: ObjectMeta,
        declared_mime: Option<String>,
    ) -> SdkResult<ObjectMetadata> {
        let metadata = ObjectMetadata {
            object_id: object.id,
            size_bytes: meta.size,
            mime_type: meta.content_type.or(declared_mime),
            etag: meta.etag,
            metadata: meta
                .metadata
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect(),
            updated_at: Some(meta.updated_at.unwrap_or_else(Utc::now)),
        };
        self.repo.set_object_metadata(&metadata)?;
        if matches!(object.status, ObjectStatus::Created | ObjectStatus::Uploading) {
            self.set_status(object, ObjectStatus::Uploaded)?;
        }

        let mut content = self.require_content(object.content_id)?;
        if content.status == ContentStatus::Created {
            content.status = ContentStatus::Uploaded;
            content.updated_at = Utc::now();
            self.repo.update_content(&content)?;
        }
        info!(
            object = %object.id,
            size = metadata.size_bytes,
            etag = ?metadata.etag,
            "object uploaded"
        );
        Ok(metadata)
    }

    pub async fn download_object(&self, object_id: ObjectId) -> SdkResult<ObjectReader> {
        let (object, backend) = self.object_and_backend(object_id)?;
        debug!(object = %object_id, key = %object.object_key, "download");
        Ok(backend.download(&object.object_key).await?)
    }

    /// Remove the object's bytes, then its record and metadata.
    ///
    /// Bytes already missing from the backend count as removed. Any other
    /// backend failure leaves the record in place.
    pub async fn delete_object(&self, object_id: ObjectId) -> SdkResult<()> {
        let (object, backend) = self.object_and_backend(object_id)?;
        match backend.delete(&object.object_key).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                warn!(object = %object_id, key = %object.object_key, "object bytes already gone");
            }
            Err(e) => return Err(e.into()),
        }
        self.repo.delete_object(object_id)?;
        info!(object = %object_id, content = %object.content_id, "deleted object");
        Ok(())
    }

    // ---- URLs ----

    pub async fn upload_url(&self, object_id: ObjectId) -> SdkResult<String> {
        let (object, backend) = self.object_and_backend(object_id)?;
        Ok(backend.upload_url(&object.object_key).await?)
    }

    /// Download URL naming the file after the content metadata's file name,
    /// when one is set.
    pub async fn download_url(&self, object_id: ObjectId) -> SdkResult<String> {
        let (object, backend) = self.object_and_backend(object_id)?;
        let file_name = self
            .repo
            .content_metadata(object.content_id)?
            .and_then(|m| m.file_name);
        Ok(backend
            .download_url(&object.object_key, file_name.as_deref())
            .await?)
    }

    pub async fn preview_url(&self, object_id: ObjectId) -> SdkResult<String> {
        let (object, backend) = self.object_and_backend(object_id)?;
        Ok(backend.preview_url(&object.object_key).await?)
    }

    // ---- Queries ----

    /// Objects of `content_id`, ordered by version.
    pub fn objects_for_content(&self, content_id: ContentId) -> SdkResult<Vec<Object>> {
        self.require_content(content_id)?;
        Ok(self.repo.objects_by_content(content_id)?)
    }

    pub fn object_metadata(&self, object_id: ObjectId) -> SdkResult<Option<ObjectMetadata>> {
        Ok(self.repo.object_metadata(object_id)?)
    }

    /// Move an object to `status`. Setting the current status is a no-op.
    pub fn update_object_status(&self, object_id: ObjectId, status: ObjectStatus) -> SdkResult<Object> {
        let mut object = self.get_object(object_id)?;
        self.set_status(&mut object, status)?;
        Ok(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cask_keys::LegacyKeyGenerator;
    use cask_repo::InMemoryRepository;
    use cask_store::{read_to_vec, MemoryBackend};
    use cask_types::{ContentMetadata, ErrorKind, NewContent, OwnerId, TenantId};

    struct Fixture {
        repo: Arc<InMemoryRepository>,
        backend: Arc<MemoryBackend>,
        manager: ObjectManager,
    }

    fn fixture() -> Fixture {
        let repo = Arc::new(InMemoryRepository::new());
        let backend = Arc::new(MemoryBackend::new());
        let mut registry = BackendRegistry::new();
        registry.register("memory", backend.clone()).unwrap();
        let manager = ObjectManager::new(
            repo.clone(),
            Arc::new(registry),
            Arc::new(LegacyKeyGenerator),
        );
        Fixture {
            repo,
            backend,
            manager,
        }
    }

    fn content(repo: &InMemoryRepository) -> Content {
        let content = Content::root(NewContent::new(TenantId::new(), OwnerId::new(), "doc"));
        repo.create_content(&content).unwrap();
        content
    }

    #[tokio::test]
    async fn create_object_persists_key_before_io() {
        let f = fixture();
        let c = content(&f.repo);
        let object = f.manager.create_object(c.id, "memory", Some("a b.txt")).unwrap();

        assert_eq!(object.status, ObjectStatus::Created);
        assert_eq!(object.version, 1);
        assert_eq!(object.object_key, format!("{}/{}/a_b.txt", c.id, object.id));
        assert!(f.backend.is_empty());
    }

    #[tokio::test]
    async fn create_object_falls_back_to_metadata_file_name() {
        let f = fixture();
        let c = content(&f.repo);
        f.repo
            .set_content_metadata(&ContentMetadata::new(c.id).with_file_name("report.pdf"))
            .unwrap();
        let object = f.manager.create_object(c.id, "memory", None).unwrap();
        assert!(object.object_key.ends_with("/report.pdf"));
    }

    #[tokio::test]
    async fn create_object_requires_content_and_backend() {
        let f = fixture();
        let err = f
            .manager
            .create_object(ContentId::new(), "memory", None)
            .unwrap_err();
        assert!(matches!(err, SdkError::ContentNotFound(_)));

        let c = content(&f.repo);
        let err = f.manager.create_object(c.id, "nowhere", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(f.repo.object_count(), 0);
    }

    #[tokio::test]
    async fn upload_records_metadata_and_statuses() {
        let f = fixture();
        let c = content(&f.repo);
        let object = f.manager.create_object(c.id, "memory", None).unwrap();

        let mut reader: &[u8] = b"Hello, World!";
        let uploaded = f
            .manager
            .upload_object(object.id, &mut reader, Some("text/plain"))
            .await
            .unwrap();
        assert_eq!(uploaded.status, ObjectStatus::Uploaded);

        let meta = f.manager.object_metadata(object.id).unwrap().unwrap();
        assert_eq!(meta.size_bytes, 13);
        assert_eq!(meta.mime_type.as_deref(), Some("text/plain"));
        assert!(meta.etag.is_some());

        let stored = f.repo.get_content(c.id).unwrap().unwrap();
        assert_eq!(stored.status, ContentStatus::Uploaded);

        let mut download = f.manager.download_object(object.id).await.unwrap();
        assert_eq!(read_to_vec(&mut download).await.unwrap(), b"Hello, World!");
    }

    #[tokio::test]
    async fn delete_tolerates_missing_bytes() {
        let f = fixture();
        let c = content(&f.repo);
        let object = f.manager.create_object(c.id, "memory", None).unwrap();
        // Never uploaded: the backend has nothing under the key.
        f.manager.delete_object(object.id).await.unwrap();
        assert!(f.repo.get_object(object.id).unwrap().is_none());
    }

    #[tokio::test]
    async fn memory_urls_are_unsupported() {
        let f = fixture();
        let c = content(&f.repo);
        let object = f.manager.create_object(c.id, "memory", None).unwrap();
        let err = f.manager.download_url(object.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);
    }

    #[test]
    fn status_transitions_are_validated() {
        let f = fixture();
        let c = content(&f.repo);
        let object = f.manager.create_object(c.id, "memory", None).unwrap();

        let same = f
            .manager
            .update_object_status(object.id, ObjectStatus::Created)
            .unwrap();
        assert_eq!(same.status, ObjectStatus::Created);

        let err = f
            .manager
            .update_object_status(object.id, ObjectStatus::Processed)
            .unwrap_err();
        assert!(matches!(err, SdkError::InvalidTransition { .. }));
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        f.manager
            .update_object_status(object.id, ObjectStatus::Deleted)
            .unwrap();
        assert!(f
            .manager
            .update_object_status(object.id, ObjectStatus::Uploading)
            .is_err());
    }

    #[test]
    fn objects_for_content_ordered_by_version() {
        let f = fixture();
        let c = content(&f.repo);
        for _ in 0..3 {
            f.manager.create_object(c.id, "memory", None).unwrap();
        }
        let versions: Vec<u32> = f
            .manager
            .objects_for_content(c.id)
            .unwrap()
            .iter()
            .map(|o| o.version)
            .collect();
        assert_eq!(versions, vec![1, 2, 3]);
    }
}
