use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::io::AsyncRead;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::{read_to_vec, Backend, ObjectMeta, ObjectReader, UploadParams};

#[derive(Clone, Debug)]
struct Entry {
    data: Bytes,
    mime_type: Option<String>,
    etag: String,
    updated_at: DateTime<Utc>,
}

/// In-memory, HashMap-based backend.
///
/// Intended for tests and ephemeral demos. All entries live behind a single
/// `RwLock`; reads share it, writes take it exclusively. Downloads hand out
/// cheap clones of the stored [`Bytes`]. URL issuance always fails since
/// nothing outside the process can reach the data.
#[derive(Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryBackend {
    /// Create a new empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    fn read_entries(&self) -> StoreResult<RwLockReadGuard<'_, HashMap<String, Entry>>> {
        self.entries
            .read()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    fn write_entries(&self) -> StoreResult<RwLockWriteGuard<'_, HashMap<String, Entry>>> {
        self.entries
            .write()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.read_entries().map(|m| m.len()).unwrap_or(0)
    }

    /// Returns `true` if the backend holds no objects.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total bytes across all stored objects.
    pub fn total_bytes(&self) -> u64 {
        self.read_entries()
            .map(|m| m.values().map(|e| e.data.len() as u64).sum())
            .unwrap_or(0)
    }

    /// Sorted list of all stored keys.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .read_entries()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    /// Content type recorded for `key` at upload time.
    pub fn mime_type(&self, key: &str) -> StoreResult<Option<String>> {
        let entries = self.read_entries()?;
        let entry = entries.get(key).ok_or_else(|| StoreError::NotFound {
            key: key.to_string(),
        })?;
        Ok(entry.mime_type.clone())
    }

    fn unsupported(operation: &'static str) -> StoreError {
        StoreError::Unsupported {
            backend: "memory",
            operation,
        }
    }
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("object_count", &self.len())
            .finish()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn upload_with_params(
        &self,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        params: &UploadParams,
    ) -> StoreResult<()> {
        // Drain the reader before taking the lock; the guard is never held
        // across an await point.
        let data = read_to_vec(reader)
            .await
            .map_err(|e| StoreError::io("upload", &params.key, e))?;
        let entry = Entry {
            etag: hex::encode(Sha256::digest(&data)),
            data: Bytes::from(data),
            mime_type: params.mime_type.clone(),
            updated_at: Utc::now(),
        };
        debug!(key = %params.key, size = entry.data.len(), "memory upload");
        self.write_entries()?.insert(params.key.clone(), entry);
        Ok(())
    }

    async fn download(&self, key: &str) -> StoreResult<ObjectReader> {
        let data = self
            .read_entries()?
            .get(key)
            .map(|e| e.data.clone())
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })?;
        Ok(Box::new(std::io::Cursor::new(data)))
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        match self.write_entries()?.remove(key) {
            Some(_) => {
                debug!(key, "memory delete");
                Ok(())
            }
            None => Err(StoreError::NotFound {
                key: key.to_string(),
            }),
        }
    }

    async fn object_meta(&self, key: &str) -> StoreResult<ObjectMeta> {
        let entries = self.read_entries()?;
        let entry = entries.get(key).ok_or_else(|| StoreError::NotFound {
            key: key.to_string(),
        })?;
        Ok(ObjectMeta {
            key: key.to_string(),
            size: entry.data.len() as u64,
            content_type: entry.mime_type.clone(),
            updated_at: Some(entry.updated_at),
            etag: Some(entry.etag.clone()),
            metadata: Default::default(),
        })
    }

    async fn upload_url(&self, _key: &str) -> StoreResult<String> {
        Err(Self::unsupported("upload_url"))
    }

    async fn download_url(&self, _key: &str, _file_name: Option<&str>) -> StoreResult<String> {
        Err(Self::unsupported("download_url"))
    }

    async fn preview_url(&self, _key: &str) -> StoreResult<String> {
        Err(Self::unsupported("preview_url"))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use cask_types::ErrorKind;

    async fn put(backend: &MemoryBackend, key: &str, data: &[u8]) {
        let mut reader = data;
        backend.upload(key, &mut reader).await.unwrap();
    }

    async fn get(backend: &MemoryBackend, key: &str) -> StoreResult<Vec<u8>> {
        let mut reader = backend.download(key).await?;
        Ok(read_to_vec(&mut reader).await.unwrap())
    }

    // -----------------------------------------------------------------------
    // Core operations
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn hello_world_lifecycle() {
        let backend = MemoryBackend::new();
        put(&backend, "k1", b"Hello, World!").await;

        let meta = backend.object_meta("k1").await.unwrap();
        assert_eq!(meta.size, 13);
        assert_eq!(get(&backend, "k1").await.unwrap(), b"Hello, World!");

        backend.delete("k1").await.unwrap();
        let err = get(&backend, "k1").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn upload_overwrites_existing_key() {
        let backend = MemoryBackend::new();
        put(&backend, "k", b"first").await;
        put(&backend, "k", b"second").await;
        assert_eq!(get(&backend, "k").await.unwrap(), b"second");
        assert_eq!(backend.len(), 1);
    }

    #[tokio::test]
    async fn upload_with_params_records_mime_type() {
        let backend = MemoryBackend::new();
        let mut reader: &[u8] = b"<p>hi</p>";
        let params = UploadParams::new("page.html").with_mime_type("text/html");
        backend.upload_with_params(&mut reader, &params).await.unwrap();

        let meta = backend.object_meta("page.html").await.unwrap();
        assert_eq!(meta.content_type.as_deref(), Some("text/html"));
        assert_eq!(backend.mime_type("page.html").unwrap().as_deref(), Some("text/html"));
    }

    #[tokio::test]
    async fn etag_is_sha256_of_bytes() {
        let backend = MemoryBackend::new();
        put(&backend, "k", b"abc").await;
        let meta = backend.object_meta("k").await.unwrap();
        assert_eq!(
            meta.etag.as_deref(),
            Some("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
    }

    #[tokio::test]
    async fn empty_object_roundtrip() {
        let backend = MemoryBackend::new();
        put(&backend, "empty", b"").await;
        assert_eq!(backend.object_meta("empty").await.unwrap().size, 0);
        assert!(get(&backend, "empty").await.unwrap().is_empty());
    }

    // -----------------------------------------------------------------------
    // Missing keys
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn delete_missing_is_not_found() {
        let backend = MemoryBackend::new();
        let err = backend.delete("nope").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn meta_missing_is_not_found() {
        let backend = MemoryBackend::new();
        assert!(backend.object_meta("nope").await.unwrap_err().is_not_found());
    }

    // -----------------------------------------------------------------------
    // URLs
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn url_issuance_is_unsupported() {
        let backend = MemoryBackend::new();
        put(&backend, "k", b"x").await;
        for err in [
            backend.upload_url("k").await.unwrap_err(),
            backend.download_url("k", Some("x.txt")).await.unwrap_err(),
            backend.preview_url("k").await.unwrap_err(),
        ] {
            assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);
        }
    }

    // -----------------------------------------------------------------------
    // Utilities
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn keys_and_totals() {
        let backend = MemoryBackend::new();
        assert!(backend.is_empty());
        put(&backend, "b", b"12345").await;
        put(&backend, "a", b"123456789").await;
        assert_eq!(backend.keys(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(backend.total_bytes(), 14);
        assert!(format!("{backend:?}").contains("object_count"));
    }

    #[tokio::test]
    async fn concurrent_uploads_to_distinct_keys() {
        let backend = Arc::new(MemoryBackend::new());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let backend = Arc::clone(&backend);
                tokio::spawn(async move {
                    let data = format!("payload-{i}").into_bytes();
                    let mut reader = data.as_slice();
                    backend.upload(&format!("k{i}"), &mut reader).await.unwrap();
                })
            })
            .collect();
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(backend.len(), 16);
        assert_eq!(get(&backend, "k7").await.unwrap(), b"payload-7");
    }
}
