use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::StoreResult;

/// Streaming handle to an object's bytes.
pub type ObjectReader = Box<dyn AsyncRead + Send + Unpin>;

/// Parameters for [`Backend::upload_with_params`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UploadParams {
    pub key: String,
    /// Content type persisted alongside the bytes where the backend can.
    pub mime_type: Option<String>,
}

impl UploadParams {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            mime_type: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

/// Authoritative facts about a stored object, as reported by its backend.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectMeta {
    pub key: String,
    pub size: u64,
    pub content_type: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub etag: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

/// Uniform blob storage contract implemented by every backend.
///
/// Invariants every implementation upholds:
/// - `download` after a successful `upload` yields identical bytes, and
///   `object_meta` reports their exact length.
/// - Operations on a missing key fail with [`StoreError::NotFound`],
///   including `delete`.
/// - URL issuance fails with [`StoreError::Unsupported`] when the backend
///   has no externally reachable address.
/// - Concurrent uploads to the same key are last-writer-wins.
///
/// Cancellation is cooperative: dropping a returned future abandons the
/// operation at its next await point.
///
/// [`StoreError::NotFound`]: crate::StoreError::NotFound
/// [`StoreError::Unsupported`]: crate::StoreError::Unsupported
#[async_trait]
pub trait Backend: Send + Sync + fmt::Debug {
    /// Short backend type name used in logs and errors.
    fn kind(&self) -> &'static str;

    /// Store the reader's bytes under `key`.
    async fn upload(&self, key: &str, reader: &mut (dyn AsyncRead + Send + Unpin)) -> StoreResult<()> {
        self.upload_with_params(reader, &UploadParams::new(key)).await
    }

    /// Store the reader's bytes, persisting the content type where supported.
    async fn upload_with_params(
        &self,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        params: &UploadParams,
    ) -> StoreResult<()>;

    /// Open the object stored under `key` for reading.
    async fn download(&self, key: &str) -> StoreResult<ObjectReader>;

    /// Remove the object stored under `key`.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Size, content type, modification time, ETag, and custom metadata.
    async fn object_meta(&self, key: &str) -> StoreResult<ObjectMeta>;

    /// URL a client can upload to directly.
    async fn upload_url(&self, key: &str) -> StoreResult<String>;

    /// URL a client can download from directly, optionally naming the file.
    async fn download_url(&self, key: &str, file_name: Option<&str>) -> StoreResult<String>;

    /// URL suitable for inline display.
    async fn preview_url(&self, key: &str) -> StoreResult<String>;
}

/// Drain a reader into memory.
pub async fn read_to_vec<R>(reader: &mut R) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut data = Vec::new();
    reader.read_to_end(&mut data).await?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_params_builder() {
        let params = UploadParams::new("k").with_mime_type("text/plain");
        assert_eq!(params.key, "k");
        assert_eq!(params.mime_type.as_deref(), Some("text/plain"));
    }

    #[tokio::test]
    async fn read_to_vec_drains_reader() {
        let mut reader: ObjectReader = Box::new(std::io::Cursor::new(b"abc".to_vec()));
        assert_eq!(read_to_vec(&mut reader).await.unwrap(), b"abc");
    }
}
