use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::fs;
use tempfile::TempPath;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::traits::{Backend, ObjectMeta, ObjectReader, UploadParams};

const HASH_CHUNK: usize = 64 * 1024;

/// Backend that files objects under a local base directory.
///
/// An object with key `k` lives at `{base_dir}/k`. Intermediate directories
/// are created on upload and pruned again on delete once empty. No sidecar
/// files are written, so the content type is not recorded.
///
/// Each upload writes its own hidden `.{name}.XXXXXX.partial` sibling and
/// renames it into place, so readers never observe a half-written object
/// and concurrent uploads to one key resolve as last-writer-wins.
#[derive(Debug, Clone)]
pub struct FsBackend {
    base_dir: PathBuf,
    url_prefix: Option<String>,
}

impl FsBackend {
    /// Create a backend rooted at `base_dir`. The directory is created
    /// lazily on first upload.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            url_prefix: None,
        }
    }

    /// Enable URL issuance under `prefix` (e.g. `https://files.example.com`).
    pub fn with_url_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix: String = prefix.into();
        self.url_prefix = Some(prefix.trim_end_matches('/').to_string());
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Map a key onto a path inside the base directory.
    fn resolve(&self, key: &str) -> StoreResult<PathBuf> {
        let invalid = |reason: &str| StoreError::InvalidKey {
            key: key.to_string(),
            reason: reason.to_string(),
        };
        if key.is_empty() {
            return Err(invalid("key is empty"));
        }
        if key.starts_with('/') || key.starts_with('\\') {
            return Err(invalid("key must be relative"));
        }
        if key.split('/').any(str::is_empty) {
            return Err(invalid("key has an empty path component"));
        }
        let rel = Path::new(key);
        for component in rel.components() {
            match component {
                Component::Normal(_) => {}
                Component::ParentDir => return Err(invalid("key must not contain '..'")),
                Component::CurDir => return Err(invalid("key must not contain '.'")),
                Component::RootDir | Component::Prefix(_) => {
                    return Err(invalid("key must be relative"))
                }
            }
        }
        Ok(self.base_dir.join(rel))
    }

    fn url(&self, operation: &'static str, route: &str, key: &str) -> StoreResult<String> {
        self.resolve(key)?;
        let prefix = self.url_prefix.as_deref().ok_or(StoreError::Unsupported {
            backend: "filesystem",
            operation,
        })?;
        Ok(format!("{prefix}/{route}/{key}"))
    }

    /// Remove empty directories from `start` upward, stopping before the
    /// base directory or at the first directory that cannot be removed.
    async fn prune_empty_parents(&self, start: Option<&Path>) {
        let mut current = start;
        while let Some(dir) = current {
            if dir == self.base_dir || !dir.starts_with(&self.base_dir) {
                break;
            }
            if fs::remove_dir(dir).await.is_err() {
                break;
            }
            current = dir.parent();
        }
    }
}

/// Create a uniquely named partial file next to `path`. The returned
/// [`TempPath`] removes the file when dropped unless it is persisted.
async fn create_partial(path: &Path) -> std::io::Result<(fs::File, TempPath)> {
    let dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let prefix = format!(
        ".{}.",
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    );
    let (file, tmp) = tokio::task::spawn_blocking(move || {
        tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".partial")
            .tempfile_in(&dir)
            .map(tempfile::NamedTempFile::into_parts)
    })
    .await
    .map_err(std::io::Error::other)??;
    Ok((fs::File::from_std(file), tmp))
}

async fn persist_partial(tmp: TempPath, path: &Path) -> std::io::Result<()> {
    let dest = path.to_path_buf();
    tokio::task::spawn_blocking(move || tmp.persist(&dest).map_err(|e| e.error))
        .await
        .map_err(std::io::Error::other)?
}

async fn hash_file(path: &Path) -> std::io::Result<String> {
    let mut file = fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_CHUNK];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[async_trait]
impl Backend for FsBackend {
    fn kind(&self) -> &'static str {
        "filesystem"
    }

    async fn upload_with_params(
        &self,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        params: &UploadParams,
    ) -> StoreResult<()> {
        let key = params.key.as_str();
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io("upload", key, e))?;
        }

        // A concurrent delete may prune the parent between create_dir_all
        // and create; retry once.
        let (mut file, tmp) = match create_partial(&path).await {
            Ok(partial) => partial,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)
                        .await
                        .map_err(|e| StoreError::io("upload", key, e))?;
                }
                create_partial(&path)
                    .await
                    .map_err(|e| StoreError::io("upload", key, e))?
            }
            Err(e) => return Err(StoreError::io("upload", key, e)),
        };

        let written = async {
            let n = tokio::io::copy(reader, &mut file).await?;
            file.flush().await?;
            file.sync_all().await?;
            Ok::<u64, std::io::Error>(n)
        }
        .await;
        drop(file);

        // Dropping `tmp` on either error path removes the partial file.
        let size = match written {
            Ok(n) => n,
            Err(e) => {
                return Err(StoreError::Io {
                    operation: "upload",
                    key: key.to_string(),
                    source: e,
                });
            }
        };

        if let Err(e) = persist_partial(tmp, &path).await {
            warn!(key, error = %e, "failed to move partial upload into place");
            return Err(StoreError::Io {
                operation: "upload",
                key: key.to_string(),
                source: e,
            });
        }
        debug!(key, size, "filesystem upload");
        Ok(())
    }

    async fn download(&self, key: &str) -> StoreResult<ObjectReader> {
        let path = self.resolve(key)?;
        let file = fs::File::open(&path)
            .await
            .map_err(|e| StoreError::io("download", key, e))?;
        let meta = file
            .metadata()
            .await
            .map_err(|e| StoreError::io("download", key, e))?;
        if !meta.is_file() {
            return Err(StoreError::NotFound {
                key: key.to_string(),
            });
        }
        Ok(Box::new(file))
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let path = self.resolve(key)?;
        fs::remove_file(&path)
            .await
            .map_err(|e| StoreError::io("delete", key, e))?;
        self.prune_empty_parents(path.parent()).await;
        debug!(key, "filesystem delete");
        Ok(())
    }

    async fn object_meta(&self, key: &str) -> StoreResult<ObjectMeta> {
        let path = self.resolve(key)?;
        let meta = fs::metadata(&path)
            .await
            .map_err(|e| StoreError::io("stat", key, e))?;
        if !meta.is_file() {
            return Err(StoreError::NotFound {
                key: key.to_string(),
            });
        }
        let etag = hash_file(&path)
            .await
            .map_err(|e| StoreError::io("stat", key, e))?;
        Ok(ObjectMeta {
            key: key.to_string(),
            size: meta.len(),
            content_type: None,
            updated_at: meta.modified().ok().map(DateTime::<Utc>::from),
            etag: Some(etag),
            metadata: Default::default(),
        })
    }

    async fn upload_url(&self, key: &str) -> StoreResult<String> {
        self.url("upload_url", "upload", key)
    }

    async fn download_url(&self, key: &str, file_name: Option<&str>) -> StoreResult<String> {
        let url = self.url("download_url", "download", key)?;
        match file_name.filter(|n| !n.is_empty()) {
            Some(name) => {
                let query = url::form_urlencoded::Serializer::new(String::new())
                    .append_pair("filename", name)
                    .finish();
                Ok(format!("{url}?{query}"))
            }
            None => Ok(url),
        }
    }

    async fn preview_url(&self, key: &str) -> StoreResult<String> {
        self.url("preview_url", "preview", key)
    }
}
