use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration, ServerSideEncryption};
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::traits::{read_to_vec, Backend, ObjectMeta, ObjectReader, UploadParams};

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_PRESIGN_TTL_SECS: u64 = 3600;

/// Server-side encryption applied to every upload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum S3Encryption {
    Aes256,
    Kms {
        #[serde(default)]
        kms_key_id: Option<String>,
    },
}

/// Connection settings for an S3-compatible bucket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint for S3-compatible services (MinIO, R2, ...).
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Static credentials. When absent the default AWS provider chain is used.
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
    #[serde(default)]
    pub force_path_style: bool,
    /// Create the bucket on connect if it does not exist.
    #[serde(default)]
    pub create_bucket: bool,
    #[serde(default)]
    pub encryption: Option<S3Encryption>,
    #[serde(default = "default_presign_ttl")]
    pub presign_ttl_secs: u64,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_presign_ttl() -> u64 {
    DEFAULT_PRESIGN_TTL_SECS
}

impl S3Config {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            region: default_region(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            force_path_style: false,
            create_bucket: false,
            encryption: None,
            presign_ttl_secs: DEFAULT_PRESIGN_TTL_SECS,
        }
    }

    /// Check the settings for internal consistency without contacting S3.
    pub fn validate(&self) -> StoreResult<()> {
        if self.bucket.trim().is_empty() {
            return Err(StoreError::Config("s3 bucket name is empty".into()));
        }
        if self.region.trim().is_empty() {
            return Err(StoreError::Config("s3 region is empty".into()));
        }
        if self.access_key_id.is_some() != self.secret_access_key.is_some() {
            return Err(StoreError::Config(
                "s3 access_key_id and secret_access_key must be set together".into(),
            ));
        }
        if let Some(S3Encryption::Kms { kms_key_id }) = &self.encryption {
            if kms_key_id.as_deref().map_or(true, str::is_empty) {
                return Err(StoreError::Config(
                    "kms encryption requires kms_key_id".into(),
                ));
            }
        }
        if self.presign_ttl_secs == 0 {
            return Err(StoreError::Config("presign_ttl_secs must be positive".into()));
        }
        Ok(())
    }
}

/// Backend storing objects in an S3-compatible bucket.
///
/// Object keys map one-to-one onto S3 keys. URLs are presigned with the
/// configured TTL.
#[derive(Clone)]
pub struct S3Backend {
    client: Client,
    config: S3Config,
}

impl std::fmt::Debug for S3Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Backend")
            .field("bucket", &self.config.bucket)
            .field("region", &self.config.region)
            .field("endpoint", &self.config.endpoint)
            .finish()
    }
}

fn backend_error(operation: &'static str, key: &str, message: impl Into<String>) -> StoreError {
    StoreError::Backend {
        backend: "s3",
        operation,
        key: key.to_string(),
        message: message.into(),
    }
}

impl S3Backend {
    /// Build a client from `config` and, if requested, ensure the bucket exists.
    pub async fn connect(config: S3Config) -> StoreResult<Self> {
        config.validate()?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));
        if let (Some(ak), Some(sk)) = (&config.access_key_id, &config.secret_access_key) {
            loader = loader.credentials_provider(Credentials::new(
                ak.clone(),
                sk.clone(),
                None,
                None,
                "cask-static",
            ));
        }
        let shared = loader.load().await;

        let mut builder =
            aws_sdk_s3::config::Builder::from(&shared).force_path_style(config.force_path_style);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint.clone());
        }
        let client = Client::from_conf(builder.build());

        let backend = Self { client, config };
        if backend.config.create_bucket {
            backend.ensure_bucket().await?;
        }
        info!(
            bucket = %backend.config.bucket,
            region = %backend.config.region,
            "s3 backend ready"
        );
        Ok(backend)
    }

    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }

    async fn ensure_bucket(&self) -> StoreResult<()> {
        let bucket = &self.config.bucket;
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => return Ok(()),
            Err(e) => {
                let service_error = e.into_service_error();
                if !service_error.is_not_found() {
                    return Err(backend_error(
                        "head_bucket",
                        bucket,
                        DisplayErrorContext(&service_error).to_string(),
                    ));
                }
            }
        }

        let mut request = self.client.create_bucket().bucket(bucket);
        // us-east-1 rejects an explicit location constraint.
        if self.config.region != DEFAULT_REGION {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(
                        self.config.region.as_str(),
                    ))
                    .build(),
            );
        }
        request.send().await.map_err(|e| {
            backend_error("create_bucket", bucket, DisplayErrorContext(&e).to_string())
        })?;
        info!(bucket = %bucket, "created s3 bucket");
        Ok(())
    }

    fn presigning(&self, key: &str) -> StoreResult<PresigningConfig> {
        PresigningConfig::expires_in(Duration::from_secs(self.config.presign_ttl_secs))
            .map_err(|e| backend_error("presign", key, e.to_string()))
    }

    async fn presigned_get(
        &self,
        operation: &'static str,
        key: &str,
        disposition: Option<String>,
    ) -> StoreResult<String> {
        let presigned = self
            .client
            .get_object()
            .bucket(&self.config.bucket)
            .key(key)
            .set_response_content_disposition(disposition)
            .presigned(self.presigning(key)?)
            .await
            .map_err(|e| backend_error(operation, key, DisplayErrorContext(&e).to_string()))?;
        Ok(presigned.uri().to_string())
    }
}

fn content_disposition(kind: &str, file_name: &str) -> String {
    let escaped = file_name.replace('\\', "\\\\").replace('"', "\\\"");
    format!("{kind}; filename=\"{escaped}\"")
}

#[async_trait]
impl Backend for S3Backend {
    fn kind(&self) -> &'static str {
        "s3"
    }

    async fn upload_with_params(
        &self,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        params: &UploadParams,
    ) -> StoreResult<()> {
        let key = params.key.as_str();
        let data = read_to_vec(reader)
            .await
            .map_err(|e| StoreError::io("upload", key, e))?;
        let size = data.len();

        let mut request = self
            .client
            .put_object()
            .bucket(&self.config.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .set_content_type(params.mime_type.clone());
        match &self.config.encryption {
            Some(S3Encryption::Aes256) => {
                request = request.server_side_encryption(ServerSideEncryption::Aes256);
            }
            Some(S3Encryption::Kms { kms_key_id }) => {
                request = request
                    .server_side_encryption(ServerSideEncryption::AwsKms)
                    .set_ssekms_key_id(kms_key_id.clone());
            }
            None => {}
        }
        request
            .send()
            .await
            .map_err(|e| backend_error("upload", key, DisplayErrorContext(&e).to_string()))?;
        debug!(bucket = %self.config.bucket, key, size, "s3 upload");
        Ok(())
    }

    async fn download(&self, key: &str) -> StoreResult<ObjectReader> {
        let output = self
            .client
            .get_object()
            .bucket(&self.config.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    StoreError::NotFound {
                        key: key.to_string(),
                    }
                } else {
                    backend_error(
                        "download",
                        key,
                        DisplayErrorContext(&service_error).to_string(),
                    )
                }
            })?;
        Ok(Box::new(Box::pin(output.body.into_async_read())))
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        // S3 DELETE succeeds for missing keys; HEAD first so deletes stay strict.
        self.object_meta(key).await?;
        self.client
            .delete_object()
            .bucket(&self.config.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| backend_error("delete", key, DisplayErrorContext(&e).to_string()))?;
        debug!(bucket = %self.config.bucket, key, "s3 delete");
        Ok(())
    }

    async fn object_meta(&self, key: &str) -> StoreResult<ObjectMeta> {
        let output = self
            .client
            .head_object()
            .bucket(&self.config.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    StoreError::NotFound {
                        key: key.to_string(),
                    }
                } else {
                    backend_error("stat", key, DisplayErrorContext(&service_error).to_string())
                }
            })?;

        let updated_at = output
            .last_modified()
            .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos()));
        Ok(ObjectMeta {
            key: key.to_string(),
            size: output.content_length().unwrap_or(0).max(0) as u64,
            content_type: output.content_type().map(str::to_string),
            updated_at,
            etag: output.e_tag().map(|t| t.trim_matches('"').to_string()),
            metadata: output
                .metadata()
                .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                .unwrap_or_default(),
        })
    }

    async fn upload_url(&self, key: &str) -> StoreResult<String> {
        let presigned = self
            .client
            .put_object()
            .bucket(&self.config.bucket)
            .key(key)
            .presigned(self.presigning(key)?)
            .await
            .map_err(|e| backend_error("upload_url", key, DisplayErrorContext(&e).to_string()))?;
        Ok(presigned.uri().to_string())
    }

    async fn download_url(&self, key: &str, file_name: Option<&str>) -> StoreResult<String> {
        let disposition = file_name
            .filter(|n| !n.is_empty())
            .map(|n| content_disposition("attachment", n));
        self.presigned_get("download_url", key, disposition).await
    }

    async fn preview_url(&self, key: &str) -> StoreResult<String> {
        self.presigned_get("preview_url", key, None).await
    }
}
