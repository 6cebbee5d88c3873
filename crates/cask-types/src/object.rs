use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::content::Attributes;
use crate::error::TypeError;
use crate::id::{ContentId, ObjectId};

/// Lifecycle status of an [`Object`].
///
/// ```text
/// created -> uploading -> uploaded -> processing -> processed
///                 \            \            \
///                  +-> failed   +-> deleted  +-> failed
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectStatus {
    #[default]
    Created,
    Uploading,
    Uploaded,
    Processing,
    Processed,
    Failed,
    Deleted,
}

impl ObjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Uploading => "uploading",
            Self::Uploaded => "uploaded",
            Self::Processing => "processing",
            Self::Processed => "processed",
            Self::Failed => "failed",
            Self::Deleted => "deleted",
        }
    }

    /// Whether an object in this status may move to `next`.
    pub fn can_transition_to(&self, next: ObjectStatus) -> bool {
        use ObjectStatus::*;
        match self {
            Created => matches!(next, Uploading | Uploaded | Failed | Deleted),
            Uploading => matches!(next, Uploaded | Failed | Deleted),
            Uploaded => matches!(next, Uploading | Processing | Deleted),
            Processing => matches!(next, Processed | Failed | Deleted),
            Processed => matches!(next, Processing | Deleted),
            Failed => matches!(next, Uploading | Processing | Deleted),
            Deleted => false,
        }
    }

    /// Whether the backend is expected to hold bytes for the object.
    pub fn has_bytes(&self) -> bool {
        matches!(self, Self::Uploaded | Self::Processing | Self::Processed)
    }
}

impl fmt::Display for ObjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectStatus {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "uploading" => Ok(Self::Uploading),
            "uploaded" => Ok(Self::Uploaded),
            "processing" => Ok(Self::Processing),
            "processed" => Ok(Self::Processed),
            "failed" => Ok(Self::Failed),
            "deleted" => Ok(Self::Deleted),
            other => Err(TypeError::InvalidStatus(other.to_string())),
        }
    }
}

/// A physical blob realizing a content's bytes on one storage backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Object {
    pub id: ObjectId,
    pub content_id: ContentId,
    /// Registered name of the backend holding the bytes.
    pub backend_name: String,
    /// Backend-specific key, generated before any I/O.
    pub object_key: String,
    /// Monotonic per content, starting at 1. Assigned by the repository.
    pub version: u32,
    pub status: ObjectStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Object {
    /// A fresh object in `created` status with an unassigned version.
    pub fn new(
        id: ObjectId,
        content_id: ContentId,
        backend_name: impl Into<String>,
        object_key: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            content_id,
            backend_name: backend_name.into(),
            object_key: object_key.into(),
            version: 0,
            status: ObjectStatus::Created,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Backend-reported facts about an object's bytes, captured after upload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    pub object_id: ObjectId,
    pub size_bytes: u64,
    pub mime_type: Option<String>,
    pub etag: Option<String>,
    pub metadata: Attributes,
    pub updated_at: Option<DateTime<Utc>>,
}
