use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TypeError;
use crate::id::{ContentId, OwnerId, TenantId};

/// Hard cap on the derivation level of any content.
///
/// Roots sit at level 0, so a chain can hold at most five derivations below
/// its original.
pub const MAX_DERIVATION_DEPTH: u32 = 5;

/// Free-form key/value attributes (derivation parameters, custom metadata).
pub type Attributes = BTreeMap<String, Value>;

/// Lifecycle status of a [`Content`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    #[default]
    Created,
    Uploaded,
    Deleted,
}

impl ContentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Uploaded => "uploaded",
            Self::Deleted => "deleted",
        }
    }

    /// Whether a content in this status may move to `next`.
    ///
    /// Setting the current status again is always allowed.
    pub fn can_transition_to(&self, next: ContentStatus) -> bool {
        use ContentStatus::*;
        matches!(
            (self, next),
            (Created, Created)
                | (Created, Uploaded)
                | (Created, Deleted)
                | (Uploaded, Uploaded)
                | (Uploaded, Deleted)
                | (Deleted, Deleted)
        )
    }
}

impl fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentStatus {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "uploaded" => Ok(Self::Uploaded),
            "deleted" => Ok(Self::Deleted),
            other => Err(TypeError::InvalidStatus(other.to_string())),
        }
    }
}

/// Whether a content is an original or was derived from another content.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DerivationKind {
    #[default]
    Original,
    Derived,
}

impl fmt::Display for DerivationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Original => f.write_str("original"),
            Self::Derived => f.write_str("derived"),
        }
    }
}

impl FromStr for DerivationKind {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "original" => Ok(Self::Original),
            "derived" => Ok(Self::Derived),
            other => Err(TypeError::InvalidDerivationKind(other.to_string())),
        }
    }
}

/// A logical piece of data, independent of where its bytes live.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Content {
    pub id: ContentId,
    pub tenant_id: TenantId,
    pub owner_id: OwnerId,
    pub name: String,
    pub description: Option<String>,
    pub document_type: String,
    pub status: ContentStatus,
    pub derivation_kind: DerivationKind,
    /// Parent content; `None` for roots.
    pub parent_id: Option<ContentId>,
    /// Distance from the root of the derivation tree.
    pub derivation_level: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Content {
    /// Build a root content (level 0, no parent) from caller attributes.
    pub fn root(attrs: NewContent) -> Self {
        let now = Utc::now();
        Self {
            id: ContentId::new(),
            tenant_id: attrs.tenant_id,
            owner_id: attrs.owner_id,
            name: attrs.name,
            description: attrs.description,
            document_type: attrs.document_type,
            status: ContentStatus::Created,
            derivation_kind: DerivationKind::Original,
            parent_id: None,
            derivation_level: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Build a child of `parent` one level below it.
    ///
    /// The caller is responsible for checking [`MAX_DERIVATION_DEPTH`].
    pub fn child_of(parent: &Content, attrs: NewContent) -> Self {
        let mut content = Self::root(attrs);
        content.derivation_kind = DerivationKind::Derived;
        content.parent_id = Some(parent.id);
        content.derivation_level = parent.derivation_level + 1;
        content
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Returns `true` if a child of this content would exceed the depth cap.
    pub fn at_depth_limit(&self) -> bool {
        self.derivation_level >= MAX_DERIVATION_DEPTH
    }
}

/// Caller-supplied attributes for a new content.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewContent {
    pub tenant_id: TenantId,
    pub owner_id: OwnerId,
    pub name: String,
    pub description: Option<String>,
    pub document_type: String,
}

impl NewContent {
    pub fn new(tenant_id: TenantId, owner_id: OwnerId, name: impl Into<String>) -> Self {
        Self {
            tenant_id,
            owner_id,
            name: name.into(),
            description: None,
            document_type: String::new(),
        }
    }

    pub fn with_document_type(mut self, document_type: impl Into<String>) -> Self {
        self.document_type = document_type.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Relationship record linking a derived content to its parent.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DerivedContent {
    pub parent_id: ContentId,
    pub content_id: ContentId,
    /// What kind of derivation produced the child, e.g. `"thumbnail"`.
    pub derivation_type: String,
    /// Optional variant within the derivation type, e.g. `"256x256"`.
    pub variant: Option<String>,
    pub derivation_params: Attributes,
    pub processing_metadata: Attributes,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Caller-supplied attributes for a derived content.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NewDerivedContent {
    pub content: NewContent,
    pub derivation_type: String,
    pub variant: Option<String>,
    pub derivation_params: Attributes,
    pub processing_metadata: Attributes,
}

impl NewDerivedContent {
    pub fn new(content: NewContent, derivation_type: impl Into<String>) -> Self {
        Self {
            content,
            derivation_type: derivation_type.into(),
            ..Self::default()
        }
    }

    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.derivation_params.insert(key.into(), value.into());
        self
    }

    /// Relationship record for `child`, derived from `parent_id`.
    pub fn relationship(&self, parent_id: ContentId, child: &Content) -> DerivedContent {
        DerivedContent {
            parent_id,
            content_id: child.id,
            derivation_type: self.derivation_type.clone(),
            variant: self.variant.clone(),
            derivation_params: self.derivation_params.clone(),
            processing_metadata: self.processing_metadata.clone(),
            created_at: child.created_at,
            updated_at: child.updated_at,
        }
    }
}

/// Descriptive metadata attached 1:1 to a content.
///
/// Never inherited: a derived content carries its own metadata.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentMetadata {
    pub content_id: ContentId,
    pub tags: Vec<String>,
    pub file_size: Option<u64>,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub checksum: Option<String>,
    pub checksum_algorithm: Option<String>,
    pub custom: Attributes,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ContentMetadata {
    pub fn new(content_id: ContentId) -> Self {
        Self {
            content_id,
            ..Self::default()
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(name: &str) -> NewContent {
        NewContent::new(TenantId::new(), OwnerId::new(), name).with_document_type("image")
    }

    #[test]
    fn root_is_level_zero_original() {
        let root = Content::root(attrs("photo.jpg"));
        assert!(root.is_root());
        assert_eq!(root.derivation_level, 0);
        assert_eq!(root.derivation_kind, DerivationKind::Original);
        assert_eq!(root.status, ContentStatus::Created);
    }

    #[test]
    fn child_is_one_level_below_parent() {
        let root = Content::root(attrs("photo.jpg"));
        let child = Content::child_of(&root, attrs("thumb.jpg"));
        assert_eq!(child.parent_id, Some(root.id));
        assert_eq!(child.derivation_level, 1);
        assert_eq!(child.derivation_kind, DerivationKind::Derived);
    }

    #[test]
    fn depth_limit_is_level_five() {
        let mut node = Content::root(attrs("a"));
        for _ in 0..MAX_DERIVATION_DEPTH {
            assert!(!node.at_depth_limit());
            node = Content::child_of(&node, attrs("b"));
        }
        assert_eq!(node.derivation_level, MAX_DERIVATION_DEPTH);
        assert!(node.at_depth_limit());
    }

    #[test]
    fn status_parse_and_display() {
        for status in [ContentStatus::Created, ContentStatus::Uploaded, ContentStatus::Deleted] {
            assert_eq!(status.to_string().parse::<ContentStatus>().unwrap(), status);
        }
        assert!("archived".parse::<ContentStatus>().is_err());
    }

    #[test]
    fn status_transitions() {
        assert!(ContentStatus::Created.can_transition_to(ContentStatus::Uploaded));
        assert!(ContentStatus::Uploaded.can_transition_to(ContentStatus::Deleted));
        assert!(!ContentStatus::Deleted.can_transition_to(ContentStatus::Created));
        assert!(!ContentStatus::Uploaded.can_transition_to(ContentStatus::Created));
    }

    #[test]
    fn relationship_copies_derivation_details() {
        let root = Content::root(attrs("photo.jpg"));
        let new = NewDerivedContent::new(attrs("thumb.jpg"), "thumbnail")
            .with_variant("256x256")
            .with_param("width", 256);
        let child = Content::child_of(&root, new.content.clone());
        let rel = new.relationship(root.id, &child);
        assert_eq!(rel.parent_id, root.id);
        assert_eq!(rel.content_id, child.id);
        assert_eq!(rel.derivation_type, "thumbnail");
        assert_eq!(rel.variant.as_deref(), Some("256x256"));
        assert_eq!(rel.derivation_params["width"], 256);
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&ContentStatus::Uploaded).unwrap();
        assert_eq!(json, "\"uploaded\"");
    }
}
