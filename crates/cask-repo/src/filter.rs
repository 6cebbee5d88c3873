//! Query filters for listing contents and derivation records.

use cask_types::{Content, ContentId, ContentStatus, DerivationKind, DerivedContent, OwnerId, TenantId};

/// Selects contents by owner, tenant, status, and derivation kind.
///
/// Unset fields match everything. Results are paged by `offset`/`limit`
/// after filtering.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContentFilter {
    pub owner_id: Option<OwnerId>,
    pub tenant_id: Option<TenantId>,
    pub status: Option<ContentStatus>,
    pub derivation_kind: Option<DerivationKind>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl ContentFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owner(mut self, owner_id: OwnerId) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    pub fn tenant(mut self, tenant_id: TenantId) -> Self {
        self.tenant_id = Some(tenant_id);
        self
    }

    pub fn status(mut self, status: ContentStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn kind(mut self, kind: DerivationKind) -> Self {
        self.derivation_kind = Some(kind);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn matches(&self, content: &Content) -> bool {
        self.owner_id.map_or(true, |o| o == content.owner_id)
            && self.tenant_id.map_or(true, |t| t == content.tenant_id)
            && self.status.map_or(true, |s| s == content.status)
            && self
                .derivation_kind
                .map_or(true, |k| k == content.derivation_kind)
    }
}

/// Selects derivation records by parent, type, and variant.
///
/// An empty `parent_ids` list matches every parent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DerivedContentFilter {
    pub parent_ids: Vec<ContentId>,
    pub derivation_type: Option<String>,
    pub variant: Option<String>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl DerivedContentFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parent(mut self, parent_id: ContentId) -> Self {
        self.parent_ids.push(parent_id);
        self
    }

    pub fn derivation_type(mut self, derivation_type: impl Into<String>) -> Self {
        self.derivation_type = Some(derivation_type.into());
        self
    }

    pub fn variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn matches(&self, record: &DerivedContent) -> bool {
        (self.parent_ids.is_empty() || self.parent_ids.contains(&record.parent_id))
            && self
                .derivation_type
                .as_deref()
                .map_or(true, |t| t == record.derivation_type)
            && self
                .variant
                .as_deref()
                .map_or(true, |v| record.variant.as_deref() == Some(v))
    }
}

/// Apply `offset`/`limit` paging to an already-sorted result set.
pub(crate) fn page<T>(items: Vec<T>, offset: usize, limit: Option<usize>) -> Vec<T> {
    let iter = items.into_iter().skip(offset);
    match limit {
        Some(n) => iter.take(n).collect(),
        None => iter.collect(),
    }
}
