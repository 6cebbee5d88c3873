use std::fmt;

use cask_types::{ContentId, ObjectId};

/// Where an object sits in the derivation hierarchy, as far as key layout
/// is concerned.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Placement {
    /// Nothing is known about the owning content.
    #[default]
    Unspecified,
    /// The object realizes an original (root) content.
    Original,
    /// The object realizes a derived content.
    Derived {
        derivation_type: String,
        variant: Option<String>,
    },
}

impl Placement {
    pub fn derived(derivation_type: impl Into<String>, variant: Option<String>) -> Self {
        Self::Derived {
            derivation_type: derivation_type.into(),
            variant,
        }
    }
}

/// Inputs to key generation beyond the two identifiers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyContext {
    /// Original file name; sanitized before use. Empty names are ignored.
    pub file_name: Option<String>,
    /// Tenant namespace, consumed by [`TenantAwareKeyGenerator`].
    ///
    /// [`TenantAwareKeyGenerator`]: crate::TenantAwareKeyGenerator
    pub tenant: Option<String>,
    pub placement: Placement,
}

impl KeyContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn original() -> Self {
        Self {
            placement: Placement::Original,
            ..Self::default()
        }
    }

    pub fn derived(derivation_type: impl Into<String>, variant: Option<String>) -> Self {
        Self {
            placement: Placement::derived(derivation_type, variant),
            ..Self::default()
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    /// The file name, if present and non-empty.
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref().filter(|name| !name.is_empty())
    }

    /// The tenant, if present and non-empty.
    pub fn tenant(&self) -> Option<&str> {
        self.tenant.as_deref().filter(|tenant| !tenant.is_empty())
    }
}

/// Maps (content id, object id, context) to a storage key.
///
/// Implementations are pure: the same inputs always produce the same key.
/// Whether two objects of the same content collide depends on the strategy;
/// every built-in strategy embeds the object id or a hash of it.
pub trait KeyGenerator: Send + Sync + fmt::Debug {
    /// Produce the storage key for an object.
    fn generate_key(&self, content_id: &ContentId, object_id: &ObjectId, ctx: &KeyContext)
        -> String;

    /// Short strategy name for logs and diagnostics.
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_name_is_ignored() {
        let ctx = KeyContext::new().with_file_name("");
        assert_eq!(ctx.file_name(), None);
    }

    #[test]
    fn empty_tenant_is_ignored() {
        let ctx = KeyContext::new().with_tenant("");
        assert_eq!(ctx.tenant(), None);
        assert_eq!(KeyContext::new().with_tenant("acme").tenant(), Some("acme"));
    }

    #[test]
    fn constructors_set_placement() {
        assert_eq!(KeyContext::original().placement, Placement::Original);
        assert_eq!(
            KeyContext::derived("thumbnail", None).placement,
            Placement::Derived {
                derivation_type: "thumbnail".into(),
                variant: None
            }
        );
        assert_eq!(KeyContext::new().placement, Placement::Unspecified);
    }
}
