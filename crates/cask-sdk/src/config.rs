use std::path::Path;

use cask_keys::KeyStrategy;
use cask_store::{BackendConfig, NamedBackend};
use serde::{Deserialize, Serialize};

use crate::error::{SdkError, SdkResult};

pub const DEFAULT_BACKEND_NAME: &str = "memory";

/// Service configuration: which backends exist, which one new objects go to
/// by default, and how object keys are generated.
///
/// ```toml
/// default_backend = "local"
///
/// [key_strategy]
/// type = "git_like"
/// shard_length = 2
///
/// [[backends]]
/// name = "local"
/// type = "filesystem"
/// base_dir = "/var/lib/cask"
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaskConfig {
    pub default_backend: String,
    pub key_strategy: KeyStrategy,
    pub backends: Vec<NamedBackend>,
}

impl Default for CaskConfig {
    fn default() -> Self {
        Self {
            default_backend: DEFAULT_BACKEND_NAME.to_string(),
            key_strategy: KeyStrategy::default(),
            backends: vec![NamedBackend::new(DEFAULT_BACKEND_NAME, BackendConfig::Memory)],
        }
    }
}

impl CaskConfig {
    pub fn from_toml_str(src: &str) -> SdkResult<Self> {
        let config: Self = toml::from_str(src)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> SdkResult<Self> {
        let path = path.as_ref();
        let src = std::fs::read_to_string(path)
            .map_err(|e| SdkError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&src)
    }

    /// Check that backend names are unique and the default backend exists.
    pub fn validate(&self) -> SdkResult<()> {
        if self.backends.is_empty() {
            return Err(SdkError::Config("no backends configured".into()));
        }
        let mut seen = std::collections::HashSet::new();
        for backend in &self.backends {
            if backend.name.is_empty() {
                return Err(SdkError::Config("backend name is empty".into()));
            }
            if !seen.insert(backend.name.as_str()) {
                return Err(SdkError::Config(format!(
                    "duplicate backend name: {}",
                    backend.name
                )));
            }
        }
        if !seen.contains(self.default_backend.as_str()) {
            return Err(SdkError::Config(format!(
                "default backend {:?} is not configured",
                self.default_backend
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cask_types::ErrorKind;
    use std::path::PathBuf;

    #[test]
    fn default_config() {
        let c = CaskConfig::default();
        assert_eq!(c.default_backend, "memory");
        assert_eq!(c.key_strategy, KeyStrategy::GitLike { shard_length: 2 });
        assert_eq!(c.backends.len(), 1);
        assert_eq!(c.backends[0].backend, BackendConfig::Memory);
        c.validate().unwrap();
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(CaskConfig::from_toml_str("").unwrap(), CaskConfig::default());
    }

    #[test]
    fn full_document() {
        let c = CaskConfig::from_toml_str(
            r#"
            default_backend = "local"

            [key_strategy]
            type = "tenant_aware"
            inner = { type = "hashed", shard_length = 3 }

            [[backends]]
            name = "local"
            type = "filesystem"
            base_dir = "/var/lib/cask"
            url_prefix = "https://files.example.com"

            [[backends]]
            name = "scratch"
            type = "memory"
            "#,
        )
        .unwrap();
        assert_eq!(c.default_backend, "local");
        assert_eq!(
            c.backends[0].backend,
            BackendConfig::Filesystem {
                base_dir: PathBuf::from("/var/lib/cask"),
                url_prefix: Some("https://files.example.com".into()),
            }
        );
        assert_eq!(c.key_strategy.build().unwrap().name(), "tenant_aware");
    }

    #[test]
    fn unknown_default_backend_rejected() {
        let err = CaskConfig::from_toml_str("default_backend = \"s3\"\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn duplicate_backend_names_rejected() {
        let err = CaskConfig::from_toml_str(
            "[[backends]]\nname = \"memory\"\ntype = \"memory\"\n[[backends]]\nname = \"memory\"\ntype = \"memory\"\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate backend name"));
    }

    #[test]
    fn malformed_toml_rejected() {
        let err = CaskConfig::from_toml_str("backends = 3").unwrap_err();
        assert!(matches!(err, SdkError::ConfigParse(_)));
    }

    #[test]
    fn from_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cask.toml");
        std::fs::write(&path, "[key_strategy]\ntype = \"legacy\"\n").unwrap();
        let c = CaskConfig::from_file(&path).unwrap();
        assert_eq!(c.key_strategy, KeyStrategy::Legacy);

        let missing = CaskConfig::from_file(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(missing, SdkError::Config(_)));
    }
}
