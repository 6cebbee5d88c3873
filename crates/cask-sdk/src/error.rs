use cask_graph::GraphError;
use cask_keys::KeyError;
use cask_repo::RepoError;
use cask_store::StoreError;
use cask_types::{ContentId, ErrorKind, ObjectId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("content not found: {0}")]
    ContentNotFound(ContentId),

    #[error("object not found: {0}")]
    ObjectNotFound(ObjectId),

    #[error("illegal {entity} status transition for {id}: {from} -> {to}")]
    InvalidTransition {
        entity: &'static str,
        id: String,
        from: String,
        to: String,
    },

    #[error("content {id} still has {children} derived content(s)")]
    HasChildren { id: ContentId, children: usize },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("repository error: {0}")]
    Repo(#[from] RepoError),

    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("key error: {0}")]
    Key(#[from] KeyError),
}

impl SdkError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ContentNotFound(_) | Self::ObjectNotFound(_) => ErrorKind::NotFound,
            Self::InvalidTransition { .. } | Self::Config(_) | Self::ConfigParse(_) => {
                ErrorKind::InvalidInput
            }
            Self::HasChildren { .. } => ErrorKind::Conflict,
            Self::Store(e) => e.kind(),
            Self::Repo(e) => e.kind(),
            Self::Graph(e) => e.kind(),
            Self::Key(e) => e.kind(),
        }
    }
}

pub type SdkResult<T> = Result<T, SdkError>;
