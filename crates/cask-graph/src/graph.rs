//! The [`DerivationGraph`] manager and its traversal algorithms.
//!
//! # Invariants
//!
//! - A root has level 0 and no parent.
//! - A derived content's level is its parent's level + 1, never above
//!   [`MAX_DERIVATION_DEPTH`].
//! - Every derived content has exactly one relationship record.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use cask_repo::Repository;
use cask_types::{Content, ContentId, DerivedContent, NewContent, NewDerivedContent, MAX_DERIVATION_DEPTH};
use tracing::{debug, info, warn};

use crate::error::{GraphError, GraphResult};

/// Creates and traverses contents along their derivation edges.
#[derive(Clone)]
pub struct DerivationGraph {
    repo: Arc<dyn Repository>,
}

impl DerivationGraph {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repo
    }

    fn require(&self, id: ContentId) -> GraphResult<Content> {
        self.repo
            .get_content(id)?
            .ok_or(GraphError::ContentNotFound { id })
    }

    // ---------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------

    /// Create an original content at level 0.
    pub fn create_root(&self, attrs: NewContent) -> GraphResult<Content> {
        let content = Content::root(attrs);
        self.repo.create_content(&content)?;
        info!(content = %content.id, name = %content.name, "created root content");
        Ok(content)
    }

    /// Create a content derived from `parent_id`, together with its
    /// relationship record.
    ///
    /// Fails with [`GraphError::ContentNotFound`] if the parent is missing
    /// and [`GraphError::DepthExceeded`] if the parent already sits at the
    /// depth cap. The repository re-checks both under its write lock.
    pub fn create_derived(
        &self,
        parent_id: ContentId,
        request: NewDerivedContent,
    ) -> GraphResult<Content> {
        let parent = self.require(parent_id)?;
        if parent.at_depth_limit() {
            return Err(GraphError::DepthExceeded {
                parent: parent_id,
                level: parent.derivation_level + 1,
            });
        }

        let child = Content::child_of(&parent, request.content.clone());
        let record = request.relationship(parent_id, &child);
        self.repo.create_derived_content(&child, &record)?;
        info!(
            content = %child.id,
            parent = %parent_id,
            level = child.derivation_level,
            derivation_type = %record.derivation_type,
            "created derived content"
        );
        Ok(child)
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    /// Contents whose parent is `parent_id`.
    pub fn direct_children(&self, parent_id: ContentId) -> GraphResult<Vec<Content>> {
        Ok(self.repo.contents_by_parent(parent_id)?)
    }

    /// The root and every descendant within `max_depth` hops (BFS).
    ///
    /// Nodes exactly `max_depth` below the root are included; their
    /// children are not. `max_depth = 0` yields only the root.
    pub fn tree(&self, root_id: ContentId, max_depth: u32) -> GraphResult<Vec<Content>> {
        let root = self.require(root_id)?;

        let mut visited = HashSet::from([root_id]);
        let mut result = vec![root];
        let mut queue = VecDeque::from([(root_id, 0u32)]);

        while let Some((id, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            let mut children = self.repo.contents_by_parent(id)?;
            children.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
            for child in children {
                if visited.insert(child.id) {
                    queue.push_back((child.id, depth + 1));
                    result.push(child);
                }
            }
        }

        debug!(root = %root_id, max_depth, nodes = result.len(), "walked derivation tree");
        Ok(result)
    }

    /// The content followed by its ancestors, nearest first, ending at the
    /// root.
    ///
    /// Stops early if an ancestor has been removed from the repository.
    pub fn lineage(&self, id: ContentId) -> GraphResult<Vec<Content>> {
        let mut current = self.require(id)?;
        let mut chain = Vec::new();

        // One hop per level, so the walk is bounded even on corrupt data.
        for _ in 0..=MAX_DERIVATION_DEPTH {
            let parent_id = current.parent_id;
            chain.push(current);
            let Some(parent_id) = parent_id else {
                return Ok(chain);
            };
            match self.repo.get_content(parent_id)? {
                Some(parent) => current = parent,
                None => {
                    warn!(content = %id, missing = %parent_id, "lineage broken by missing ancestor");
                    return Ok(chain);
                }
            }
        }

        warn!(content = %id, "lineage longer than the depth cap");
        Ok(chain)
    }

    /// The relationship record linking `child_id` to its parent.
    pub fn relationship(&self, child_id: ContentId) -> GraphResult<Option<DerivedContent>> {
        Ok(self.repo.derived_relationship(child_id)?)
    }
}

impl std::fmt::Debug for DerivationGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivationGraph").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cask_repo::InMemoryRepository;
    use cask_types::{DerivationKind, ErrorKind, OwnerId, TenantId};

    fn graph() -> DerivationGraph {
        DerivationGraph::new(Arc::new(InMemoryRepository::new()))
    }

    fn attrs(name: &str) -> NewContent {
        NewContent::new(TenantId::new(), OwnerId::new(), name)
    }

    fn derive(graph: &DerivationGraph, parent: &Content, kind: &str) -> GraphResult<Content> {
        graph.create_derived(parent.id, NewDerivedContent::new(attrs(kind), kind))
    }

    fn ids(contents: &[Content]) -> HashSet<ContentId> {
        contents.iter().map(|c| c.id).collect()
    }

    // ---- Creation ----

    #[test]
    fn concurrent_derivations_respect_depth_cap() {
        let graph = graph();
        let mut node = graph.create_root(attrs("r")).unwrap();
        for kind in ["a", "b", "c", "d"] {
            node = derive(&graph, &node, kind).unwrap();
        }

        let leaves: Vec<Content> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..6)
                .map(|_| s.spawn(|| derive(&graph, &node, "e")))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap().unwrap())
                .collect()
        });
        assert!(leaves.iter().all(|c| c.derivation_level == MAX_DERIVATION_DEPTH));

        let graph_ref = &graph;
        std::thread::scope(|s| {
            let handles: Vec<_> = leaves
                .iter()
                .map(|leaf| s.spawn(move || derive(graph_ref, leaf, "f")))
                .collect();
            for handle in handles {
                let err = handle.join().unwrap().unwrap_err();
                assert_eq!(err.kind(), ErrorKind::DepthExceeded);
            }
        });
        assert_eq!(graph.tree(node.id, 5).unwrap().len(), 7);
    }

    #[test]
    fn root_is_level_zero_original() {
        let graph = graph();
        let root = graph.create_root(attrs("master.mov")).unwrap();
        assert_eq!(root.derivation_level, 0);
        assert_eq!(root.derivation_kind, DerivationKind::Original);
        assert!(root.is_root());
    }

    #[test]
    fn chain_r_d1_d2() {
        let graph = graph();
        let r = graph.create_root(attrs("r")).unwrap();
        let d1 = derive(&graph, &r, "transcode").unwrap();
        let d2 = derive(&graph, &d1, "thumbnail").unwrap();

        assert_eq!(
            (r.derivation_level, d1.derivation_level, d2.derivation_level),
            (0, 1, 2)
        );
        assert_eq!(d1.derivation_kind, DerivationKind::Derived);

        let children = graph.direct_children(r.id).unwrap();
        assert_eq!(ids(&children), HashSet::from([d1.id]));

        let tree = graph.tree(r.id, 5).unwrap();
        assert_eq!(tree.len(), 3);
        assert_eq!(ids(&tree), HashSet::from([r.id, d1.id, d2.id]));
    }

    #[test]
    fn relationship_written_with_child() {
        let graph = graph();
        let r = graph.create_root(attrs("photo.jpg")).unwrap();
        let thumb = graph
            .create_derived(
                r.id,
                NewDerivedContent::new(attrs("thumb"), "thumbnail")
                    .with_variant("256x256")
                    .with_param("width", 256),
            )
            .unwrap();

        let record = graph.relationship(thumb.id).unwrap().unwrap();
        assert_eq!(record.parent_id, r.id);
        assert_eq!(record.derivation_type, "thumbnail");
        assert_eq!(record.variant.as_deref(), Some("256x256"));
        assert_eq!(record.derivation_params["width"], serde_json::json!(256));
        assert!(graph.relationship(r.id).unwrap().is_none());
    }

    #[test]
    fn sixth_derivation_fails() {
        let graph = graph();
        let mut node = graph.create_root(attrs("r")).unwrap();
        for level in 1..=MAX_DERIVATION_DEPTH {
            node = derive(&graph, &node, "step").unwrap();
            assert_eq!(node.derivation_level, level);
        }
        let err = derive(&graph, &node, "step").unwrap_err();
        assert!(matches!(err, GraphError::DepthExceeded { level: 6, .. }));
        assert_eq!(err.kind(), ErrorKind::DepthExceeded);
        assert!(graph.direct_children(node.id).unwrap().is_empty());
    }

    #[test]
    fn derive_from_missing_parent() {
        let graph = graph();
        let err = graph
            .create_derived(ContentId::new(), NewDerivedContent::new(attrs("x"), "x"))
            .unwrap_err();
        assert!(matches!(err, GraphError::ContentNotFound { .. }));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    // ---- Traversal ----

    #[test]
    fn tree_depth_bounds() {
        let graph = graph();
        let r = graph.create_root(attrs("r")).unwrap();
        let a = derive(&graph, &r, "a").unwrap();
        let b = derive(&graph, &r, "b").unwrap();
        let a1 = derive(&graph, &a, "a1").unwrap();
        derive(&graph, &a1, "a2").unwrap();

        assert_eq!(ids(&graph.tree(r.id, 0).unwrap()), HashSet::from([r.id]));
        assert_eq!(
            ids(&graph.tree(r.id, 1).unwrap()),
            HashSet::from([r.id, a.id, b.id])
        );
        assert_eq!(graph.tree(r.id, 2).unwrap().len(), 4);
        assert_eq!(graph.tree(r.id, 10).unwrap().len(), 5);
    }

    #[test]
    fn tree_of_leaf_is_itself() {
        let graph = graph();
        let r = graph.create_root(attrs("r")).unwrap();
        let leaf = derive(&graph, &r, "leaf").unwrap();
        let tree = graph.tree(leaf.id, 5).unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].id, leaf.id);
    }

    #[test]
    fn tree_root_first_then_breadth() {
        let graph = graph();
        let r = graph.create_root(attrs("r")).unwrap();
        let a = derive(&graph, &r, "a").unwrap();
        let a1 = derive(&graph, &a, "a1").unwrap();
        let tree = graph.tree(r.id, 5).unwrap();
        let order: Vec<_> = tree.iter().map(|c| c.id).collect();
        assert_eq!(order, vec![r.id, a.id, a1.id]);
    }

    #[test]
    fn tree_of_missing_root() {
        let graph = graph();
        let err = graph.tree(ContentId::new(), 3).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn lineage_walks_to_root() {
        let graph = graph();
        let r = graph.create_root(attrs("r")).unwrap();
        let d1 = derive(&graph, &r, "d1").unwrap();
        let d2 = derive(&graph, &d1, "d2").unwrap();

        let chain: Vec<_> = graph.lineage(d2.id).unwrap().iter().map(|c| c.id).collect();
        assert_eq!(chain, vec![d2.id, d1.id, r.id]);
        assert_eq!(graph.lineage(r.id).unwrap().len(), 1);
    }

    #[test]
    fn lineage_stops_at_missing_ancestor() {
        let graph = graph();
        let r = graph.create_root(attrs("r")).unwrap();
        let d1 = derive(&graph, &r, "d1").unwrap();
        graph.repository().delete_content(r.id).unwrap();

        let chain = graph.lineage(d1.id).unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].id, d1.id);
    }
}
