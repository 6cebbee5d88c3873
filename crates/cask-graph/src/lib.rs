//! Derivation graph for Cask.
//!
//! Contents form a forest: originals are roots at level 0, and every derived
//! content hangs below exactly one parent, one level deeper. The graph caps
//! depth at [`MAX_DERIVATION_DEPTH`] and answers child, tree, and lineage
//! queries over any [`Repository`].
//!
//! [`MAX_DERIVATION_DEPTH`]: cask_types::MAX_DERIVATION_DEPTH
//! [`Repository`]: cask_repo::Repository

pub mod error;
pub mod graph;

pub use error::{GraphError, GraphResult};
pub use graph::DerivationGraph;
