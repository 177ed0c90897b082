//! Graph store adapter.
//!
//! ```text
//! SQLite nodes + edges
//!        ↓  build::VaultGraph::from_sqlite()   (lazy, one consistent read)
//! VaultGraph (DiGraph<NodeData, EdgeData>, ids in index order)
//!        ↓  metrics::*
//! scores, clusters, paths, gaps
//! ```
//!
//! [`store::GraphStore`] owns the snapshot for one request and exposes the
//! add/remove edge primitives used by the densification pipeline.

pub mod build;
pub mod store;

pub use build::{EdgeData, NodeData, VaultGraph, graph_from_pairs};
pub use store::GraphStore;
