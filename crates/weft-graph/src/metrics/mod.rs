//! Graph algorithms over a [`crate::graph::VaultGraph`] snapshot.
//!
//! - **Spreading activation** (`activation`): which notes are near this one?
//! - **PageRank** (`pagerank`): which notes does the vault lean on most?
//! - **Louvain** (`communities`): which themes does the vault fall into?
//! - **Weighted shortest chain** (`path`): how are two notes connected?
//! - **Betweenness** (`betweenness`): which notes hold themes together?
//! - **Structural holes** (`gaps`): which connections are missing?
//!
//! Every function reads the snapshot and returns scores indexed by node
//! index; none mutates the graph.

pub mod activation;
pub mod betweenness;
pub mod communities;
pub mod gaps;
pub mod pagerank;
pub mod path;
