//! Graph construction from the SQLite index.
//!
//! Nodes are loaded first, ordered by id, so isolated nodes stay visible and
//! node indices follow id order. Edges are loaded second with their type,
//! weight, and provenance. Parallel edges of different types between the
//! same pair are kept as separate graph edges.
//!
//! ## Cache Invalidation
//!
//! [`VaultGraph::content_hash`] is a BLAKE3 hash of the sorted edge set and
//! [`VaultGraph::generation`] is the store generation read in the same
//! snapshot. Either can be compared against the store to detect staleness.

use std::collections::HashMap;

use anyhow::{Context, Result};
use petgraph::Direction;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef as _;
use rusqlite::Connection;
use tracing::{instrument, warn};
use weft_core::db::{self, query};
use weft_core::model::{ContentType, Edge, EdgeKey, Provenance};

/// Node payload: identity plus the attributes analytics report back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeData {
    pub id: String,
    pub title: String,
    pub content_type: ContentType,
    pub archived: bool,
}

/// Edge payload.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeData {
    pub edge_type: String,
    pub weight: f64,
    pub provenance: Provenance,
}

/// Directed vault graph: nodes are content items, `A → B` is a link
/// authored on `A`.
#[derive(Debug, Clone)]
pub struct VaultGraph {
    pub graph: DiGraph<NodeData, EdgeData>,
    pub node_map: HashMap<String, NodeIndex>,
    /// BLAKE3 content hash of the edge set.
    pub content_hash: String,
    /// Store generation this snapshot was read at.
    pub generation: i64,
}

impl VaultGraph {
    /// Build a [`VaultGraph`] from one read of `conn`.
    ///
    /// Pass a transaction (it derefs to a connection) when the read must be
    /// consistent with later writes in the same request.
    ///
    /// # Errors
    ///
    /// Returns an error if a SQLite query fails.
    #[instrument(skip(conn))]
    pub fn from_sqlite(conn: &Connection) -> Result<Self> {
        let generation = db::generation(conn).context("read store generation")?;
        let nodes = load_nodes(conn)?;
        let edges = query::list_edges(conn)?;

        let mut graph = Self::from_parts(nodes, &[]);
        graph.generation = generation;
        for edge in &edges {
            if !graph.insert(edge) {
                warn!(
                    source = %edge.source_id,
                    target = %edge.target_id,
                    "edge endpoint missing from node index, skipped"
                );
            }
        }
        graph.content_hash = compute_edge_hash(&edges);
        Ok(graph)
    }

    /// Build a graph from in-memory parts. Nodes are sorted by id first.
    #[must_use]
    pub fn from_parts(mut nodes: Vec<NodeData>, edges: &[Edge]) -> Self {
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        let mut graph = DiGraph::<NodeData, EdgeData>::with_capacity(nodes.len(), edges.len());
        let mut node_map = HashMap::with_capacity(nodes.len());
        for node in nodes {
            let id = node.id.clone();
            let idx = graph.add_node(node);
            node_map.insert(id, idx);
        }

        let mut built = Self {
            graph,
            node_map,
            content_hash: String::new(),
            generation: 0,
        };
        for edge in edges {
            built.insert(edge);
        }
        built.refresh_hash();
        built
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    #[must_use]
    pub fn node_index(&self, node_id: &str) -> Option<NodeIndex> {
        self.node_map.get(node_id).copied()
    }

    #[must_use]
    pub fn node(&self, idx: NodeIndex) -> Option<&NodeData> {
        self.graph.node_weight(idx)
    }

    /// Id label of a node, or `""` for an index outside the graph.
    #[must_use]
    pub fn node_id(&self, idx: NodeIndex) -> &str {
        self.graph.node_weight(idx).map_or("", |n| n.id.as_str())
    }

    #[must_use]
    pub fn is_archived(&self, idx: NodeIndex) -> bool {
        self.graph.node_weight(idx).is_some_and(|n| n.archived)
    }

    #[must_use]
    pub fn out_degree(&self, idx: NodeIndex) -> usize {
        self.graph.edges_directed(idx, Direction::Outgoing).count()
    }

    #[must_use]
    pub fn in_degree(&self, idx: NodeIndex) -> usize {
        self.graph.edges_directed(idx, Direction::Incoming).count()
    }

    /// Whether any edge links `a` and `b` in either direction.
    #[must_use]
    pub fn linked(&self, a: NodeIndex, b: NodeIndex) -> bool {
        self.graph.find_edge(a, b).is_some() || self.graph.find_edge(b, a).is_some()
    }

    /// Distinct neighbours of `idx` ignoring edge direction, in index order.
    #[must_use]
    pub fn undirected_neighbours(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut out: Vec<NodeIndex> = self.graph.neighbors_undirected(idx).collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    fn find(&self, key: &EdgeKey) -> Option<EdgeIndex> {
        let source = self.node_index(&key.source_id)?;
        let target = self.node_index(&key.target_id)?;
        self.graph
            .edges_connecting(source, target)
            .find(|e| e.weight().edge_type == key.edge_type)
            .map(|e| e.id())
    }

    fn insert(&mut self, edge: &Edge) -> bool {
        let (Some(source), Some(target)) = (
            self.node_index(&edge.source_id),
            self.node_index(&edge.target_id),
        ) else {
            return false;
        };
        if source == target || self.find(&edge.key()).is_some() {
            return false;
        }
        self.graph.add_edge(
            source,
            target,
            EdgeData {
                edge_type: edge.edge_type.clone(),
                weight: edge.weight,
                provenance: edge.provenance,
            },
        );
        true
    }

    /// Add an edge to the snapshot. Returns `false` when an endpoint is
    /// unknown or the `(source, target, type)` triple already exists.
    pub fn add_edge(&mut self, edge: &Edge) -> bool {
        let added = self.insert(edge);
        if added {
            self.refresh_hash();
        }
        added
    }

    /// Remove an edge from the snapshot, returning its payload.
    pub fn remove_edge(&mut self, key: &EdgeKey) -> Option<EdgeData> {
        let idx = self.find(key)?;
        let removed = self.graph.remove_edge(idx);
        self.refresh_hash();
        removed
    }

    /// All edges as owned records, sorted by `(source, target, type)`.
    #[must_use]
    pub fn edges(&self) -> Vec<Edge> {
        let mut edges: Vec<Edge> = self
            .graph
            .edge_references()
            .map(|e| Edge {
                source_id: self.node_id(e.source()).to_string(),
                target_id: self.node_id(e.target()).to_string(),
                edge_type: e.weight().edge_type.clone(),
                weight: e.weight().weight,
                provenance: e.weight().provenance,
            })
            .collect();
        edges.sort_by(|a, b| a.key().cmp(&b.key()));
        edges
    }

    fn refresh_hash(&mut self) {
        self.content_hash = compute_edge_hash(&self.edges());
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn load_nodes(conn: &Connection) -> Result<Vec<NodeData>> {
    let mut stmt = conn
        .prepare("SELECT node_id, title, content_type, is_archived FROM nodes ORDER BY node_id")
        .context("prepare graph node query")?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })
        .context("execute graph node query")?
        .collect::<Result<Vec<_>, _>>()
        .context("collect graph nodes")?;

    rows.into_iter()
        .map(|(id, title, content_type, archived)| {
            let content_type = content_type
                .parse::<ContentType>()
                .with_context(|| format!("node {id} has unknown content type"))?;
            Ok(NodeData {
                id,
                title,
                content_type,
                archived: archived != 0,
            })
        })
        .collect()
}

/// BLAKE3 hash of a sorted edge list.
fn compute_edge_hash(edges: &[Edge]) -> String {
    let mut hasher = blake3::Hasher::new();
    for edge in edges {
        hasher.update(edge.source_id.as_bytes());
        hasher.update(b"\x00");
        hasher.update(edge.target_id.as_bytes());
        hasher.update(b"\x00");
        hasher.update(edge.edge_type.as_bytes());
        hasher.update(b"\x00");
        hasher.update(&edge.weight.to_bits().to_le_bytes());
    }
    format!("blake3:{}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// Test support
// ---------------------------------------------------------------------------

/// Build a note-only graph from ids and `(source, target)` pairs with
/// weight 1.0 and type `relates`.
#[must_use]
pub fn graph_from_pairs(ids: &[&str], pairs: &[(&str, &str)]) -> VaultGraph {
    let nodes = ids
        .iter()
        .map(|id| NodeData {
            id: (*id).to_string(),
            title: (*id).to_string(),
            content_type: ContentType::Note,
            archived: false,
        })
        .collect();
    let edges: Vec<Edge> = pairs
        .iter()
        .map(|(a, b)| Edge::manual(*a, *b, "relates"))
        .collect();
    VaultGraph::from_parts(nodes, &edges)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
