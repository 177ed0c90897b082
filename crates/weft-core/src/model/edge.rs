use serde::{Deserialize, Serialize};

use super::string_enum;

string_enum! {
    /// Who authored a link.
    pub enum Provenance: "provenance" {
        Manual => "manual",
        Pipeline => "pipeline",
    }
}

/// Identity of an edge: at most one edge per `(source, target, type)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeKey {
    pub source_id: String,
    pub target_id: String,
    pub edge_type: String,
}

impl EdgeKey {
    pub fn new(
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        edge_type: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            edge_type: edge_type.into(),
        }
    }
}

/// A typed, weighted link between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source_id: String,
    pub target_id: String,
    pub edge_type: String,
    pub weight: f64,
    pub provenance: Provenance,
}

impl Edge {
    /// A manually authored edge with the default weight of 1.0.
    pub fn manual(
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        edge_type: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            edge_type: edge_type.into(),
            weight: 1.0,
            provenance: Provenance::Manual,
        }
    }

    #[must_use]
    pub fn key(&self) -> EdgeKey {
        EdgeKey::new(&self.source_id, &self.target_id, &self.edge_type)
    }

    /// Whether this edge touches `node_id` at either end.
    #[must_use]
    pub fn touches(&self, node_id: &str) -> bool {
        self.source_id == node_id || self.target_id == node_id
    }
}
