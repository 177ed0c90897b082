//! Structural-hole detection.
//!
//! A node sits on a structural hole when its neighbours fall in communities
//! other than its own. Its gap score combines normalized betweenness with
//! the number of foreign communities it borders:
//!
//! ```text
//! score(v) = wb · bc(v) / max bc  +  wd · bordered(v) / max bordered
//! ```
//!
//! Only nodes bordering at least one foreign community are reported. A pair
//! gap is two unlinked, non-archived nodes in different communities that
//! share a neighbour; it takes the best score among its shared neighbours.

use std::collections::{BTreeMap, BTreeSet};

use petgraph::graph::NodeIndex;

use crate::graph::VaultGraph;

/// Relative weights of the two gap signals.
#[derive(Debug, Clone, Copy)]
pub struct GapWeights {
    pub betweenness: f64,
    pub boundary: f64,
}

impl From<&weft_core::config::AnalyticsConfig> for GapWeights {
    fn from(cfg: &weft_core::config::AnalyticsConfig) -> Self {
        Self {
            betweenness: cfg.gap_betweenness_weight,
            boundary: cfg.gap_boundary_weight,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeHole {
    pub node: NodeIndex,
    pub score: f64,
    pub betweenness: f64,
    pub bordered: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PairHole {
    pub a: NodeIndex,
    pub b: NodeIndex,
    pub via: NodeIndex,
    pub score: f64,
}

/// Score nodes on community boundaries.
///
/// `betweenness` and `membership` are indexed by node index. The result is
/// unsorted.
#[must_use]
pub fn node_holes(
    g: &VaultGraph,
    betweenness: &[f64],
    membership: &[usize],
    weights: GapWeights,
) -> Vec<NodeHole> {
    let mut raw = Vec::new();
    for idx in g.graph.node_indices() {
        let own = membership[idx.index()];
        let foreign: BTreeSet<usize> = g
            .undirected_neighbours(idx)
            .into_iter()
            .map(|nb| membership[nb.index()])
            .filter(|c| *c != own)
            .collect();
        if !foreign.is_empty() {
            raw.push((idx, betweenness[idx.index()], foreign.len()));
        }
    }

    let max_bc = raw.iter().map(|(_, bc, _)| *bc).fold(0.0_f64, f64::max);
    let max_bordered = raw.iter().map(|(_, _, b)| *b).max().unwrap_or(0);

    raw.into_iter()
        .map(|(node, bc, bordered)| {
            let bc_part = if max_bc > 0.0 { bc / max_bc } else { 0.0 };
            let border_part = if max_bordered > 0 {
                bordered as f64 / max_bordered as f64
            } else {
                0.0
            };
            NodeHole {
                node,
                score: weights
                    .betweenness
                    .mul_add(bc_part, weights.boundary * border_part),
                betweenness: bc,
                bordered,
            }
        })
        .collect()
}

/// Candidate connections across communities through scored boundary nodes.
///
/// The result is unsorted; each unordered pair appears once.
#[must_use]
pub fn pair_holes(g: &VaultGraph, holes: &[NodeHole], membership: &[usize]) -> Vec<PairHole> {
    let mut best: BTreeMap<(NodeIndex, NodeIndex), PairHole> = BTreeMap::new();
    for hole in holes {
        let neighbours: Vec<NodeIndex> = g
            .undirected_neighbours(hole.node)
            .into_iter()
            .filter(|nb| !g.is_archived(*nb))
            .collect();
        for (i, &a) in neighbours.iter().enumerate() {
            for &b in &neighbours[i + 1..] {
                if membership[a.index()] == membership[b.index()] || g.linked(a, b) {
                    continue;
                }
                let key = if g.node_id(a) <= g.node_id(b) {
                    (a, b)
                } else {
                    (b, a)
                };
                let candidate = PairHole {
                    a: key.0,
                    b: key.1,
                    via: hole.node,
                    score: hole.score,
                };
                match best.get(&key) {
                    Some(existing) if existing.score >= candidate.score => {}
                    _ => {
                        best.insert(key, candidate);
                    }
                }
            }
        }
    }
    best.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::graph_from_pairs;
    use crate::metrics::betweenness::betweenness_centrality;
    use crate::metrics::communities::louvain;

    const WEIGHTS: GapWeights = GapWeights {
        betweenness: 0.6,
        boundary: 0.4,
    };

    fn bridged() -> VaultGraph {
        // Two triangles joined through `hub`.
        graph_from_pairs(
            &["a1", "a2", "a3", "b1", "b2", "b3", "hub"],
            &[
                ("a1", "a2"),
                ("a2", "a3"),
                ("a3", "a1"),
                ("b1", "b2"),
                ("b2", "b3"),
                ("b3", "b1"),
                ("hub", "a1"),
                ("hub", "b1"),
            ],
        )
    }

    #[test]
    fn boundary_nodes_are_reported_and_interior_nodes_are_not() {
        let g = bridged();
        let p = louvain(&g, 20);
        let bc = betweenness_centrality(&g);
        let holes = node_holes(&g, &bc, &p.membership, WEIGHTS);
        let ids: BTreeSet<&str> = holes.iter().map(|h| g.node_id(h.node)).collect();
        assert!(!ids.contains("a2"));
        assert!(!ids.contains("b3"));
        assert!(!holes.is_empty());
        let top = holes
            .iter()
            .max_by(|x, y| x.score.total_cmp(&y.score))
            .expect("top hole");
        assert!(top.score <= WEIGHTS.betweenness + WEIGHTS.boundary + 1e-12);
    }

    #[test]
    fn pair_gaps_link_unconnected_communities() {
        let g = bridged();
        let p = louvain(&g, 20);
        let bc = betweenness_centrality(&g);
        let holes = node_holes(&g, &bc, &p.membership, WEIGHTS);
        let pairs = pair_holes(&g, &holes, &p.membership);
        assert!(!pairs.is_empty());
        for pair in &pairs {
            assert_ne!(p.membership[pair.a.index()], p.membership[pair.b.index()]);
            assert!(!g.linked(pair.a, pair.b));
        }
    }

    #[test]
    fn single_community_has_no_gaps() {
        let g = graph_from_pairs(&["a", "b", "c"], &[("a", "b"), ("b", "c"), ("c", "a")]);
        let p = louvain(&g, 20);
        let bc = betweenness_centrality(&g);
        assert!(node_holes(&g, &bc, &p.membership, WEIGHTS).is_empty());
    }
}
