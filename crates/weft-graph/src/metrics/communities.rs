//! Community detection by modularity optimization (Louvain).
//!
//! Links are folded into an undirected weighted graph: the weight between
//! two notes is the sum of the (non-negative) weights of all edges between
//! them in either direction. Each level runs local moving until no node
//! improves modularity, then aggregates communities into super-nodes. Levels
//! repeat until nothing moves or `max_passes` is reached.
//!
//! Nodes are visited in index order, a node only leaves its community for a
//! strictly better gain, and ties go to the lower community label, so the
//! result is deterministic for a given graph. Final cluster
//! ids are dense, ordered by size descending and then by smallest member.

use std::collections::BTreeMap;

use petgraph::visit::EdgeRef as _;
use tracing::{debug, instrument};

use crate::graph::VaultGraph;

/// Local-moving sweeps allowed per level.
const MAX_SWEEPS: usize = 64;

/// Minimum modularity gain that counts as an improvement.
const GAIN_EPSILON: f64 = 1e-12;

/// Community assignment of every node.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    /// Cluster id per node index.
    pub membership: Vec<usize>,
    pub cluster_count: usize,
    pub modularity: f64,
    pub levels: usize,
}

impl Partition {
    /// Node indices of each cluster, in cluster id order.
    #[must_use]
    pub fn members(&self) -> Vec<Vec<usize>> {
        let mut out = vec![Vec::new(); self.cluster_count];
        for (node, &c) in self.membership.iter().enumerate() {
            out[c].push(node);
        }
        out
    }
}

/// One aggregation level: symmetric adjacency plus per-node internal weight.
struct Level {
    adj: Vec<BTreeMap<usize, f64>>,
    /// Twice the edge weight folded inside each super-node.
    internal: Vec<f64>,
}

impl Level {
    fn len(&self) -> usize {
        self.adj.len()
    }

    fn degree(&self, i: usize) -> f64 {
        self.adj[i].values().sum::<f64>() + self.internal[i]
    }
}

fn base_level(g: &VaultGraph) -> Level {
    let n = g.node_count();
    let mut adj = vec![BTreeMap::new(); n];
    for edge in g.graph.edge_references() {
        let (u, v) = (edge.source().index(), edge.target().index());
        let w = edge.weight().weight.max(0.0);
        if u == v || w == 0.0 {
            continue;
        }
        *adj[u].entry(v).or_insert(0.0) += w;
        *adj[v].entry(u).or_insert(0.0) += w;
    }
    Level {
        adj,
        internal: vec![0.0; n],
    }
}

/// Local moving on one level. Returns dense community labels and whether
/// any node changed community.
fn local_moving(level: &Level, m2: f64) -> (Vec<usize>, bool) {
    let n = level.len();
    let degree: Vec<f64> = (0..n).map(|i| level.degree(i)).collect();
    let mut community: Vec<usize> = (0..n).collect();
    let mut tot = degree.clone();
    let mut improved = false;

    for _ in 0..MAX_SWEEPS {
        let mut moved = false;
        for u in 0..n {
            let current = community[u];
            let mut links: BTreeMap<usize, f64> = BTreeMap::new();
            for (&v, &w) in &level.adj[u] {
                *links.entry(community[v]).or_insert(0.0) += w;
            }

            tot[current] -= degree[u];
            let gain = |c: usize, k_in: f64| k_in - tot[c] * degree[u] / m2;

            let mut best = current;
            let mut best_gain = gain(current, links.get(&current).copied().unwrap_or(0.0));
            for (&c, &k_in) in &links {
                let g = gain(c, k_in);
                if g > best_gain + GAIN_EPSILON {
                    best = c;
                    best_gain = g;
                }
            }

            tot[best] += degree[u];
            if best != current {
                community[u] = best;
                moved = true;
                improved = true;
            }
        }
        if !moved {
            break;
        }
    }

    let mut relabel: BTreeMap<usize, usize> = BTreeMap::new();
    for c in &mut community {
        let next = relabel.len();
        *c = *relabel.entry(*c).or_insert(next);
    }
    (community, improved)
}

fn aggregate(level: &Level, community: &[usize], count: usize) -> Level {
    let mut adj = vec![BTreeMap::new(); count];
    let mut internal = vec![0.0; count];
    for (u, &cu) in community.iter().enumerate() {
        internal[cu] += level.internal[u];
        for (&v, &w) in &level.adj[u] {
            let cv = community[v];
            if cu == cv {
                internal[cu] += w;
            } else {
                *adj[cu].entry(cv).or_insert(0.0) += w;
            }
        }
    }
    Level { adj, internal }
}

fn modularity(base: &Level, membership: &[usize], count: usize, m2: f64) -> f64 {
    if m2 <= 0.0 {
        return 0.0;
    }
    let mut inside = vec![0.0; count];
    let mut tot = vec![0.0; count];
    for (u, &c) in membership.iter().enumerate() {
        tot[c] += base.degree(u);
        for (&v, &w) in &base.adj[u] {
            if membership[v] == c {
                inside[c] += w;
            }
        }
    }
    inside
        .iter()
        .zip(&tot)
        .map(|(i, t)| i / m2 - (t / m2).powi(2))
        .sum()
}

/// Detect communities with multi-level Louvain.
#[must_use]
#[instrument(skip(g))]
pub fn louvain(g: &VaultGraph, max_passes: usize) -> Partition {
    let base = base_level(g);
    let n = base.len();
    let m2: f64 = (0..n).map(|i| base.degree(i)).sum();
    let mut membership: Vec<usize> = (0..n).collect();
    let mut levels = 0;

    if m2 > 0.0 {
        let mut level = aggregate(&base, &membership, n);
        for _ in 0..max_passes.max(1) {
            let (community, improved) = local_moving(&level, m2);
            levels += 1;
            if !improved {
                break;
            }
            let count = community.iter().max().map_or(0, |m| m + 1);
            for c in &mut membership {
                *c = community[*c];
            }
            level = aggregate(&level, &community, count);
        }
    }

    let (membership, cluster_count) = order_by_size(g, &membership);
    let modularity = modularity(&base, &membership, cluster_count, m2);
    debug!(clusters = cluster_count, modularity, levels, "louvain finished");
    Partition {
        membership,
        cluster_count,
        modularity,
        levels,
    }
}

/// Relabel clusters densely: larger first, then by smallest member id.
fn order_by_size(g: &VaultGraph, membership: &[usize]) -> (Vec<usize>, usize) {
    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (node, &c) in membership.iter().enumerate() {
        groups.entry(c).or_default().push(node);
    }
    let mut ordered: Vec<Vec<usize>> = groups.into_values().collect();
    ordered.sort_by(|a, b| {
        b.len().cmp(&a.len()).then_with(|| {
            let first = |m: &Vec<usize>| {
                m.iter()
                    .map(|&i| g.node_id(petgraph::graph::NodeIndex::new(i)))
                    .min()
                    .unwrap_or_default()
                    .to_string()
            };
            first(a).cmp(&first(b))
        })
    });

    let mut out = vec![0; membership.len()];
    for (cluster, members) in ordered.iter().enumerate() {
        for &node in members {
            out[node] = cluster;
        }
    }
    (out, ordered.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::graph_from_pairs;

    fn two_triangles() -> VaultGraph {
        graph_from_pairs(
            &["a1", "a2", "a3", "b1", "b2", "b3"],
            &[
                ("a1", "a2"),
                ("a2", "a3"),
                ("a3", "a1"),
                ("b1", "b2"),
                ("b2", "b3"),
                ("b3", "b1"),
                ("a3", "b1"),
            ],
        )
    }

    fn cluster_of(g: &VaultGraph, p: &Partition, id: &str) -> usize {
        p.membership[g.node_index(id).expect("node").index()]
    }

    #[test]
    fn bridged_triangles_split_in_two() {
        let g = two_triangles();
        let p = louvain(&g, 20);
        assert_eq!(p.cluster_count, 2);
        assert_eq!(cluster_of(&g, &p, "a1"), cluster_of(&g, &p, "a3"));
        assert_eq!(cluster_of(&g, &p, "b1"), cluster_of(&g, &p, "b3"));
        assert_ne!(cluster_of(&g, &p, "a1"), cluster_of(&g, &p, "b1"));
        assert!(p.modularity > 0.3, "modularity {}", p.modularity);
    }

    #[test]
    fn result_is_deterministic() {
        let g = two_triangles();
        assert_eq!(louvain(&g, 20), louvain(&g, 20));
    }

    #[test]
    fn isolated_nodes_are_singletons_after_larger_clusters() {
        let g = graph_from_pairs(&["a", "b", "z"], &[("a", "b")]);
        let p = louvain(&g, 20);
        assert_eq!(p.cluster_count, 2);
        assert_eq!(cluster_of(&g, &p, "a"), 0);
        assert_eq!(cluster_of(&g, &p, "b"), 0);
        assert_eq!(cluster_of(&g, &p, "z"), 1);
    }

    #[test]
    fn edgeless_graph_has_zero_modularity() {
        let g = graph_from_pairs(&["a", "b"], &[]);
        let p = louvain(&g, 20);
        assert_eq!(p.cluster_count, 2);
        assert!(p.modularity.abs() < f64::EPSILON);
    }
}
