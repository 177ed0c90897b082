//! Weighted shortest connection chain.
//!
//! Edges are traversed in either direction. Traversal cost is `1 / weight`,
//! so stronger links are cheaper; edges with a non-positive weight are not
//! traversable. Among parallel edges the strongest one sets the cost.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef as _;

use crate::graph::VaultGraph;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Frontier {
    cost: f64,
    node: usize,
}

impl Eq for Frontier {}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap on cost, then on node index for stable tie-breaking.
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A found chain: node indices from source to target and its total cost.
#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    pub nodes: Vec<NodeIndex>,
    pub cost: f64,
}

fn cheapest_links(g: &VaultGraph) -> Vec<Vec<(usize, f64)>> {
    let mut links: Vec<Vec<(usize, f64)>> = vec![Vec::new(); g.node_count()];
    for edge in g.graph.edge_references() {
        let w = edge.weight().weight;
        if w <= 0.0 {
            continue;
        }
        let cost = 1.0 / w;
        let (u, v) = (edge.source().index(), edge.target().index());
        for (from, to) in [(u, v), (v, u)] {
            match links[from].iter_mut().find(|(n, _)| *n == to) {
                Some(entry) => entry.1 = entry.1.min(cost),
                None => links[from].push((to, cost)),
            }
        }
    }
    for list in &mut links {
        list.sort_by_key(|(n, _)| *n);
    }
    links
}

/// Dijkstra from `source` to `target`. `None` when they are not connected.
#[must_use]
pub fn shortest_chain(g: &VaultGraph, source: NodeIndex, target: NodeIndex) -> Option<Chain> {
    let n = g.node_count();
    let (s, t) = (source.index(), target.index());
    if s >= n || t >= n {
        return None;
    }
    if s == t {
        return Some(Chain {
            nodes: vec![source],
            cost: 0.0,
        });
    }

    let links = cheapest_links(g);
    let mut dist = vec![f64::INFINITY; n];
    let mut prev: Vec<Option<usize>> = vec![None; n];
    let mut heap = BinaryHeap::new();
    dist[s] = 0.0;
    heap.push(Frontier { cost: 0.0, node: s });

    while let Some(Frontier { cost, node }) = heap.pop() {
        if node == t {
            break;
        }
        if cost > dist[node] {
            continue;
        }
        for &(next, step) in &links[node] {
            let candidate = cost + step;
            if candidate < dist[next] {
                dist[next] = candidate;
                prev[next] = Some(node);
                heap.push(Frontier {
                    cost: candidate,
                    node: next,
                });
            }
        }
    }

    if dist[t].is_infinite() {
        return None;
    }

    let mut nodes = vec![target];
    let mut cursor = t;
    while let Some(p) = prev[cursor] {
        nodes.push(NodeIndex::new(p));
        cursor = p;
    }
    nodes.reverse();
    Some(Chain {
        nodes,
        cost: dist[t],
    })
}

/// Unweighted hop distances from `source` ignoring direction, up to
/// `max_hops`. Unreached nodes are `None`.
#[must_use]
pub fn hop_distances(g: &VaultGraph, source: NodeIndex, max_hops: usize) -> Vec<Option<usize>> {
    let n = g.node_count();
    let mut dist = vec![None; n];
    if source.index() >= n {
        return dist;
    }
    dist[source.index()] = Some(0);
    let mut frontier = vec![source];
    for hop in 1..=max_hops {
        let mut next = Vec::new();
        for idx in frontier {
            for nb in g.graph.neighbors_undirected(idx) {
                if dist[nb.index()].is_none() {
                    dist[nb.index()] = Some(hop);
                    next.push(nb);
                }
            }
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
    }
    dist
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::graph_from_pairs;
    use weft_core::model::Edge;

    fn ids(g: &VaultGraph, chain: &Chain) -> Vec<String> {
        chain
            .nodes
            .iter()
            .map(|i| g.node_id(*i).to_string())
            .collect()
    }

    #[test]
    fn chain_follows_links_in_either_direction() {
        let g = graph_from_pairs(&["a", "b", "c", "d"], &[("a", "b"), ("c", "b"), ("c", "d")]);
        let a = g.node_index("a").expect("a");
        let d = g.node_index("d").expect("d");
        let chain = shortest_chain(&g, a, d).expect("connected");
        assert_eq!(ids(&g, &chain), vec!["a", "b", "c", "d"]);
        assert!((chain.cost - 3.0).abs() < 1e-12);
    }

    #[test]
    fn stronger_detour_beats_weak_shortcut() {
        let mut g = graph_from_pairs(&["a", "b", "c"], &[]);
        let mut weak = Edge::manual("a", "c", "relates");
        weak.weight = 0.1;
        let mut ab = Edge::manual("a", "b", "relates");
        ab.weight = 1.0;
        let mut bc = Edge::manual("b", "c", "relates");
        bc.weight = 1.0;
        for e in [&weak, &ab, &bc] {
            g.add_edge(e);
        }
        let chain = shortest_chain(
            &g,
            g.node_index("a").expect("a"),
            g.node_index("c").expect("c"),
        )
        .expect("connected");
        assert_eq!(ids(&g, &chain), vec!["a", "b", "c"]);
    }

    #[test]
    fn same_node_is_a_single_element_chain() {
        let g = graph_from_pairs(&["a"], &[]);
        let a = g.node_index("a").expect("a");
        let chain = shortest_chain(&g, a, a).expect("trivial");
        assert_eq!(chain.nodes, vec![a]);
    }

    #[test]
    fn hop_distances_stop_at_limit() {
        let g = graph_from_pairs(&["a", "b", "c", "d"], &[("a", "b"), ("b", "c"), ("c", "d")]);
        let dist = hop_distances(&g, g.node_index("a").expect("a"), 2);
        assert_eq!(dist, vec![Some(0), Some(1), Some(2), None]);
    }
}
