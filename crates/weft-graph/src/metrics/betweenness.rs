//! Betweenness centrality via Brandes' algorithm.
//!
//! Links are treated as undirected and unweighted: a bridge is a note that
//! many shortest hop-chains between other notes pass through, whichever way
//! the links were authored. Parallel edges collapse to one adjacency.
//!
//! Scores are normalized to `[0, 1]`. Summing Brandes dependencies over every
//! source counts each unordered pair twice, so dividing by `(n-1)(n-2)`
//! gives the standard undirected normalization. Graphs with fewer than three
//! nodes score zero everywhere.

use std::collections::VecDeque;

use tracing::instrument;

use crate::graph::VaultGraph;

/// Normalized betweenness per node index.
#[must_use]
#[instrument(skip(g))]
pub fn betweenness_centrality(g: &VaultGraph) -> Vec<f64> {
    let n = g.node_count();
    let mut cb = vec![0.0_f64; n];
    if n < 3 {
        return cb;
    }

    let adjacency: Vec<Vec<usize>> = g
        .graph
        .node_indices()
        .map(|idx| {
            g.undirected_neighbours(idx)
                .into_iter()
                .map(|nb| nb.index())
                .collect()
        })
        .collect();

    let mut stack: Vec<usize> = Vec::with_capacity(n);
    let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut sigma = vec![0.0_f64; n];
    let mut dist = vec![-1_i64; n];
    let mut delta = vec![0.0_f64; n];
    let mut queue: VecDeque<usize> = VecDeque::new();

    for s in 0..n {
        stack.clear();
        predecessors.iter_mut().for_each(Vec::clear);
        sigma.iter_mut().for_each(|x| *x = 0.0);
        dist.iter_mut().for_each(|x| *x = -1);
        delta.iter_mut().for_each(|x| *x = 0.0);

        sigma[s] = 1.0;
        dist[s] = 0;
        queue.push_back(s);

        while let Some(v) = queue.pop_front() {
            stack.push(v);
            for &w in &adjacency[v] {
                if dist[w] < 0 {
                    dist[w] = dist[v] + 1;
                    queue.push_back(w);
                }
                if dist[w] == dist[v] + 1 {
                    sigma[w] += sigma[v];
                    predecessors[w].push(v);
                }
            }
        }

        while let Some(w) = stack.pop() {
            for &v in &predecessors[w] {
                if sigma[w] > 0.0 {
                    delta[v] += (sigma[v] / sigma[w]) * (1.0 + delta[w]);
                }
            }
            if w != s {
                cb[w] += delta[w];
            }
        }
    }

    let scale = ((n - 1) * (n - 2)) as f64;
    cb.iter_mut().for_each(|x| *x /= scale);
    cb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::graph_from_pairs;

    fn score(g: &VaultGraph, scores: &[f64], id: &str) -> f64 {
        scores[g.node_index(id).expect("node").index()]
    }

    #[test]
    fn center_of_star_is_maximal() {
        // Direction does not matter: spokes point both ways.
        let g = graph_from_pairs(
            &["c", "l1", "l2", "l3", "l4"],
            &[("c", "l1"), ("l2", "c"), ("c", "l3"), ("l4", "c")],
        );
        let bc = betweenness_centrality(&g);
        assert!((score(&g, &bc, "c") - 1.0).abs() < 1e-12);
        for leaf in ["l1", "l2", "l3", "l4"] {
            assert!(score(&g, &bc, leaf).abs() < 1e-12);
        }
    }

    #[test]
    fn path_middle_nodes_share_load() {
        let g = graph_from_pairs(&["a", "b", "c", "d"], &[("a", "b"), ("b", "c"), ("c", "d")]);
        let bc = betweenness_centrality(&g);
        // b lies on a-c and a-d: 2 of 3 pairs not involving b.
        assert!((score(&g, &bc, "b") - 2.0 / 3.0).abs() < 1e-12);
        assert!((score(&g, &bc, "c") - 2.0 / 3.0).abs() < 1e-12);
        assert!(score(&g, &bc, "a").abs() < 1e-12);
    }

    #[test]
    fn tiny_graphs_score_zero() {
        let g = graph_from_pairs(&["a", "b"], &[("a", "b")]);
        assert!(betweenness_centrality(&g).iter().all(|s| s.abs() < f64::EPSILON));
    }
}
