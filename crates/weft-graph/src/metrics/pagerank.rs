//! PageRank over the full directed vault graph.
//!
//! # Algorithm
//!
//! Power method:
//!
//! ```text
//! PR(v) = (1 - d) / N + d * Σ PR(u) / out_degree(u)   for each u → v
//! ```
//!
//! Dangling nodes (no outgoing edges) spread their rank uniformly, so the
//! scores always sum to 1. Each parallel edge counts toward `out_degree`.

use petgraph::Direction;
use petgraph::visit::EdgeRef as _;
use tracing::{instrument, warn};

use crate::graph::VaultGraph;

/// Configuration for PageRank computation.
#[derive(Debug, Clone)]
pub struct PageRankConfig {
    /// Damping factor (probability of following a link vs teleporting).
    pub damping: f64,
    /// Stop when the L1 norm of the rank delta drops below this.
    pub tolerance: f64,
    pub max_iter: usize,
}

impl Default for PageRankConfig {
    fn default() -> Self {
        Self {
            damping: 0.85,
            tolerance: 1e-6,
            max_iter: 100,
        }
    }
}

impl From<&weft_core::config::AnalyticsConfig> for PageRankConfig {
    fn from(cfg: &weft_core::config::AnalyticsConfig) -> Self {
        Self {
            damping: cfg.pagerank_damping,
            tolerance: cfg.pagerank_tolerance,
            max_iter: cfg.pagerank_max_iter,
        }
    }
}

/// Result of a PageRank computation.
#[derive(Debug, Clone)]
pub struct PageRankResult {
    /// Scores indexed by node index.
    pub scores: Vec<f64>,
    pub iterations: usize,
    pub converged: bool,
}

/// Compute PageRank from scratch.
#[must_use]
#[instrument(skip(g, config))]
pub fn pagerank(g: &VaultGraph, config: &PageRankConfig) -> PageRankResult {
    let n = g.node_count();
    if n == 0 {
        return PageRankResult {
            scores: Vec::new(),
            iterations: 0,
            converged: true,
        };
    }

    let n_f64 = n as f64;
    let base = (1.0 - config.damping) / n_f64;
    let out_degree: Vec<usize> = g
        .graph
        .node_indices()
        .map(|idx| g.graph.edges_directed(idx, Direction::Outgoing).count())
        .collect();

    let mut ranks = vec![1.0 / n_f64; n];
    let mut new_ranks = vec![0.0_f64; n];
    let mut iterations = 0;
    let mut converged = false;

    for _ in 0..config.max_iter {
        iterations += 1;

        let dangling: f64 = (0..n)
            .filter(|&i| out_degree[i] == 0)
            .map(|i| ranks[i])
            .sum();
        let fill = config.damping.mul_add(dangling / n_f64, base);
        new_ranks.iter_mut().for_each(|r| *r = fill);

        for edge in g.graph.edge_references() {
            let u = edge.source().index();
            new_ranks[edge.target().index()] += config.damping * ranks[u] / out_degree[u] as f64;
        }

        let delta: f64 = ranks
            .iter()
            .zip(&new_ranks)
            .map(|(old, new)| (old - new).abs())
            .sum();

        std::mem::swap(&mut ranks, &mut new_ranks);

        if delta < config.tolerance {
            converged = true;
            break;
        }
    }

    if !converged {
        warn!(iterations, "pagerank did not converge");
    }

    PageRankResult {
        scores: ranks,
        iterations,
        converged,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::graph_from_pairs;

    #[test]
    fn empty_graph_has_no_scores() {
        let g = graph_from_pairs(&[], &[]);
        let result = pagerank(&g, &PageRankConfig::default());
        assert!(result.scores.is_empty());
        assert!(result.converged);
    }

    #[test]
    fn isolated_nodes_share_rank_uniformly() {
        let g = graph_from_pairs(&["a", "b", "c", "d"], &[]);
        let result = pagerank(&g, &PageRankConfig::default());
        for score in &result.scores {
            assert!((score - 0.25).abs() < 1e-9);
        }
    }

    #[test]
    fn sink_of_star_ranks_highest() {
        let g = graph_from_pairs(
            &["hub", "s1", "s2", "s3"],
            &[("s1", "hub"), ("s2", "hub"), ("s3", "hub")],
        );
        let result = pagerank(&g, &PageRankConfig::default());
        let hub = g.node_index("hub").expect("hub").index();
        for (i, score) in result.scores.iter().enumerate() {
            if i != hub {
                assert!(result.scores[hub] > *score);
            }
        }
        let sum: f64 = result.scores.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cycle_is_uniform() {
        let g = graph_from_pairs(&["a", "b", "c"], &[("a", "b"), ("b", "c"), ("c", "a")]);
        let result = pagerank(&g, &PageRankConfig::default());
        assert!(result.converged);
        for score in &result.scores {
            assert!((score - 1.0 / 3.0).abs() < 1e-6);
        }
    }
}
