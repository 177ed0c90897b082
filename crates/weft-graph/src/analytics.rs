//! Vault-level analytic queries.
//!
//! Each query reads the request's [`GraphStore`] snapshot. `rank`, `themes`
//! and `bridges` also persist their scores into the cached analytics
//! columns of `nodes` through the store's connection, so run them on a
//! write transaction when the cache should be kept.

use std::cmp::Ordering;

use petgraph::graph::NodeIndex;
use serde::Serialize;
use tracing::{info, instrument};
use weft_core::config::AnalyticsConfig;
use weft_core::db::query::{self, MetricColumn};
use weft_core::error::{Result, WeftError};
use weft_core::id;

use crate::graph::{GraphStore, VaultGraph};
use crate::metrics::activation::{MAX_DEPTH, MIN_DEPTH, spread_activation};
use crate::metrics::betweenness::betweenness_centrality;
use crate::metrics::communities::louvain;
use crate::metrics::gaps::{GapWeights, node_holes, pair_holes};
use crate::metrics::pagerank::{PageRankConfig, pagerank};
use crate::metrics::path::shortest_chain;

/// A node with a score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scored {
    pub id: String,
    pub title: String,
    pub score: f64,
}

/// Sort descending by score, ties by ascending id.
fn by_score_then_id(a: &Scored, b: &Scored) -> Ordering {
    b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id))
}

fn scored(g: &VaultGraph, idx: NodeIndex, score: f64) -> Scored {
    let (id, title) = g
        .node(idx)
        .map(|n| (n.id.clone(), n.title.clone()))
        .unwrap_or_default();
    Scored { id, title, score }
}

fn top_n(mut items: Vec<Scored>, top: usize) -> Vec<Scored> {
    items.sort_by(by_score_then_id);
    items.truncate(top);
    items
}

fn resolve(g: &VaultGraph, node_id: &str) -> Result<NodeIndex> {
    id::validate_id(node_id)?;
    g.node_index(node_id)
        .ok_or_else(|| WeftError::not_found("node", node_id))
}

// ---------------------------------------------------------------------------
// related
// ---------------------------------------------------------------------------

/// Nodes activated from `source` within `depth` hops, strongest first.
///
/// The source and archived nodes are excluded, as are nodes with zero
/// activation.
///
/// # Errors
///
/// - [`WeftError::Validation`] for a malformed id or `depth` outside 1..=5.
/// - [`WeftError::NotFound`] when `source` is not in the vault.
#[instrument(skip(store, config))]
pub fn related(
    store: &mut GraphStore<'_>,
    source: &str,
    depth: usize,
    top: usize,
    config: &AnalyticsConfig,
) -> Result<Vec<Scored>> {
    if !(MIN_DEPTH..=MAX_DEPTH).contains(&depth) {
        return Err(WeftError::validation(format!(
            "depth must be between {MIN_DEPTH} and {MAX_DEPTH}, got {depth}"
        )));
    }
    let g = store.graph()?;
    let src = resolve(g, source)?;
    let activation = spread_activation(g, src, depth, config.activation_decay);

    let hits = g
        .graph
        .node_indices()
        .filter(|&idx| idx != src && !g.is_archived(idx) && activation[idx.index()] > 0.0)
        .map(|idx| scored(g, idx, activation[idx.index()]))
        .collect();
    Ok(top_n(hits, top))
}

// ---------------------------------------------------------------------------
// rank
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankReport {
    pub ranked: Vec<Scored>,
    pub iterations: usize,
    pub converged: bool,
    pub nodes: usize,
}

/// PageRank over the full graph. Persists every node's rank score and its
/// in/out degree.
///
/// # Errors
///
/// Returns a storage error if the snapshot or cache write fails.
#[instrument(skip(store, config))]
pub fn rank(store: &mut GraphStore<'_>, top: usize, config: &AnalyticsConfig) -> Result<RankReport> {
    let conn = store.conn();
    let g = store.graph()?;
    let result = pagerank(g, &PageRankConfig::from(config));

    query::write_metric(
        conn,
        MetricColumn::RankScore,
        g.graph
            .node_indices()
            .map(|idx| (g.node_id(idx), result.scores[idx.index()])),
    )?;
    query::write_degrees(
        conn,
        g.graph
            .node_indices()
            .map(|idx| (g.node_id(idx), g.in_degree(idx), g.out_degree(idx))),
    )?;

    let ranked = g
        .graph
        .node_indices()
        .map(|idx| scored(g, idx, result.scores[idx.index()]))
        .collect();
    info!(
        nodes = g.node_count(),
        iterations = result.iterations,
        converged = result.converged,
        "rank computed"
    );
    Ok(RankReport {
        ranked: top_n(ranked, top),
        iterations: result.iterations,
        converged: result.converged,
        nodes: g.node_count(),
    })
}

// ---------------------------------------------------------------------------
// themes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cluster {
    pub cluster_id: usize,
    pub size: usize,
    /// Member with the highest weighted degree (ties by id).
    pub representative: String,
    pub members: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThemesReport {
    pub clusters: Vec<Cluster>,
    pub modularity: f64,
}

fn weighted_degree(g: &VaultGraph, idx: NodeIndex) -> f64 {
    use petgraph::Direction;
    [Direction::Outgoing, Direction::Incoming]
        .into_iter()
        .flat_map(|dir| g.graph.edges_directed(idx, dir))
        .map(|e| e.weight().weight.max(0.0))
        .sum()
}

/// Community detection. Persists each node's cluster id; clusters come back
/// ordered by size.
///
/// # Errors
///
/// Returns a storage error if the snapshot or cache write fails.
#[instrument(skip(store, config))]
pub fn themes(store: &mut GraphStore<'_>, config: &AnalyticsConfig) -> Result<ThemesReport> {
    let conn = store.conn();
    let g = store.graph()?;
    let partition = louvain(g, config.louvain_max_passes);

    query::write_clusters(
        conn,
        g.graph.node_indices().map(|idx| {
            let cluster = i64::try_from(partition.membership[idx.index()]).unwrap_or(i64::MAX);
            (g.node_id(idx), cluster)
        }),
    )?;

    let clusters = partition
        .members()
        .into_iter()
        .enumerate()
        .map(|(cluster_id, members)| {
            let representative = members
                .iter()
                .map(|&i| NodeIndex::new(i))
                .max_by(|&a, &b| {
                    weighted_degree(g, a)
                        .total_cmp(&weighted_degree(g, b))
                        .then_with(|| g.node_id(b).cmp(g.node_id(a)))
                })
                .map(|idx| g.node_id(idx).to_string())
                .unwrap_or_default();
            let mut members: Vec<String> = members
                .iter()
                .map(|&i| g.node_id(NodeIndex::new(i)).to_string())
                .collect();
            members.sort();
            Cluster {
                cluster_id,
                size: members.len(),
                representative,
                members,
            }
        })
        .collect();

    info!(
        clusters = partition.cluster_count,
        modularity = partition.modularity,
        "themes computed"
    );
    Ok(ThemesReport {
        clusters,
        modularity: partition.modularity,
    })
}

// ---------------------------------------------------------------------------
// path
// ---------------------------------------------------------------------------

/// Outcome of a path query. Disconnected endpoints are a result, not an
/// error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum PathResult {
    Connected {
        nodes: Vec<String>,
        hops: usize,
        cost: f64,
    },
    NotConnected {
        source: String,
        target: String,
    },
}

/// Cheapest undirected chain from `source` to `target`.
///
/// # Errors
///
/// - [`WeftError::Validation`] for malformed ids.
/// - [`WeftError::NotFound`] when an endpoint is not in the vault.
#[instrument(skip(store))]
pub fn path(store: &mut GraphStore<'_>, source: &str, target: &str) -> Result<PathResult> {
    let g = store.graph()?;
    let s = resolve(g, source)?;
    let t = resolve(g, target)?;
    Ok(match shortest_chain(g, s, t) {
        Some(chain) => PathResult::Connected {
            hops: chain.nodes.len() - 1,
            nodes: chain
                .nodes
                .iter()
                .map(|idx| g.node_id(*idx).to_string())
                .collect(),
            cost: chain.cost,
        },
        None => PathResult::NotConnected {
            source: source.to_string(),
            target: target.to_string(),
        },
    })
}

// ---------------------------------------------------------------------------
// bridges
// ---------------------------------------------------------------------------

/// Highest-betweenness nodes. Persists every node's betweenness.
///
/// # Errors
///
/// Returns a storage error if the snapshot or cache write fails.
#[instrument(skip(store))]
pub fn bridges(store: &mut GraphStore<'_>, top: usize) -> Result<Vec<Scored>> {
    let conn = store.conn();
    let g = store.graph()?;
    let bc = betweenness_centrality(g);

    query::write_metric(
        conn,
        MetricColumn::Betweenness,
        g.graph
            .node_indices()
            .map(|idx| (g.node_id(idx), bc[idx.index()])),
    )?;

    let all = g
        .graph
        .node_indices()
        .map(|idx| scored(g, idx, bc[idx.index()]))
        .collect();
    Ok(top_n(all, top))
}

// ---------------------------------------------------------------------------
// gaps
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeGap {
    pub id: String,
    pub title: String,
    pub score: f64,
    pub betweenness: f64,
    pub communities_bordered: usize,
    pub cluster_id: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairGap {
    pub a: String,
    pub b: String,
    pub via: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GapReport {
    pub nodes: Vec<NodeGap>,
    pub pairs: Vec<PairGap>,
}

/// Structural holes: boundary nodes and the unlinked cross-community pairs
/// they sit between, `top` of each.
///
/// # Errors
///
/// Returns a storage error if the snapshot cannot be built.
#[instrument(skip(store, config))]
pub fn gaps(store: &mut GraphStore<'_>, top: usize, config: &AnalyticsConfig) -> Result<GapReport> {
    let g = store.graph()?;
    let partition = louvain(g, config.louvain_max_passes);
    let bc = betweenness_centrality(g);
    let holes = node_holes(g, &bc, &partition.membership, GapWeights::from(config));
    let pairs = pair_holes(g, &holes, &partition.membership);

    let mut nodes: Vec<NodeGap> = holes
        .iter()
        .filter(|h| !g.is_archived(h.node))
        .map(|h| {
            let (id, title) = g
                .node(h.node)
                .map(|n| (n.id.clone(), n.title.clone()))
                .unwrap_or_default();
            NodeGap {
                id,
                title,
                score: h.score,
                betweenness: h.betweenness,
                communities_bordered: h.bordered,
                cluster_id: partition.membership[h.node.index()],
            }
        })
        .collect();
    nodes.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
    nodes.truncate(top);

    let mut pairs: Vec<PairGap> = pairs
        .iter()
        .map(|p| PairGap {
            a: g.node_id(p.a).to_string(),
            b: g.node_id(p.b).to_string(),
            via: g.node_id(p.via).to_string(),
            score: p.score,
        })
        .collect();
    pairs.sort_by(|x, y| {
        y.score
            .total_cmp(&x.score)
            .then_with(|| x.a.cmp(&y.a))
            .then_with(|| x.b.cmp(&y.b))
    });
    pairs.truncate(top);

    Ok(GapReport { nodes, pairs })
}
