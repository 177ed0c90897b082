//! Re-scoring and removal of pipeline-authored edges.
//!
//! Each pipeline edge touching the target (or every pipeline edge) is
//! scored again with the current weights and node attributes. Graph
//! proximity is measured around the edge itself, so an edge never props up
//! its own score. Edges typed `mentions` keep full lexical credit. Edges now
//! below `min_score` are removed and recorded as removals in one `prune`
//! log entry.

use std::collections::HashMap;

use rusqlite::Transaction;
use serde::Serialize;
use tracing::{info, instrument};
use weft_core::config::VaultConfig;
use weft_core::content::{StatusUpdate, recompute_statuses};
use weft_core::db::query;
use weft_core::error::{Result, WeftError};
use weft_core::events::{Applied, LifecycleEvent};
use weft_core::id;
use weft_core::model::{Edge, LogKind, LoggedEdge};
use weft_graph::GraphStore;

use crate::pipeline::MENTION_EDGE_TYPE;
use crate::score::{Profile, ScoreBreakdown, indirect_hops, score_pair};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneRequest {
    /// Limit pruning to edges touching this node.
    pub target: Option<String>,
    pub dry_run: bool,
}

/// A pipeline edge and its recomputed score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RescoredEdge {
    pub edge: Edge,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PruneReport {
    pub target_id: Option<String>,
    pub dry_run: bool,
    pub examined: usize,
    /// Edges below threshold: removed, or to be removed on a dry run.
    pub removed: Vec<RescoredEdge>,
    pub log_id: Option<i64>,
    pub status: Vec<StatusUpdate>,
}

/// Re-score pipeline edges and drop the ones that fell below threshold.
///
/// # Errors
///
/// - [`WeftError::NoHistory`] when the densification log is empty.
/// - [`WeftError::Validation`] / [`WeftError::NotFound`] for a bad target.
/// - Storage errors from any read or write.
#[instrument(skip(tx, request, config), fields(target = ?request.target, dry_run = request.dry_run))]
pub fn prune(
    tx: &Transaction<'_>,
    request: &PruneRequest,
    config: &VaultConfig,
) -> Result<Applied<PruneReport>> {
    if query::log_len(tx)? == 0 {
        return Err(WeftError::NoHistory);
    }
    if let Some(target) = request.target.as_deref() {
        id::validate_id(target)?;
        if !query::node_exists(tx, target)? {
            return Err(WeftError::not_found("node", target));
        }
    }

    let edges = query::pipeline_edges(tx, request.target.as_deref())?;
    let profiles: HashMap<String, Profile> = query::list_nodes(tx, true)?
        .iter()
        .map(|node| (node.id.clone(), Profile::of(node)))
        .collect();

    let mut store = GraphStore::new(tx);
    let mut below = Vec::new();
    {
        let g = store.graph()?;
        for edge in &edges {
            let (Some(source), Some(target)) =
                (profiles.get(&edge.source_id), profiles.get(&edge.target_id))
            else {
                continue;
            };
            let hops = match (g.node_index(&edge.source_id), g.node_index(&edge.target_id)) {
                (Some(a), Some(b)) => indirect_hops(g, a, b, config.densify.proximity_max_hops),
                _ => None,
            };
            let mentioned = edge.edge_type == MENTION_EDGE_TYPE;
            let breakdown = score_pair(source, target, hops, mentioned, &config.densify);
            if breakdown.total < config.densify.min_score {
                below.push(RescoredEdge {
                    edge: edge.clone(),
                    score: breakdown.total,
                    breakdown,
                });
            }
        }
    }

    let mut report = PruneReport {
        target_id: request.target.clone(),
        dry_run: request.dry_run,
        examined: edges.len(),
        removed: below,
        log_id: None,
        status: Vec::new(),
    };
    let mut events = Vec::new();
    let mut warnings = Vec::new();

    if report.removed.is_empty() {
        warnings.push("every pipeline edge is still above the minimum score".to_string());
    } else if !request.dry_run {
        let now = query::now_us();
        let mut logged = Vec::with_capacity(report.removed.len());
        for rescored in &report.removed {
            if let Some(edge) = store.remove_edge(&rescored.edge.key())? {
                logged.push(LoggedEdge::removed(edge));
            }
        }
        report.status = recompute_statuses(
            tx,
            logged.iter().map(|l| l.edge.source_id.as_str()),
            &config.status,
        )?;
        let log_id = query::append_log(
            tx,
            LogKind::Prune,
            request.target.as_deref(),
            None,
            &logged,
            now,
        )?;
        report.log_id = Some(log_id);
        events.push(LifecycleEvent::DensificationCompleted {
            source_id: request.target.clone(),
            log_id,
            added: 0,
            removed: logged.len(),
        });
    }

    info!(
        examined = report.examined,
        below = report.removed.len(),
        dry_run = report.dry_run,
        "prune finished"
    );
    let mut applied = Applied::new(report);
    applied.events = events;
    applied.warnings = warnings;
    Ok(applied)
}
