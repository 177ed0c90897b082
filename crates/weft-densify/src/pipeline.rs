//! The reweave pipeline: discover, score, filter, present, connect.
//!
//! One call runs every stage against a single source node on the caller's
//! transaction. A dry run stops after presenting the retained candidates.
//! Otherwise each candidate becomes a pipeline edge weighted by its score,
//! the source's machine status is recomputed, and one `connect` log entry
//! records every added edge. Nothing is committed here; a failure at any
//! stage leaves the caller to drop the transaction.

use std::collections::HashMap;

use petgraph::graph::NodeIndex;
use rusqlite::Transaction;
use serde::Serialize;
use tracing::{info, instrument};
use weft_core::config::{DensifyConfig, VaultConfig};
use weft_core::content::{StatusUpdate, recompute_statuses};
use weft_core::db::query;
use weft_core::error::Result;
use weft_core::events::{Applied, LifecycleEvent};
use weft_core::model::{ContentType, Edge, LogKind, LoggedEdge, Node, Provenance};
use weft_graph::GraphStore;
use weft_graph::metrics::path::hop_distances;

use crate::discover::{Mentions, discover, resolve_mentions, resolve_source};
use crate::score::{Profile, ScoreBreakdown, score_pair};

/// Edge type for candidates the source body mentions inline.
pub const MENTION_EDGE_TYPE: &str = "mentions";

/// Edge type for reference candidates.
pub const CITATION_EDGE_TYPE: &str = "cites";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReweaveRequest {
    /// Source id; the latest live node when absent.
    pub source: Option<String>,
    /// Body text of the source, scanned for inline `[[references]]`.
    pub body: Option<String>,
    pub dry_run: bool,
}

/// A scored candidate link from the source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub id: String,
    pub title: String,
    pub edge_type: String,
    pub score: f64,
    pub mentioned: bool,
    pub breakdown: ScoreBreakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReweaveReport {
    pub source_id: String,
    pub dry_run: bool,
    /// Number of candidates scored.
    pub examined: usize,
    /// Retained candidates, strongest first.
    pub candidates: Vec<Candidate>,
    pub added: Vec<Edge>,
    pub log_id: Option<i64>,
    pub status: Vec<StatusUpdate>,
}

fn infer_edge_type(candidate: &Node, mentioned: bool, config: &DensifyConfig) -> String {
    if mentioned {
        MENTION_EDGE_TYPE.to_string()
    } else if candidate.content_type == ContentType::Reference {
        CITATION_EDGE_TYPE.to_string()
    } else {
        config.default_edge_type.clone()
    }
}

/// Score every discovered candidate against the source.
///
/// # Errors
///
/// Returns a storage error if the snapshot or a lookup fails.
pub fn score_candidates(
    store: &mut GraphStore<'_>,
    source: &Node,
    body: Option<&str>,
    config: &DensifyConfig,
) -> Result<(Vec<Candidate>, Vec<String>)> {
    let conn = store.conn();
    let mut warnings = Vec::new();
    let mentions = match body {
        Some(body) => resolve_mentions(conn, body)?,
        None => Mentions::default(),
    };
    for target in &mentions.unresolved {
        warnings.push(format!("inline reference [[{target}]] does not match any content"));
    }

    let g = store.graph()?;
    let candidates = discover(conn, g, source)?;
    let hops: HashMap<&str, usize> = match g.node_index(&source.id) {
        Some(idx) => hop_distances(g, idx, config.proximity_max_hops)
            .into_iter()
            .enumerate()
            .filter_map(|(i, d)| d.map(|d| (g.node_id(NodeIndex::new(i)), d)))
            .collect(),
        None => HashMap::new(),
    };

    let source_profile = Profile::of(source);
    let scored = candidates
        .iter()
        .map(|node| {
            let mentioned = mentions.resolved.contains(&node.id);
            let breakdown = score_pair(
                &source_profile,
                &Profile::of(node),
                hops.get(node.id.as_str()).copied(),
                mentioned,
                config,
            );
            Candidate {
                id: node.id.clone(),
                title: node.title.clone(),
                edge_type: infer_edge_type(node, mentioned, config),
                score: breakdown.total,
                mentioned,
                breakdown,
            }
        })
        .collect();
    Ok((scored, warnings))
}

/// Drop candidates below `min_score`, then keep the `max_links` strongest.
/// Ties break by ascending id.
#[must_use]
pub fn filter_candidates(mut candidates: Vec<Candidate>, config: &DensifyConfig) -> Vec<Candidate> {
    candidates.retain(|c| c.score >= config.min_score);
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.id.cmp(&b.id)));
    candidates.truncate(config.max_links);
    candidates
}

/// Outcome of the connect stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Connected {
    pub added: Vec<Edge>,
    pub log_id: Option<i64>,
    pub status: Vec<StatusUpdate>,
}

/// Create one pipeline edge per candidate, recompute the source status and
/// append a `connect` log entry. No entry is written when nothing was added.
///
/// # Errors
///
/// Returns a storage error if any write fails.
pub fn connect(
    store: &mut GraphStore<'_>,
    source_id: &str,
    candidates: &[Candidate],
    config: &VaultConfig,
) -> Result<Connected> {
    let now = query::now_us();
    let mut logged = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let edge = Edge {
            source_id: source_id.to_string(),
            target_id: candidate.id.clone(),
            edge_type: candidate.edge_type.clone(),
            weight: candidate.score,
            provenance: Provenance::Pipeline,
        };
        if store.add_edge(&edge, now)? {
            logged.push(LoggedEdge::added(edge));
        }
    }
    if logged.is_empty() {
        return Ok(Connected::default());
    }

    let conn = store.conn();
    let status = recompute_statuses(conn, [source_id], &config.status)?;
    let log_id = query::append_log(conn, LogKind::Connect, Some(source_id), None, &logged, now)?;
    Ok(Connected {
        added: logged.into_iter().map(|l| l.edge).collect(),
        log_id: Some(log_id),
        status,
    })
}

/// Run the full pipeline for one source.
///
/// # Errors
///
/// - [`weft_core::WeftError::Validation`] for a malformed or archived
///   source, or an empty vault.
/// - [`weft_core::WeftError::NotFound`] when the source does not exist.
/// - Storage errors from any stage.
#[instrument(skip(tx, request, config), fields(source = ?request.source, dry_run = request.dry_run))]
pub fn reweave(
    tx: &Transaction<'_>,
    request: &ReweaveRequest,
    config: &VaultConfig,
) -> Result<Applied<ReweaveReport>> {
    let source = resolve_source(tx, request.source.as_deref())?;
    let mut store = GraphStore::new(tx);

    let (scored, mut warnings) =
        score_candidates(&mut store, &source, request.body.as_deref(), &config.densify)?;
    let examined = scored.len();
    let mut report = ReweaveReport {
        source_id: source.id.clone(),
        dry_run: request.dry_run,
        examined,
        candidates: filter_candidates(scored, &config.densify),
        added: Vec::new(),
        log_id: None,
        status: Vec::new(),
    };

    let mut events = Vec::new();
    if report.candidates.is_empty() {
        warnings.push(format!(
            "no candidate reached the minimum score of {}",
            config.densify.min_score
        ));
    } else if !request.dry_run {
        let connected = connect(&mut store, &source.id, &report.candidates, config)?;
        if let Some(log_id) = connected.log_id {
            events.push(LifecycleEvent::DensificationCompleted {
                source_id: Some(source.id.clone()),
                log_id,
                added: connected.added.len(),
                removed: 0,
            });
        }
        report.added = connected.added;
        report.log_id = connected.log_id;
        report.status = connected.status;
    }

    info!(
        source = %report.source_id,
        examined = report.examined,
        retained = report.candidates.len(),
        added = report.added.len(),
        "reweave finished"
    );
    let mut applied = Applied::new(report);
    applied.events = events;
    applied.warnings = warnings;
    Ok(applied)
}
