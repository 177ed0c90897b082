//! Reversal of densification log entries.
//!
//! Undo applies the inverse of every edge mutation a `connect` or `prune`
//! entry recorded, recomputes the affected statuses, and appends an `undo`
//! entry pointing at the reverted one. An entry can be reverted once; undo
//! entries themselves cannot be reverted.

use rusqlite::Transaction;
use serde::Serialize;
use tracing::{info, instrument, warn};
use weft_core::config::VaultConfig;
use weft_core::content::{StatusUpdate, recompute_statuses};
use weft_core::db::query;
use weft_core::error::{Result, WeftError};
use weft_core::events::{Applied, LifecycleEvent};
use weft_core::model::{EdgeAction, Edge, LogEntry, LogKind, LoggedEdge};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UndoReport {
    pub reverted_log_id: i64,
    pub reverted_kind: LogKind,
    /// The new `undo` entry.
    pub log_id: i64,
    /// Edges re-created because the reverted entry removed them.
    pub restored: Vec<Edge>,
    /// Edges deleted because the reverted entry added them.
    pub removed: Vec<Edge>,
    pub status: Vec<StatusUpdate>,
}

fn target_entry(tx: &Transaction<'_>, log_id: Option<i64>) -> Result<LogEntry> {
    let Some(log_id) = log_id else {
        return query::latest_revertible_log(tx)?.ok_or(WeftError::NoHistory);
    };
    let entry = query::get_log_entry(tx, log_id)?
        .ok_or_else(|| WeftError::not_found("log entry", log_id.to_string()))?;
    if entry.kind == LogKind::Undo {
        return Err(WeftError::validation(format!(
            "log entry {log_id} is an undo and cannot be reverted"
        )));
    }
    if let Some(undo_id) = query::reverted_by(tx, log_id)? {
        return Err(WeftError::validation(format!(
            "log entry {log_id} was already reverted by {undo_id}"
        )));
    }
    Ok(entry)
}

/// Revert `log_id`, or the newest entry not yet reverted.
///
/// # Errors
///
/// - [`WeftError::NoHistory`] without an id when nothing is left to revert.
/// - [`WeftError::NotFound`] when `log_id` does not exist.
/// - [`WeftError::Validation`] when `log_id` is an undo entry or was
///   already reverted.
#[instrument(skip(tx, config))]
pub fn undo(
    tx: &Transaction<'_>,
    log_id: Option<i64>,
    config: &VaultConfig,
) -> Result<Applied<UndoReport>> {
    let entry = target_entry(tx, log_id)?;
    let now = query::now_us();
    let mut applied_edges = Vec::with_capacity(entry.edges.len());
    let mut warnings = Vec::new();

    // Reverse order so a replayed sequence unwinds cleanly.
    for logged in entry.edges.iter().rev() {
        let inverse = logged.inverse();
        let done = match inverse.action {
            EdgeAction::Removed => query::delete_edge(tx, &inverse.edge.key())?.is_some(),
            EdgeAction::Added => {
                query::node_exists(tx, &inverse.edge.source_id)?
                    && query::node_exists(tx, &inverse.edge.target_id)?
                    && query::insert_edge(tx, &inverse.edge, now)?
            }
        };
        if done {
            applied_edges.push(inverse);
        } else {
            warn!(log_id = entry.log_id, edge = ?inverse.edge.key(), "edge already in reverted state");
            warnings.push(format!(
                "{} -[{}]-> {} was already {}",
                inverse.edge.source_id,
                inverse.edge.edge_type,
                inverse.edge.target_id,
                inverse.action
            ));
        }
    }

    let status = recompute_statuses(
        tx,
        entry.edges.iter().map(|l| l.edge.source_id.as_str()),
        &config.status,
    )?;
    let undo_id = query::append_log(
        tx,
        LogKind::Undo,
        entry.target_id.as_deref(),
        Some(entry.log_id),
        &applied_edges,
        now,
    )?;

    let (restored, removed) = split(applied_edges);
    info!(
        reverted = entry.log_id,
        undo_id,
        restored = restored.len(),
        removed = removed.len(),
        "log entry reverted"
    );
    let event = LifecycleEvent::DensificationCompleted {
        source_id: entry.target_id.clone(),
        log_id: undo_id,
        added: restored.len(),
        removed: removed.len(),
    };
    let mut applied = Applied::new(UndoReport {
        reverted_log_id: entry.log_id,
        reverted_kind: entry.kind,
        log_id: undo_id,
        restored,
        removed,
        status,
    })
    .with_event(event);
    applied.warnings = warnings;
    Ok(applied)
}

fn split(edges: Vec<LoggedEdge>) -> (Vec<Edge>, Vec<Edge>) {
    let mut restored = Vec::new();
    let mut removed = Vec::new();
    for logged in edges {
        match logged.action {
            EdgeAction::Added => restored.push(logged.edge),
            EdgeAction::Removed => removed.push(logged.edge),
        }
    }
    (restored, removed)
}

/// The newest `limit` log entries.
///
/// # Errors
///
/// Returns a storage error if the listing fails.
pub fn history(tx: &Transaction<'_>, limit: usize) -> Result<Vec<LogEntry>> {
    Ok(query::list_log(tx, limit)?)
}
