//! Source resolution and candidate discovery.

use std::collections::BTreeSet;

use rusqlite::Connection;
use tracing::debug;
use weft_core::db::query;
use weft_core::error::{Result, WeftError};
use weft_core::id;
use weft_core::links::extract_inline_refs;
use weft_core::model::Node;
use weft_graph::VaultGraph;

/// The node a densification run is centred on.
///
/// An explicit id must exist and must not be archived; without one the most
/// recently created non-archived node is used.
///
/// # Errors
///
/// - [`WeftError::Validation`] for a malformed or archived source, or an
///   empty vault.
/// - [`WeftError::NotFound`] when the explicit source does not exist.
pub fn resolve_source(conn: &Connection, source: Option<&str>) -> Result<Node> {
    let node_id = match source {
        Some(node_id) => {
            id::validate_id(node_id)?;
            node_id.to_string()
        }
        None => query::latest_node_id(conn)?
            .ok_or_else(|| WeftError::validation("the vault has no content to densify"))?,
    };
    let node =
        query::get_node(conn, &node_id)?.ok_or_else(|| WeftError::not_found("node", &node_id))?;
    if node.archived {
        return Err(WeftError::validation(format!(
            "{node_id} is archived and cannot be densified"
        )));
    }
    Ok(node)
}

/// Resolve inline reference text to a node id.
///
/// Tried in order: the text as an id, the content-hash id of the text for
/// each hash namespace, then a normalized-title match.
///
/// # Errors
///
/// Returns a storage error if a lookup fails.
pub fn resolve_reference(conn: &Connection, target: &str) -> Result<Option<String>> {
    if id::is_valid_id(target) && query::node_exists(conn, target)? {
        return Ok(Some(target.to_string()));
    }
    for prefix in ["note-", "ref-"] {
        let hashed = id::content_hash_id(prefix, target);
        if query::node_exists(conn, &hashed)? {
            return Ok(Some(hashed));
        }
    }
    let normalized = id::normalize_title(target);
    if normalized.is_empty() {
        return Ok(None);
    }
    Ok(query::find_by_normalized_title(conn, &normalized)?)
}

/// Inline references of a body, split into resolved ids and unresolved
/// target texts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mentions {
    pub resolved: BTreeSet<String>,
    pub unresolved: Vec<String>,
}

/// Extract and resolve the inline references of `body`.
///
/// # Errors
///
/// Returns a storage error if a lookup fails.
pub fn resolve_mentions(conn: &Connection, body: &str) -> Result<Mentions> {
    let mut mentions = Mentions::default();
    for reference in extract_inline_refs(body) {
        match resolve_reference(conn, &reference.target)? {
            Some(node_id) => {
                mentions.resolved.insert(node_id);
            }
            None => mentions.unresolved.push(reference.target),
        }
    }
    Ok(mentions)
}

/// Every other non-archived node with no direct edge to `source` in either
/// direction, ordered by id.
///
/// # Errors
///
/// Returns a storage error if the node listing fails.
pub fn discover(conn: &Connection, graph: &VaultGraph, source: &Node) -> Result<Vec<Node>> {
    let source_idx = graph.node_index(&source.id);
    let candidates: Vec<Node> = query::list_nodes(conn, false)?
        .into_iter()
        .filter(|node| node.id != source.id)
        .filter(|node| {
            match (source_idx, graph.node_index(&node.id)) {
                (Some(s), Some(c)) => !graph.linked(s, c),
                _ => true,
            }
        })
        .collect();
    debug!(source = %source.id, candidates = candidates.len(), "discovered candidates");
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use weft_core::config::VaultConfig;
    use weft_core::content::{archive, create_content};
    use weft_core::db;
    use weft_core::model::{ContentType, Edge, NewContent};

    fn seeded() -> (rusqlite::Connection, Vec<String>) {
        let mut conn = db::open_memory().expect("store");
        let cfg = VaultConfig::default();
        let tx = db::begin_write(&mut conn).expect("begin");
        let ids: Vec<String> = ["Rivers", "Deltas", "Estuaries", "Glaciers"]
            .iter()
            .map(|t| {
                create_content(&tx, &NewContent::new(ContentType::Note, *t), &cfg)
                    .expect("create")
                    .value
                    .id
            })
            .collect();
        query::insert_edge(&tx, &Edge::manual(&ids[1], &ids[0], "relates"), 1).expect("edge");
        archive(&tx, &ids[3]).expect("archive");
        tx.commit().expect("commit");
        (conn, ids)
    }

    #[test]
    fn discover_skips_self_linked_and_archived_nodes() {
        let (conn, ids) = seeded();
        let graph = VaultGraph::from_sqlite(&conn).expect("graph");
        let source = resolve_source(&conn, Some(&ids[0])).expect("source");
        let found: Vec<String> = discover(&conn, &graph, &source)
            .expect("discover")
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(found, vec![ids[2].clone()]);
    }

    #[test]
    fn default_source_is_latest_live_node() {
        let (conn, ids) = seeded();
        let source = resolve_source(&conn, None).expect("source");
        assert_eq!(source.id, ids[2]);
    }

    #[test]
    fn archived_or_missing_sources_are_rejected() {
        let (conn, ids) = seeded();
        assert_eq!(
            resolve_source(&conn, Some(&ids[3])).expect_err("archived").code(),
            weft_core::ErrorCode::Validation
        );
        assert_eq!(
            resolve_source(&conn, Some("note-00000000")).expect_err("missing").code(),
            weft_core::ErrorCode::NotFound
        );
    }

    #[test]
    fn references_resolve_by_id_hash_and_title() {
        let (conn, ids) = seeded();
        let mentions =
            resolve_mentions(&conn, &format!("See [[{}]], [[deltas]] and [[ESTUARIES!]] and [[Lakes]]", ids[0]))
                .expect("resolve");
        assert!(mentions.resolved.contains(&ids[0]));
        assert!(mentions.resolved.contains(&ids[1]));
        assert!(mentions.resolved.contains(&ids[2]));
        assert_eq!(mentions.unresolved, vec!["Lakes".to_string()]);
    }
}
