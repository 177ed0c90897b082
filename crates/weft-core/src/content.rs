//! Content operations: create, link, update, transition, archive, sessions,
//! and integrity checks.
//!
//! Every write runs on a caller-supplied transaction and returns an
//! [`Applied`] carrying the lifecycle events to dispatch once the caller
//! commits. Nothing here opens or commits a transaction.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use rusqlite::{Connection, Transaction};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::config::{StatusThresholds, VaultConfig};
use crate::db::query;
use crate::error::{Result, WeftError};
use crate::events::{Applied, LifecycleEvent};
use crate::id;
use crate::links::flatten_declarations;
use crate::model::{
    ContentType, Edge, IdScheme, Lifecycle, Maturity, NewContent, Node, NoteStatus, StatusFamily,
    status,
};

/// Result of [`create_content`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Created {
    pub id: String,
    pub content_type: ContentType,
    pub status: String,
    /// `true` when the title was already present and no row was written.
    pub existing: bool,
}

/// A machine status that moved because outgoing edges changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusUpdate {
    pub id: String,
    pub from: String,
    pub to: String,
}

/// Result of [`set_links`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkChange {
    pub id: String,
    pub added: Vec<Edge>,
    pub removed: Vec<Edge>,
    pub status: String,
}

/// Attribute edits for [`update_content`]. `None` leaves a field alone; an
/// empty string clears an optional field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub topic: Option<String>,
    pub subtype: Option<String>,
    pub tags: Option<BTreeSet<String>>,
}

/// Result of [`update_content`] and [`archive`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Updated {
    pub id: String,
    pub fields: Vec<String>,
}

/// Result of [`transition`] and [`set_maturity`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transitioned {
    pub id: String,
    pub from: String,
    pub to: String,
    pub closed: bool,
}

fn load(conn: &Connection, node_id: &str) -> Result<Node> {
    id::validate_id(node_id)?;
    query::get_node(conn, node_id)?.ok_or_else(|| WeftError::not_found("node", node_id))
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn clean_tags(tags: &BTreeSet<String>) -> BTreeSet<String> {
    tags.iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Create a content item.
///
/// Hash-addressed types return the existing id with a warning when the same
/// normalized title is already stored, or when the title's hash id belongs
/// to a node retitled since. They fail with [`WeftError::Collision`] when
/// the id is bound to a different title that hashes to it as well.
///
/// # Errors
///
/// - [`WeftError::Validation`] for an empty title, a malformed link target,
///   or a link to the node itself.
/// - [`WeftError::NotFound`] when a declared link target does not exist.
/// - [`WeftError::Collision`] as described above.
#[instrument(skip(tx, new, config), fields(title = %new.title))]
pub fn create_content(
    tx: &Transaction<'_>,
    new: &NewContent,
    config: &VaultConfig,
) -> Result<Applied<Created>> {
    let content_type = new.content_type.unwrap_or(ContentType::Note);
    let title = new.title.trim();
    let normalized = id::normalize_title(title);
    if normalized.is_empty() {
        return Err(WeftError::validation(
            "title must contain at least one letter or digit",
        ));
    }

    if let IdScheme::ContentHash { prefix } = content_type.id_scheme()
        && let Some(existing) = existing_owner(tx, content_type, prefix, title, &normalized)?
    {
        let node = load(tx, &existing)?;
        let warning = if id::normalize_title(&node.title) == normalized {
            format!("'{title}' already exists as {existing}")
        } else {
            format!("'{title}' was retitled; {existing} is now '{}'", node.title)
        };
        debug!(node_id = %existing, "title already present");
        return Ok(Applied::new(Created {
            id: existing,
            content_type: node.content_type,
            status: node.status,
            existing: true,
        })
        .with_warning(warning));
    }

    let node_id = id::allocate(tx, content_type, title)?;
    let declarations = flatten_declarations(&new.links);
    for decl in &declarations {
        id::validate_id(&decl.target_id)?;
        if decl.target_id == node_id {
            return Err(WeftError::validation(format!(
                "{node_id} cannot link to itself"
            )));
        }
        if !query::node_exists(tx, &decl.target_id)? {
            return Err(WeftError::not_found("node", decl.target_id.clone()));
        }
    }

    let family = content_type.status_family();
    let maturity = new.maturity.or_else(|| {
        (family == StatusFamily::Machine).then(<Maturity as Lifecycle>::initial)
    });
    let now = query::now_us();
    let node = Node {
        id: node_id.clone(),
        content_type,
        subtype: non_empty(new.subtype.as_deref()),
        status: status::initial_status(family).to_string(),
        maturity,
        title: title.to_string(),
        description: non_empty(new.description.as_deref()),
        tags: clean_tags(&new.tags),
        topic: non_empty(new.topic.as_deref()),
        created_at_us: now,
        updated_at_us: now,
        archived: false,
        analytics: crate::model::AnalyticsSnapshot::default(),
    };
    query::insert_node(tx, &node, &normalized)?;

    for decl in &declarations {
        let edge = Edge::manual(&node_id, &decl.target_id, &decl.edge_type);
        query::insert_edge(tx, &edge, now)?;
    }
    let updates = recompute_statuses(tx, [node_id.as_str()], &config.status)?;
    let status = updates
        .last()
        .map_or_else(|| node.status.clone(), |u| u.to.clone());

    info!(%node_id, %content_type, links = declarations.len(), "content created");
    Ok(Applied::new(Created {
        id: node_id.clone(),
        content_type,
        status,
        existing: false,
    })
    .with_event(LifecycleEvent::ContentCreated {
        id: node_id,
        content_type: content_type.to_string(),
    }))
}

/// The node a hash-addressed title already belongs to.
///
/// That is a node of the same type currently stored under the title, or the
/// node created under it and retitled since. A hash id created under a
/// different title is a collision.
fn existing_owner(
    tx: &Transaction<'_>,
    content_type: ContentType,
    prefix: &str,
    title: &str,
    normalized: &str,
) -> Result<Option<String>> {
    if let Some(owner) = query::find_titled(tx, content_type, normalized)? {
        return Ok(Some(owner));
    }
    let node_id = id::content_hash_id(prefix, title);
    let Some(origin) = query::origin_title_of(tx, &node_id)? else {
        return Ok(None);
    };
    if origin == normalized {
        return Ok(Some(node_id));
    }
    let existing_title = load(tx, &node_id)?.title;
    Err(WeftError::Collision {
        id: node_id,
        existing_title,
        title: title.to_string(),
    })
}

/// Fail when retitling `node` to `normalized` would take a title, or the
/// hash id of a title, that another node already holds.
fn ensure_title_free(
    tx: &Transaction<'_>,
    node: &Node,
    prefix: &str,
    title: &str,
    normalized: &str,
) -> Result<()> {
    let holder = match query::find_titled(tx, node.content_type, normalized)? {
        Some(other) => Some(other),
        None => {
            let hashed = id::content_hash_id(prefix, normalized);
            query::node_exists(tx, &hashed)?.then_some(hashed)
        }
    };
    match holder {
        Some(other) if other != node.id => Err(WeftError::Collision {
            existing_title: load(tx, &other)?.title,
            id: other,
            title: title.to_string(),
        }),
        _ => Ok(()),
    }
}

/// Replace the manual outgoing edges of `node_id` with `declarations`.
///
/// Pipeline-authored edges are left untouched.
///
/// # Errors
///
/// - [`WeftError::NotFound`] when the node or a target does not exist.
/// - [`WeftError::Validation`] for malformed targets or self links.
pub fn set_links(
    tx: &Transaction<'_>,
    node_id: &str,
    declarations: &BTreeMap<String, Vec<String>>,
    config: &VaultConfig,
) -> Result<Applied<LinkChange>> {
    let node = load(tx, node_id)?;
    let declarations = flatten_declarations(declarations);
    for decl in &declarations {
        id::validate_id(&decl.target_id)?;
        if decl.target_id == node.id {
            return Err(WeftError::validation(format!(
                "{node_id} cannot link to itself"
            )));
        }
        if !query::node_exists(tx, &decl.target_id)? {
            return Err(WeftError::not_found("node", decl.target_id.clone()));
        }
    }

    let previous = query::delete_manual_outgoing(tx, node_id)?;
    let now = query::now_us();
    let mut current = Vec::with_capacity(declarations.len());
    for decl in &declarations {
        let edge = Edge::manual(node_id, &decl.target_id, &decl.edge_type);
        query::insert_edge(tx, &edge, now)?;
        current.push(edge);
    }

    let before: HashSet<_> = previous.iter().map(Edge::key).collect();
    let after: HashSet<_> = current.iter().map(Edge::key).collect();
    let added: Vec<Edge> = current
        .iter()
        .filter(|e| !before.contains(&e.key()))
        .cloned()
        .collect();
    let removed: Vec<Edge> = previous
        .into_iter()
        .filter(|e| !after.contains(&e.key()))
        .collect();

    let updates = recompute_statuses(tx, [node_id], &config.status)?;
    let status = updates
        .last()
        .map_or_else(|| node.status.clone(), |u| u.to.clone());

    debug!(
        node_id,
        added = added.len(),
        removed = removed.len(),
        "links replaced"
    );
    let mut applied = Applied::new(LinkChange {
        id: node_id.to_string(),
        added,
        removed,
        status,
    });
    if !applied.value.added.is_empty() || !applied.value.removed.is_empty() {
        applied = applied.with_event(LifecycleEvent::ContentUpdated {
            id: node_id.to_string(),
            fields: vec!["links".to_string()],
        });
    }
    Ok(applied)
}

/// Edit the descriptive attributes of a node.
///
/// Hash-addressed nodes keep their id when retitled.
///
/// # Errors
///
/// - [`WeftError::NotFound`] when the node does not exist.
/// - [`WeftError::Validation`] for an empty title.
/// - [`WeftError::Collision`] when another node of the same type already
///   holds the new title or its hash id.
pub fn update_content(
    tx: &Transaction<'_>,
    node_id: &str,
    patch: &ContentPatch,
) -> Result<Applied<Updated>> {
    let mut node = load(tx, node_id)?;
    let mut normalized = query::normalized_title_of(tx, node_id)?
        .unwrap_or_else(|| id::normalize_title(&node.title));
    let mut fields = Vec::new();

    if let Some(title) = patch.title.as_deref().map(str::trim) {
        let next = id::normalize_title(title);
        if next.is_empty() {
            return Err(WeftError::validation(
                "title must contain at least one letter or digit",
            ));
        }
        if title != node.title {
            if next != normalized
                && let IdScheme::ContentHash { prefix } = node.content_type.id_scheme()
            {
                ensure_title_free(tx, &node, prefix, title, &next)?;
            }
            node.title = title.to_string();
            normalized = next;
            fields.push("title");
        }
    }
    if let Some(raw) = patch.description.as_deref() {
        let value = non_empty(Some(raw));
        if value != node.description {
            node.description = value;
            fields.push("description");
        }
    }
    if let Some(raw) = patch.topic.as_deref() {
        let value = non_empty(Some(raw));
        if value != node.topic {
            node.topic = value;
            fields.push("topic");
        }
    }
    if let Some(raw) = patch.subtype.as_deref() {
        let value = non_empty(Some(raw));
        if value != node.subtype {
            node.subtype = value;
            fields.push("subtype");
        }
    }
    if let Some(tags) = &patch.tags {
        let tags = clean_tags(tags);
        if tags != node.tags {
            node.tags = tags;
            fields.push("tags");
        }
    }

    let fields: Vec<String> = fields.into_iter().map(str::to_string).collect();
    if fields.is_empty() {
        return Ok(Applied::new(Updated {
            id: node_id.to_string(),
            fields,
        })
        .with_warning(format!("{node_id} unchanged")));
    }

    node.updated_at_us = query::now_us();
    query::update_node(tx, &node, &normalized)?;
    Ok(Applied::new(Updated {
        id: node_id.to_string(),
        fields: fields.clone(),
    })
    .with_event(LifecycleEvent::ContentUpdated {
        id: node_id.to_string(),
        fields,
    }))
}

/// Move an externally driven status through its transition table.
///
/// # Errors
///
/// - [`WeftError::NotFound`] when the node does not exist.
/// - [`WeftError::InvalidTransition`] for machine statuses, self
///   transitions, and moves the table does not list.
/// - [`WeftError::Validation`] for unknown status names.
pub fn transition(tx: &Transaction<'_>, node_id: &str, target: &str) -> Result<Applied<Transitioned>> {
    let node = load(tx, node_id)?;
    let change = status::transition(node.content_type.status_family(), &node.status, target)?;
    query::set_status(tx, node_id, &change.to, query::now_us())?;

    info!(node_id, from = %change.from, to = %change.to, "status changed");
    let mut applied = Applied::new(Transitioned {
        id: node_id.to_string(),
        from: change.from,
        to: change.to.clone(),
        closed: change.terminal,
    })
    .with_event(LifecycleEvent::ContentUpdated {
        id: node_id.to_string(),
        fields: vec!["status".to_string()],
    });
    if change.terminal {
        let event = if node.content_type == ContentType::Session {
            LifecycleEvent::SessionClosed {
                id: node_id.to_string(),
            }
        } else {
            LifecycleEvent::ContentClosed {
                id: node_id.to_string(),
                status: change.to,
            }
        };
        applied = applied.with_event(event);
    }
    Ok(applied)
}

/// Move advisory maturity one step.
///
/// # Errors
///
/// - [`WeftError::NotFound`] when the node does not exist.
/// - [`WeftError::InvalidTransition`] when the move is not allowed.
/// - [`WeftError::Validation`] for unknown maturity names.
pub fn set_maturity(tx: &Transaction<'_>, node_id: &str, target: &str) -> Result<Applied<Transitioned>> {
    let mut node = load(tx, node_id)?;
    let target: Maturity = target
        .parse()
        .map_err(|_| WeftError::validation(format!("'{target}' is not a maturity")))?;
    let current = node.maturity.unwrap_or_else(<Maturity as Lifecycle>::initial);
    current.can_transition_to(target)?;

    let normalized = query::normalized_title_of(tx, node_id)?
        .unwrap_or_else(|| id::normalize_title(&node.title));
    node.maturity = Some(target);
    node.updated_at_us = query::now_us();
    query::update_node(tx, &node, &normalized)?;

    Ok(Applied::new(Transitioned {
        id: node_id.to_string(),
        from: current.to_string(),
        to: target.to_string(),
        closed: false,
    })
    .with_event(LifecycleEvent::ContentUpdated {
        id: node_id.to_string(),
        fields: vec!["maturity".to_string()],
    }))
}

/// Flag a node as archived. Rows and edges are kept.
///
/// # Errors
///
/// Returns [`WeftError::NotFound`] when the node does not exist.
pub fn archive(tx: &Transaction<'_>, node_id: &str) -> Result<Applied<Updated>> {
    let mut node = load(tx, node_id)?;
    if node.archived {
        return Ok(Applied::new(Updated {
            id: node_id.to_string(),
            fields: Vec::new(),
        })
        .with_warning(format!("{node_id} is already archived")));
    }
    let normalized = query::normalized_title_of(tx, node_id)?
        .unwrap_or_else(|| id::normalize_title(&node.title));
    node.archived = true;
    node.updated_at_us = query::now_us();
    query::update_node(tx, &node, &normalized)?;

    info!(node_id, "archived");
    let fields = vec!["archived".to_string()];
    Ok(Applied::new(Updated {
        id: node_id.to_string(),
        fields: fields.clone(),
    })
    .with_event(LifecycleEvent::ContentUpdated {
        id: node_id.to_string(),
        fields,
    }))
}

/// Open a session log.
///
/// # Errors
///
/// Propagates [`create_content`] failures.
pub fn start_session(
    tx: &Transaction<'_>,
    title: &str,
    config: &VaultConfig,
) -> Result<Applied<Created>> {
    let new = NewContent::new(ContentType::Session, title);
    let applied = create_content(tx, &new, config)?;
    let id = applied.value.id.clone();
    Ok(applied.with_event(LifecycleEvent::SessionStarted { id }))
}

/// Close a session log.
///
/// # Errors
///
/// - [`WeftError::Validation`] when `node_id` is not a session.
/// - Propagates [`transition`] failures.
pub fn close_session(tx: &Transaction<'_>, node_id: &str) -> Result<Applied<Transitioned>> {
    id::validate_id_for(ContentType::Session, node_id)?;
    transition(tx, node_id, "closed")
}

/// Recompute machine statuses of `ids` from their outgoing edge counts.
///
/// Nodes with externally driven statuses and unknown ids are skipped.
/// Returns only the statuses that changed.
///
/// # Errors
///
/// Returns a storage error if a read or write fails.
pub fn recompute_statuses<'a, I>(
    conn: &Connection,
    ids: I,
    thresholds: &StatusThresholds,
) -> Result<Vec<StatusUpdate>>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    let mut updates = Vec::new();
    let now = query::now_us();
    for node_id in ids {
        if !seen.insert(node_id) {
            continue;
        }
        let Some(node) = query::get_node(conn, node_id)? else {
            continue;
        };
        if node.content_type.status_family() != StatusFamily::Machine {
            continue;
        }
        let derived = NoteStatus::from_out_degree(query::out_degree(conn, node_id)?, thresholds);
        if query::set_status(conn, node_id, derived.as_str(), now)? {
            debug!(node_id, from = %node.status, to = %derived, "machine status recomputed");
            updates.push(StatusUpdate {
                id: node_id.to_string(),
                from: node.status,
                to: derived.to_string(),
            });
        }
    }
    Ok(updates)
}

// ---------------------------------------------------------------------------
// Integrity
// ---------------------------------------------------------------------------

/// Kinds of inconsistency [`check_integrity`] looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    DanglingEdge,
    SelfLoop,
    InvalidId,
    StaleStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityIssue {
    pub kind: IssueKind,
    pub node_id: String,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub nodes: usize,
    pub edges: usize,
    pub issues: Vec<IntegrityIssue>,
    pub repaired: usize,
}

impl IntegrityReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.issues.len() == self.repaired
    }
}

/// Scan the index for dangling edges, self loops, malformed ids, and stale
/// machine statuses. With `repair`, stale statuses are recomputed.
///
/// # Errors
///
/// Returns a storage error if the scan fails.
#[instrument(skip(tx, config))]
pub fn check_integrity(
    tx: &Transaction<'_>,
    config: &VaultConfig,
    repair: bool,
) -> Result<Applied<IntegrityReport>> {
    let nodes = query::list_nodes(tx, true)?;
    let edges = query::list_edges(tx)?;
    let known: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    let mut issues = Vec::new();

    for edge in &edges {
        if edge.source_id == edge.target_id {
            issues.push(IntegrityIssue {
                kind: IssueKind::SelfLoop,
                node_id: edge.source_id.clone(),
                detail: format!("{} links to itself", edge.source_id),
            });
        }
        for end in [&edge.source_id, &edge.target_id] {
            if !known.contains(end.as_str()) {
                issues.push(IntegrityIssue {
                    kind: IssueKind::DanglingEdge,
                    node_id: end.clone(),
                    detail: format!(
                        "edge {} -[{}]-> {} references a missing node",
                        edge.source_id, edge.edge_type, edge.target_id
                    ),
                });
            }
        }
    }

    let mut stale = Vec::new();
    for node in &nodes {
        if let Err(err) = id::validate_id_for(node.content_type, &node.id) {
            issues.push(IntegrityIssue {
                kind: IssueKind::InvalidId,
                node_id: node.id.clone(),
                detail: err.to_string(),
            });
        }
        if node.content_type.status_family() == StatusFamily::Machine {
            let out = edges.iter().filter(|e| e.source_id == node.id).count();
            let derived = NoteStatus::from_out_degree(out, &config.status);
            if node.status != derived.as_str() {
                issues.push(IntegrityIssue {
                    kind: IssueKind::StaleStatus,
                    node_id: node.id.clone(),
                    detail: format!("status '{}' but {out} outgoing edges imply '{derived}'", node.status),
                });
                stale.push(node.id.as_str());
            }
        }
    }

    let repaired = if repair {
        recompute_statuses(tx, stale, &config.status)?.len()
    } else {
        0
    };

    info!(issues = issues.len(), repaired, "integrity checked");
    let report = IntegrityReport {
        nodes: nodes.len(),
        edges: edges.len(),
        issues,
        repaired,
    };
    let event = LifecycleEvent::IntegrityChecked {
        issues: report.issues.len(),
        repaired,
    };
    Ok(Applied::new(report).with_event(event))
}
