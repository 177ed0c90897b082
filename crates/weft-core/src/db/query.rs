//! `SQLite` query helpers for the vault index.
//!
//! All functions take a shared `&Connection` (a `&Transaction` derefs to
//! one) and return `anyhow::Result<T>` with typed structs, never raw rows.
//! Writers must be called inside the caller's transaction.

use std::collections::{BTreeSet, HashMap};

use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, OptionalExtension as _, Row, params};

use crate::model::{
    AnalyticsSnapshot, ContentType, Edge, EdgeAction, EdgeKey, LogEntry, LogKind, LoggedEdge, Node,
    Provenance,
};

const NODE_COLUMNS: &str = "node_id, content_type, subtype, status, maturity, title, description, \
     topic, is_archived, created_at_us, updated_at_us, in_degree, out_degree, rank_score, \
     cluster_id, betweenness";

const EDGE_COLUMNS: &str = "source_id, target_id, edge_type, weight, provenance";

/// Current wall-clock time in microseconds since the Unix epoch.
#[must_use]
pub fn now_us() -> i64 {
    chrono::Utc::now().timestamp_micros()
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn parse_column<T: std::str::FromStr>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>().map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
    })
}

fn row_to_node(row: &Row<'_>) -> rusqlite::Result<Node> {
    let maturity: Option<String> = row.get(4)?;
    let maturity = maturity
        .map(|m| m.parse())
        .transpose()
        .map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(err))
        })?;
    let in_degree: i64 = row.get(11)?;
    let out_degree: i64 = row.get(12)?;

    Ok(Node {
        id: row.get(0)?,
        content_type: parse_column(row, 1)?,
        subtype: row.get(2)?,
        status: row.get(3)?,
        maturity,
        title: row.get(5)?,
        description: row.get(6)?,
        topic: row.get(7)?,
        tags: BTreeSet::new(),
        archived: row.get::<_, i64>(8)? != 0,
        created_at_us: row.get(9)?,
        updated_at_us: row.get(10)?,
        analytics: AnalyticsSnapshot {
            in_degree: u32::try_from(in_degree).unwrap_or(0),
            out_degree: u32::try_from(out_degree).unwrap_or(0),
            rank_score: row.get(13)?,
            cluster_id: row.get(14)?,
            betweenness: row.get(15)?,
        },
    })
}

fn row_to_edge(row: &Row<'_>) -> rusqlite::Result<Edge> {
    Ok(Edge {
        source_id: row.get(0)?,
        target_id: row.get(1)?,
        edge_type: row.get(2)?,
        weight: row.get(3)?,
        provenance: parse_column::<Provenance>(row, 4)?,
    })
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// Fetch one node with its tags.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_node(conn: &Connection, node_id: &str) -> Result<Option<Node>> {
    let sql = format!("SELECT {NODE_COLUMNS} FROM nodes WHERE node_id = ?1");
    let node = conn
        .query_row(&sql, params![node_id], row_to_node)
        .optional()
        .with_context(|| format!("load node {node_id}"))?;

    let Some(mut node) = node else {
        return Ok(None);
    };
    node.tags = get_tags(conn, node_id)?;
    Ok(Some(node))
}

/// Whether a node row exists (archived or not).
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn node_exists(conn: &Connection, node_id: &str) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM nodes WHERE node_id = ?1)",
        params![node_id],
        |row| row.get(0),
    )
    .with_context(|| format!("check node {node_id}"))
}

/// Load every node (optionally skipping archived ones), ordered by id.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_nodes(conn: &Connection, include_archived: bool) -> Result<Vec<Node>> {
    let filter = if include_archived {
        ""
    } else {
        "WHERE is_archived = 0"
    };
    let sql = format!("SELECT {NODE_COLUMNS} FROM nodes {filter} ORDER BY node_id");
    let mut stmt = conn.prepare(&sql).context("prepare node listing")?;
    let mut nodes = stmt
        .query_map([], row_to_node)
        .context("execute node listing")?
        .collect::<Result<Vec<_>, _>>()
        .context("collect nodes")?;

    let mut tags = all_tags(conn)?;
    for node in &mut nodes {
        if let Some(set) = tags.remove(&node.id) {
            node.tags = set;
        }
    }
    Ok(nodes)
}

/// Id of the most recently created non-archived node.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn latest_node_id(conn: &Connection) -> Result<Option<String>> {
    conn.query_row(
        "SELECT node_id FROM nodes
         WHERE is_archived = 0
         ORDER BY created_at_us DESC, rowid DESC
         LIMIT 1",
        [],
        |row| row.get(0),
    )
    .optional()
    .context("load latest node")
}

/// Find a node whose normalized title equals `normalized`.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn find_by_normalized_title(conn: &Connection, normalized: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT node_id FROM nodes WHERE normalized_title = ?1 ORDER BY node_id LIMIT 1",
        params![normalized],
        |row| row.get(0),
    )
    .optional()
    .context("lookup normalized title")
}

/// Node of `content_type` stored under `normalized`, if any.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn find_titled(
    conn: &Connection,
    content_type: ContentType,
    normalized: &str,
) -> Result<Option<String>> {
    conn.query_row(
        "SELECT node_id FROM nodes
         WHERE content_type = ?1 AND normalized_title = ?2
         ORDER BY node_id LIMIT 1",
        params![content_type.as_str(), normalized],
        |row| row.get(0),
    )
    .optional()
    .with_context(|| format!("lookup {content_type} titled '{normalized}'"))
}

/// Normalized title `node_id` was created under, before any retitle.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn origin_title_of(conn: &Connection, node_id: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT COALESCE(origin_title, normalized_title) FROM nodes WHERE node_id = ?1",
        params![node_id],
        |row| row.get(0),
    )
    .optional()
    .with_context(|| format!("load origin title of {node_id}"))
}

/// Stored normalized title of a node.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn normalized_title_of(conn: &Connection, node_id: &str) -> Result<Option<String>> {
    conn.query_row(
        "SELECT normalized_title FROM nodes WHERE node_id = ?1",
        params![node_id],
        |row| row.get(0),
    )
    .optional()
    .with_context(|| format!("load normalized title of {node_id}"))
}

/// Insert a new node and its tags.
///
/// # Errors
///
/// Returns an error if the insert fails (including a duplicate id).
pub fn insert_node(conn: &Connection, node: &Node, normalized_title: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO nodes (
            node_id, content_type, subtype, status, maturity, title, normalized_title,
            origin_title, description, topic, is_archived, created_at_us, updated_at_us
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            node.id,
            node.content_type.as_str(),
            node.subtype,
            node.status,
            node.maturity.map(|m| m.as_str()),
            node.title,
            normalized_title,
            node.description,
            node.topic,
            i64::from(node.archived),
            node.created_at_us,
            node.updated_at_us,
        ],
    )
    .with_context(|| format!("insert node {}", node.id))?;
    replace_tags(conn, &node.id, &node.tags)
}

/// Write the editable attributes of an existing node.
///
/// # Errors
///
/// Returns an error if the node does not exist or the update fails.
pub fn update_node(conn: &Connection, node: &Node, normalized_title: &str) -> Result<()> {
    let changed = conn
        .execute(
            "UPDATE nodes SET
                subtype = ?2, status = ?3, maturity = ?4, title = ?5, normalized_title = ?6,
                description = ?7, topic = ?8, is_archived = ?9, updated_at_us = ?10
             WHERE node_id = ?1",
            params![
                node.id,
                node.subtype,
                node.status,
                node.maturity.map(|m| m.as_str()),
                node.title,
                normalized_title,
                node.description,
                node.topic,
                i64::from(node.archived),
                node.updated_at_us,
            ],
        )
        .with_context(|| format!("update node {}", node.id))?;
    if changed == 0 {
        return Err(anyhow!("node {} disappeared during update", node.id));
    }
    replace_tags(conn, &node.id, &node.tags)
}

/// Overwrite only the status column. Returns `true` if the value changed.
///
/// # Errors
///
/// Returns an error if the update fails.
pub fn set_status(conn: &Connection, node_id: &str, status: &str, now: i64) -> Result<bool> {
    let changed = conn
        .execute(
            "UPDATE nodes SET status = ?2, updated_at_us = ?3
             WHERE node_id = ?1 AND status <> ?2",
            params![node_id, status, now],
        )
        .with_context(|| format!("set status of {node_id}"))?;
    Ok(changed > 0)
}

fn get_tags(conn: &Connection, node_id: &str) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare("SELECT tag FROM node_tags WHERE node_id = ?1 ORDER BY tag")
        .context("prepare tag query")?;
    let tags = stmt
        .query_map(params![node_id], |row| row.get::<_, String>(0))
        .context("execute tag query")?
        .collect::<Result<BTreeSet<_>, _>>()
        .context("collect tags")?;
    Ok(tags)
}

fn all_tags(conn: &Connection) -> Result<HashMap<String, BTreeSet<String>>> {
    let mut stmt = conn
        .prepare("SELECT node_id, tag FROM node_tags")
        .context("prepare tag listing")?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
        .context("execute tag listing")?;
    let mut map: HashMap<String, BTreeSet<String>> = HashMap::new();
    for row in rows {
        let (node_id, tag) = row.context("read tag row")?;
        map.entry(node_id).or_default().insert(tag);
    }
    Ok(map)
}

fn replace_tags(conn: &Connection, node_id: &str, tags: &BTreeSet<String>) -> Result<()> {
    conn.execute("DELETE FROM node_tags WHERE node_id = ?1", params![node_id])
        .with_context(|| format!("clear tags of {node_id}"))?;
    let mut stmt = conn
        .prepare("INSERT OR IGNORE INTO node_tags (node_id, tag) VALUES (?1, ?2)")
        .context("prepare tag insert")?;
    for tag in tags {
        let tag = tag.trim();
        if tag.is_empty() {
            continue;
        }
        stmt.execute(params![node_id, tag])
            .with_context(|| format!("tag {node_id} with {tag}"))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Edges
// ---------------------------------------------------------------------------

/// Load all edges, ordered by `(source, target, type)`.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_edges(conn: &Connection) -> Result<Vec<Edge>> {
    let sql = format!("SELECT {EDGE_COLUMNS} FROM edges ORDER BY source_id, target_id, edge_type");
    let mut stmt = conn.prepare(&sql).context("prepare edge listing")?;
    let edges = stmt
        .query_map([], row_to_edge)
        .context("execute edge listing")?
        .collect::<Result<Vec<_>, _>>()
        .context("collect edges")?;
    Ok(edges)
}

/// Pipeline-authored edges, optionally restricted to those touching `node_id`.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn pipeline_edges(conn: &Connection, node_id: Option<&str>) -> Result<Vec<Edge>> {
    let sql = format!(
        "SELECT {EDGE_COLUMNS} FROM edges
         WHERE provenance = 'pipeline'
           AND (?1 IS NULL OR source_id = ?1 OR target_id = ?1)
         ORDER BY source_id, target_id, edge_type"
    );
    let mut stmt = conn.prepare(&sql).context("prepare pipeline edges")?;
    let edges = stmt
        .query_map(params![node_id], row_to_edge)
        .context("execute pipeline edges")?
        .collect::<Result<Vec<_>, _>>()
        .context("collect pipeline edges")?;
    Ok(edges)
}

/// Number of outgoing edges of `node_id`.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn out_degree(conn: &Connection, node_id: &str) -> Result<usize> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM edges WHERE source_id = ?1",
            params![node_id],
            |row| row.get(0),
        )
        .with_context(|| format!("count out edges of {node_id}"))?;
    Ok(usize::try_from(count).unwrap_or(0))
}

/// Insert an edge unless `(source, target, type)` already exists.
///
/// Returns `true` when a row was inserted.
///
/// # Errors
///
/// Returns an error if the insert fails (e.g. an endpoint does not exist).
pub fn insert_edge(conn: &Connection, edge: &Edge, now: i64) -> Result<bool> {
    let inserted = conn
        .execute(
            "INSERT INTO edges (source_id, target_id, edge_type, weight, provenance, created_at_us)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(source_id, target_id, edge_type) DO NOTHING",
            params![
                edge.source_id,
                edge.target_id,
                edge.edge_type,
                edge.weight,
                edge.provenance.as_str(),
                now,
            ],
        )
        .with_context(|| {
            format!(
                "insert edge {} -[{}]-> {}",
                edge.source_id, edge.edge_type, edge.target_id
            )
        })?;
    Ok(inserted > 0)
}

/// Delete an edge, returning the removed row if it existed.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn delete_edge(conn: &Connection, key: &EdgeKey) -> Result<Option<Edge>> {
    let sql = format!(
        "DELETE FROM edges WHERE source_id = ?1 AND target_id = ?2 AND edge_type = ?3
         RETURNING {EDGE_COLUMNS}"
    );
    conn.query_row(
        &sql,
        params![key.source_id, key.target_id, key.edge_type],
        row_to_edge,
    )
    .optional()
    .with_context(|| {
        format!(
            "delete edge {} -[{}]-> {}",
            key.source_id, key.edge_type, key.target_id
        )
    })
}

/// Delete every manual outgoing edge of `node_id`, returning them.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn delete_manual_outgoing(conn: &Connection, node_id: &str) -> Result<Vec<Edge>> {
    let sql = format!(
        "DELETE FROM edges WHERE source_id = ?1 AND provenance = 'manual' RETURNING {EDGE_COLUMNS}"
    );
    let mut stmt = conn.prepare(&sql).context("prepare manual edge delete")?;
    let removed = stmt
        .query_map(params![node_id], row_to_edge)
        .context("execute manual edge delete")?
        .collect::<Result<Vec<_>, _>>()
        .context("collect removed edges")?;
    Ok(removed)
}

// ---------------------------------------------------------------------------
// Cached analytics
// ---------------------------------------------------------------------------

/// Real-valued analytics cache columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricColumn {
    RankScore,
    Betweenness,
}

impl MetricColumn {
    const fn column(self) -> &'static str {
        match self {
            Self::RankScore => "rank_score",
            Self::Betweenness => "betweenness",
        }
    }
}

/// Persist a real-valued metric for each listed node.
///
/// # Errors
///
/// Returns an error if any update fails.
pub fn write_metric<'a, I>(conn: &Connection, column: MetricColumn, values: I) -> Result<usize>
where
    I: IntoIterator<Item = (&'a str, f64)>,
{
    let sql = format!(
        "UPDATE nodes SET {} = ?2 WHERE node_id = ?1",
        column.column()
    );
    let mut stmt = conn.prepare(&sql).context("prepare metric write")?;
    let mut written = 0;
    for (node_id, value) in values {
        written += stmt
            .execute(params![node_id, value])
            .with_context(|| format!("write {} for {node_id}", column.column()))?;
    }
    Ok(written)
}

/// Persist community assignments.
///
/// # Errors
///
/// Returns an error if any update fails.
pub fn write_clusters<'a, I>(conn: &Connection, assignments: I) -> Result<usize>
where
    I: IntoIterator<Item = (&'a str, i64)>,
{
    let mut stmt = conn
        .prepare("UPDATE nodes SET cluster_id = ?2 WHERE node_id = ?1")
        .context("prepare cluster write")?;
    let mut written = 0;
    for (node_id, cluster) in assignments {
        written += stmt
            .execute(params![node_id, cluster])
            .with_context(|| format!("write cluster for {node_id}"))?;
    }
    Ok(written)
}

/// Persist in/out degree counts.
///
/// # Errors
///
/// Returns an error if any update fails.
pub fn write_degrees<'a, I>(conn: &Connection, degrees: I) -> Result<usize>
where
    I: IntoIterator<Item = (&'a str, usize, usize)>,
{
    let mut stmt = conn
        .prepare("UPDATE nodes SET in_degree = ?2, out_degree = ?3 WHERE node_id = ?1")
        .context("prepare degree write")?;
    let mut written = 0;
    for (node_id, in_degree, out_degree) in degrees {
        let in_degree = i64::try_from(in_degree).unwrap_or(i64::MAX);
        let out_degree = i64::try_from(out_degree).unwrap_or(i64::MAX);
        written += stmt
            .execute(params![node_id, in_degree, out_degree])
            .with_context(|| format!("write degrees for {node_id}"))?;
    }
    Ok(written)
}

// ---------------------------------------------------------------------------
// Densification log
// ---------------------------------------------------------------------------

/// Append a log entry with its edge mutations. Returns the new log id.
///
/// # Errors
///
/// Returns an error if any insert fails.
pub fn append_log(
    conn: &Connection,
    kind: LogKind,
    target_id: Option<&str>,
    reverts_log_id: Option<i64>,
    edges: &[LoggedEdge],
    now: i64,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO densify_log (kind, target_id, reverts_log_id, created_at_us)
         VALUES (?1, ?2, ?3, ?4)",
        params![kind.as_str(), target_id, reverts_log_id, now],
    )
    .context("append densify log entry")?;
    let log_id = conn.last_insert_rowid();

    let mut stmt = conn
        .prepare(
            "INSERT INTO densify_log_edges (
                log_id, seq, action, source_id, target_id, edge_type, weight, provenance
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .context("prepare log edge insert")?;
    for (seq, logged) in edges.iter().enumerate() {
        let seq = i64::try_from(seq).context("log edge sequence overflow")?;
        stmt.execute(params![
            log_id,
            seq,
            logged.action.as_str(),
            logged.edge.source_id,
            logged.edge.target_id,
            logged.edge.edge_type,
            logged.edge.weight,
            logged.edge.provenance.as_str(),
        ])
        .with_context(|| format!("record edge {seq} of log entry {log_id}"))?;
    }

    Ok(log_id)
}

fn load_log_edges(conn: &Connection, log_id: i64) -> Result<Vec<LoggedEdge>> {
    let mut stmt = conn
        .prepare(
            "SELECT action, source_id, target_id, edge_type, weight, provenance
             FROM densify_log_edges WHERE log_id = ?1 ORDER BY seq",
        )
        .context("prepare log edge query")?;
    let edges = stmt
        .query_map(params![log_id], |row| {
            Ok(LoggedEdge {
                action: parse_column::<EdgeAction>(row, 0)?,
                edge: Edge {
                    source_id: row.get(1)?,
                    target_id: row.get(2)?,
                    edge_type: row.get(3)?,
                    weight: row.get(4)?,
                    provenance: parse_column::<Provenance>(row, 5)?,
                },
            })
        })
        .context("execute log edge query")?
        .collect::<Result<Vec<_>, _>>()
        .context("collect log edges")?;
    Ok(edges)
}

fn row_to_log_header(row: &Row<'_>) -> rusqlite::Result<LogEntry> {
    Ok(LogEntry {
        log_id: row.get(0)?,
        kind: parse_column::<LogKind>(row, 1)?,
        target_id: row.get(2)?,
        reverts_log_id: row.get(3)?,
        created_at_us: row.get(4)?,
        edges: Vec::new(),
    })
}

/// Fetch a log entry and its edges.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_log_entry(conn: &Connection, log_id: i64) -> Result<Option<LogEntry>> {
    let entry = conn
        .query_row(
            "SELECT log_id, kind, target_id, reverts_log_id, created_at_us
             FROM densify_log WHERE log_id = ?1",
            params![log_id],
            row_to_log_header,
        )
        .optional()
        .with_context(|| format!("load log entry {log_id}"))?;
    let Some(mut entry) = entry else {
        return Ok(None);
    };
    entry.edges = load_log_edges(conn, log_id)?;
    Ok(Some(entry))
}

/// Newest connect/prune entry that no undo entry has reverted yet.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn latest_revertible_log(conn: &Connection) -> Result<Option<LogEntry>> {
    let log_id: Option<i64> = conn
        .query_row(
            "SELECT l.log_id FROM densify_log l
             WHERE l.kind IN ('connect', 'prune')
               AND NOT EXISTS (SELECT 1 FROM densify_log u WHERE u.reverts_log_id = l.log_id)
             ORDER BY l.log_id DESC
             LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()
        .context("find latest revertible log entry")?;
    match log_id {
        Some(id) => get_log_entry(conn, id),
        None => Ok(None),
    }
}

/// Id of the undo entry that reverted `log_id`, if any.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn reverted_by(conn: &Connection, log_id: i64) -> Result<Option<i64>> {
    conn.query_row(
        "SELECT log_id FROM densify_log WHERE reverts_log_id = ?1",
        params![log_id],
        |row| row.get(0),
    )
    .optional()
    .with_context(|| format!("check reversal of {log_id}"))
}

/// Number of entries in the densification log.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn log_len(conn: &Connection) -> Result<usize> {
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM densify_log", [], |row| row.get(0))
        .context("count log entries")?;
    Ok(usize::try_from(count).unwrap_or(0))
}

/// Most recent log entries, newest first.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_log(conn: &Connection, limit: usize) -> Result<Vec<LogEntry>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let mut stmt = conn
        .prepare(
            "SELECT log_id, kind, target_id, reverts_log_id, created_at_us
             FROM densify_log ORDER BY log_id DESC LIMIT ?1",
        )
        .context("prepare log listing")?;
    let mut entries = stmt
        .query_map(params![limit], row_to_log_header)
        .context("execute log listing")?
        .collect::<Result<Vec<_>, _>>()
        .context("collect log entries")?;
    for entry in &mut entries {
        entry.edges = load_log_edges(conn, entry.log_id)?;
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::memory_store;

    fn note(id: &str, title: &str, created: i64) -> Node {
        Node {
            id: id.to_string(),
            content_type: ContentType::Note,
            subtype: None,
            status: "draft".to_string(),
            maturity: None,
            title: title.to_string(),
            description: None,
            tags: ["memory".to_string()].into_iter().collect(),
            topic: Some("learning/memory".to_string()),
            created_at_us: created,
            updated_at_us: created,
            archived: false,
            analytics: AnalyticsSnapshot::default(),
        }
    }

    #[test]
    fn node_round_trip_keeps_tags_and_topic() -> Result<()> {
        let conn = memory_store();
        insert_node(&conn, &note("note-00000001", "Recall", 1), "recall")?;
        let loaded = get_node(&conn, "note-00000001")?.expect("node exists");
        assert_eq!(loaded.title, "Recall");
        assert!(loaded.tags.contains("memory"));
        assert_eq!(loaded.topic.as_deref(), Some("learning/memory"));
        assert!(get_node(&conn, "note-ffffffff")?.is_none());
        Ok(())
    }

    #[test]
    fn edge_triple_is_unique() -> Result<()> {
        let conn = memory_store();
        insert_node(&conn, &note("note-00000001", "A", 1), "a")?;
        insert_node(&conn, &note("note-00000002", "B", 2), "b")?;

        let edge = Edge::manual("note-00000001", "note-00000002", "relates");
        assert!(insert_edge(&conn, &edge, 10)?);
        assert!(!insert_edge(&conn, &edge, 11)?);

        let other_type = Edge::manual("note-00000001", "note-00000002", "supports");
        assert!(insert_edge(&conn, &other_type, 12)?);
        assert_eq!(out_degree(&conn, "note-00000001")?, 2);
        Ok(())
    }

    #[test]
    fn edges_require_existing_endpoints() -> Result<()> {
        let conn = memory_store();
        insert_node(&conn, &note("note-00000001", "A", 1), "a")?;
        let dangling = Edge::manual("note-00000001", "note-0000dead", "relates");
        assert!(insert_edge(&conn, &dangling, 1).is_err());
        Ok(())
    }

    #[test]
    fn delete_edge_returns_removed_row() -> Result<()> {
        let conn = memory_store();
        insert_node(&conn, &note("note-00000001", "A", 1), "a")?;
        insert_node(&conn, &note("note-00000002", "B", 2), "b")?;
        let mut edge = Edge::manual("note-00000001", "note-00000002", "relates");
        edge.weight = 0.75;
        edge.provenance = Provenance::Pipeline;
        insert_edge(&conn, &edge, 1)?;

        let removed = delete_edge(&conn, &edge.key())?.expect("edge removed");
        assert_eq!(removed, edge);
        assert!(delete_edge(&conn, &edge.key())?.is_none());
        Ok(())
    }

    #[test]
    fn latest_node_skips_archived() -> Result<()> {
        let conn = memory_store();
        insert_node(&conn, &note("note-00000001", "A", 1), "a")?;
        let mut archived = note("note-00000002", "B", 2);
        archived.archived = true;
        insert_node(&conn, &archived, "b")?;
        assert_eq!(latest_node_id(&conn)?.as_deref(), Some("note-00000001"));
        Ok(())
    }

    #[test]
    fn log_entries_round_trip_and_track_reversal() -> Result<()> {
        let conn = memory_store();
        let mut edge = Edge::manual("note-00000001", "note-00000002", "relates");
        edge.provenance = Provenance::Pipeline;
        let connect = append_log(
            &conn,
            LogKind::Connect,
            Some("note-00000001"),
            None,
            &[LoggedEdge::added(edge.clone())],
            5,
        )?;
        let entry = get_log_entry(&conn, connect)?.expect("entry");
        assert_eq!(entry.kind, LogKind::Connect);
        assert_eq!(entry.edges, vec![LoggedEdge::added(edge.clone())]);
        assert_eq!(
            latest_revertible_log(&conn)?.map(|e| e.log_id),
            Some(connect)
        );

        let undo = append_log(
            &conn,
            LogKind::Undo,
            None,
            Some(connect),
            &[LoggedEdge::removed(edge)],
            6,
        )?;
        assert_eq!(reverted_by(&conn, connect)?, Some(undo));
        assert!(latest_revertible_log(&conn)?.is_none());
        assert_eq!(log_len(&conn)?, 2);
        Ok(())
    }
}
