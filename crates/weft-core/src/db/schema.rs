//! Canonical SQLite index schema for weft.
//!
//! - `nodes` keeps the latest attributes of every content item plus the
//!   cached analytics columns (written only by graph analytics)
//! - `node_tags` models the multi-valued tag set
//! - `edges` holds typed links, unique per `(source_id, target_id, edge_type)`
//! - `id_counters` backs sequential id namespaces
//! - `densify_log` / `densify_log_edges` are the append-only audit trail of
//!   densification runs
//! - `store_meta` tracks the schema version and a mutation generation
//!
//! `nodes.origin_title` is the normalized title a hash id was derived from.
//! It never changes on retitle.

/// Migration v1: nodes, tags, edges, counters, and store metadata.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS nodes (
    node_id TEXT PRIMARY KEY,
    content_type TEXT NOT NULL
        CHECK (content_type IN ('note', 'reference', 'task', 'decision', 'session')),
    subtype TEXT,
    status TEXT NOT NULL,
    maturity TEXT CHECK (maturity IS NULL OR maturity IN ('seedling', 'budding', 'evergreen')),
    title TEXT NOT NULL,
    normalized_title TEXT NOT NULL,
    description TEXT,
    topic TEXT,
    is_archived INTEGER NOT NULL DEFAULT 0 CHECK (is_archived IN (0, 1)),
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL,
    in_degree INTEGER NOT NULL DEFAULT 0,
    out_degree INTEGER NOT NULL DEFAULT 0,
    rank_score REAL,
    cluster_id INTEGER,
    betweenness REAL
);

CREATE TABLE IF NOT EXISTS node_tags (
    node_id TEXT NOT NULL REFERENCES nodes(node_id) ON DELETE CASCADE,
    tag TEXT NOT NULL CHECK (length(trim(tag)) > 0),
    PRIMARY KEY (node_id, tag)
);

CREATE TABLE IF NOT EXISTS edges (
    source_id TEXT NOT NULL REFERENCES nodes(node_id),
    target_id TEXT NOT NULL REFERENCES nodes(node_id),
    edge_type TEXT NOT NULL CHECK (length(trim(edge_type)) > 0),
    weight REAL NOT NULL DEFAULT 1.0,
    provenance TEXT NOT NULL DEFAULT 'manual' CHECK (provenance IN ('manual', 'pipeline')),
    created_at_us INTEGER NOT NULL,
    PRIMARY KEY (source_id, target_id, edge_type),
    CHECK (source_id <> target_id)
);

CREATE TABLE IF NOT EXISTS id_counters (
    namespace TEXT PRIMARY KEY,
    next_value INTEGER NOT NULL CHECK (next_value >= 1)
);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL,
    generation INTEGER NOT NULL DEFAULT 0
);

INSERT OR IGNORE INTO store_meta (id, schema_version, generation) VALUES (1, 1, 0);

CREATE INDEX IF NOT EXISTS idx_nodes_type_created
    ON nodes(content_type, created_at_us DESC);

CREATE INDEX IF NOT EXISTS idx_nodes_archived_created
    ON nodes(is_archived, created_at_us DESC);

CREATE INDEX IF NOT EXISTS idx_nodes_normalized_title
    ON nodes(normalized_title);

CREATE INDEX IF NOT EXISTS idx_node_tags_tag
    ON node_tags(tag, node_id);

CREATE INDEX IF NOT EXISTS idx_edges_target
    ON edges(target_id, edge_type, source_id);

CREATE INDEX IF NOT EXISTS idx_edges_provenance
    ON edges(provenance, source_id);
";

/// Migration v2: densification audit log.
pub const MIGRATION_V2_SQL: &str = r"
CREATE TABLE IF NOT EXISTS densify_log (
    log_id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL CHECK (kind IN ('connect', 'prune', 'undo')),
    target_id TEXT,
    reverts_log_id INTEGER REFERENCES densify_log(log_id),
    created_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS densify_log_edges (
    log_id INTEGER NOT NULL REFERENCES densify_log(log_id),
    seq INTEGER NOT NULL,
    action TEXT NOT NULL CHECK (action IN ('added', 'removed')),
    source_id TEXT NOT NULL,
    target_id TEXT NOT NULL,
    edge_type TEXT NOT NULL,
    weight REAL NOT NULL,
    provenance TEXT NOT NULL CHECK (provenance IN ('manual', 'pipeline')),
    PRIMARY KEY (log_id, seq)
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_densify_log_reverts
    ON densify_log(reverts_log_id) WHERE reverts_log_id IS NOT NULL;

CREATE TRIGGER IF NOT EXISTS densify_log_no_update
BEFORE UPDATE ON densify_log
BEGIN
    SELECT RAISE(ABORT, 'densify_log is append-only');
END;

CREATE TRIGGER IF NOT EXISTS densify_log_no_delete
BEFORE DELETE ON densify_log
BEGIN
    SELECT RAISE(ABORT, 'densify_log is append-only');
END;

UPDATE store_meta SET schema_version = 2 WHERE id = 1;
";

/// Migration v3: remember the title each node was addressed by.
pub const MIGRATION_V3_SQL: &str = r"
ALTER TABLE nodes ADD COLUMN origin_title TEXT;

UPDATE nodes SET origin_title = normalized_title WHERE origin_title IS NULL;

UPDATE store_meta SET schema_version = 3 WHERE id = 1;
";

/// Indexes expected by the graph load and pipeline query paths.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_nodes_type_created",
    "idx_nodes_archived_created",
    "idx_nodes_normalized_title",
    "idx_node_tags_tag",
    "idx_edges_target",
    "idx_edges_provenance",
    "idx_densify_log_reverts",
];
