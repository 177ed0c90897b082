//! SQLite index utilities.
//!
//! Runtime defaults:
//! - `journal_mode = WAL` so read-only analytics never block on a writer
//! - `busy_timeout = 5s` to absorb transient lock contention between requests
//! - `foreign_keys = ON` so edges always reference existing nodes

pub mod migrations;
pub mod query;
pub mod schema;

use anyhow::{Context, Result};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::{path::Path, time::Duration};

/// Busy timeout used for index connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open (or create) the index database, apply runtime pragmas, and migrate
/// the schema to the latest version.
///
/// # Errors
///
/// Returns an error if opening/configuring/migrating the database fails.
pub fn open_store(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create index directory {}", parent.display()))?;
    }

    let mut conn =
        Connection::open(path).with_context(|| format!("open index {}", path.display()))?;

    configure_connection(&conn).context("configure sqlite pragmas")?;
    migrations::migrate(&mut conn).context("apply index migrations")?;

    Ok(conn)
}

/// Open a private in-memory index at the latest schema.
///
/// # Errors
///
/// Returns an error if migration fails.
pub fn open_memory() -> Result<Connection> {
    let mut conn = Connection::open_in_memory().context("open in-memory index")?;
    conn.pragma_update(None, "foreign_keys", "ON")
        .context("enable foreign keys")?;
    migrations::migrate(&mut conn).context("apply index migrations")?;
    Ok(conn)
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(())
}

/// Begin a write transaction that takes the write lock up front.
///
/// Every operation that reads and then writes shared rows (counter claims,
/// connect, prune, undo) runs inside one of these.
///
/// # Errors
///
/// Returns an error if the lock cannot be acquired within the busy timeout.
pub fn begin_write(conn: &mut Connection) -> rusqlite::Result<Transaction<'_>> {
    conn.transaction_with_behavior(TransactionBehavior::Immediate)
}

/// Current mutation generation of the store.
///
/// # Errors
///
/// Returns an error if the metadata row cannot be read.
pub fn generation(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT generation FROM store_meta WHERE id = 1", [], |row| {
        row.get(0)
    })
}

/// Bump the mutation generation. Call inside the mutating transaction.
///
/// # Errors
///
/// Returns an error if the metadata row cannot be updated.
pub fn bump_generation(conn: &Connection) -> rusqlite::Result<i64> {
    conn.execute(
        "UPDATE store_meta SET generation = generation + 1 WHERE id = 1",
        [],
    )?;
    generation(conn)
}

#[cfg(test)]
pub(crate) mod testing {
    use rusqlite::Connection;

    pub fn memory_store() -> Connection {
        super::open_memory().expect("open in-memory store")
    }
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_BUSY_TIMEOUT, begin_write, bump_generation, generation, open_store};
    use crate::db::migrations;
    use tempfile::TempDir;

    fn temp_db_path() -> (TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join(".weft").join("index.sqlite3");
        (dir, path)
    }

    #[test]
    fn open_store_sets_wal_busy_timeout_and_fk() {
        let (_dir, path) = temp_db_path();
        let conn = open_store(&path).expect("open index");

        let journal_mode: String = conn
            .pragma_query_value(None, "journal_mode", |row| row.get(0))
            .expect("query journal_mode");
        assert_eq!(journal_mode.to_ascii_lowercase(), "wal");

        let busy_timeout_ms: u64 = conn
            .pragma_query_value(None, "busy_timeout", |row| row.get(0))
            .expect("query busy_timeout");
        assert_eq!(
            u128::from(busy_timeout_ms),
            DEFAULT_BUSY_TIMEOUT.as_millis()
        );

        let foreign_keys: i64 = conn
            .pragma_query_value(None, "foreign_keys", |row| row.get(0))
            .expect("query foreign_keys");
        assert_eq!(foreign_keys, 1);
    }

    #[test]
    fn open_store_runs_migrations() {
        let (_dir, path) = temp_db_path();
        let conn = open_store(&path).expect("open index");
        let version = migrations::current_schema_version(&conn).expect("schema version");
        assert_eq!(version, migrations::LATEST_SCHEMA_VERSION);
    }

    #[test]
    fn generation_only_moves_on_commit() {
        let (_dir, path) = temp_db_path();
        let mut conn = open_store(&path).expect("open index");
        assert_eq!(generation(&conn).expect("gen"), 0);

        {
            let tx = begin_write(&mut conn).expect("begin");
            assert_eq!(bump_generation(&tx).expect("bump"), 1);
        }
        assert_eq!(generation(&conn).expect("gen"), 0);

        let tx = begin_write(&mut conn).expect("begin");
        bump_generation(&tx).expect("bump");
        tx.commit().expect("commit");
        assert_eq!(generation(&conn).expect("gen"), 1);
    }
}
