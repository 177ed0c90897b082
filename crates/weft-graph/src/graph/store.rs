//! Request-scoped graph store adapter.
//!
//! [`GraphStore`] wraps the request's connection (usually a transaction) and
//! builds the [`VaultGraph`] snapshot lazily on first use. Edge mutations
//! go to the index and are mirrored into an already-built snapshot;
//! [`GraphStore::invalidate`] drops the snapshot so the next access rebuilds
//! it from the index. Nothing is cached across requests.

use anyhow::Result;
use rusqlite::Connection;
use tracing::debug;
use weft_core::db::{self, query};
use weft_core::model::{Edge, EdgeKey};

use super::build::VaultGraph;

pub struct GraphStore<'c> {
    conn: &'c Connection,
    snapshot: Option<VaultGraph>,
    builds: usize,
}

impl std::fmt::Debug for GraphStore<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphStore")
            .field("built", &self.snapshot.is_some())
            .field("builds", &self.builds)
            .finish_non_exhaustive()
    }
}

impl<'c> GraphStore<'c> {
    #[must_use]
    pub const fn new(conn: &'c Connection) -> Self {
        Self {
            conn,
            snapshot: None,
            builds: 0,
        }
    }

    #[must_use]
    pub const fn conn(&self) -> &'c Connection {
        self.conn
    }

    /// The current snapshot, built on first access.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be read.
    pub fn graph(&mut self) -> Result<&VaultGraph> {
        Ok(self.ensure()?)
    }

    fn ensure(&mut self) -> Result<&mut VaultGraph> {
        let graph = match self.snapshot.take() {
            Some(graph) => graph,
            None => {
                let graph = VaultGraph::from_sqlite(self.conn)?;
                self.builds += 1;
                debug!(
                    nodes = graph.node_count(),
                    edges = graph.edge_count(),
                    generation = graph.generation,
                    "graph snapshot built"
                );
                graph
            }
        };
        Ok(self.snapshot.insert(graph))
    }

    /// Drop the snapshot; the next access rebuilds it.
    pub fn invalidate(&mut self) {
        if self.snapshot.take().is_some() {
            debug!("graph snapshot invalidated");
        }
    }

    #[must_use]
    pub const fn is_built(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Number of snapshot builds performed by this store.
    #[must_use]
    pub const fn builds(&self) -> usize {
        self.builds
    }

    /// Whether the store generation moved past the snapshot's.
    ///
    /// # Errors
    ///
    /// Returns an error if the generation cannot be read.
    pub fn is_stale(&self) -> Result<bool> {
        match &self.snapshot {
            Some(graph) => Ok(db::generation(self.conn)? != graph.generation),
            None => Ok(false),
        }
    }

    /// Insert an edge into the index and mirror it into the snapshot.
    ///
    /// Returns `false` when the `(source, target, type)` triple exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn add_edge(&mut self, edge: &Edge, now: i64) -> Result<bool> {
        let inserted = query::insert_edge(self.conn, edge, now)?;
        if inserted {
            if let Some(graph) = self.snapshot.as_mut() {
                graph.add_edge(edge);
            }
        }
        Ok(inserted)
    }

    /// Delete an edge from the index and the snapshot, returning the
    /// removed record.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn remove_edge(&mut self, key: &EdgeKey) -> Result<Option<Edge>> {
        let removed = query::delete_edge(self.conn, key)?;
        if removed.is_some() {
            if let Some(graph) = self.snapshot.as_mut() {
                graph.remove_edge(key);
            }
        }
        Ok(removed)
    }
}
