//! An opened vault: index connection, configuration, listeners, and
//! optional capabilities for one request.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, Transaction};
use tracing::info;

use crate::capabilities::Capabilities;
use crate::config::{self, VaultConfig};
use crate::db;
use crate::error::Result;
use crate::events::{Applied, LifecycleEvent, ListenerSet};

pub struct Vault {
    root: PathBuf,
    conn: Connection,
    config: VaultConfig,
    listeners: ListenerSet,
    capabilities: Capabilities,
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vault")
            .field("root", &self.root)
            .field("listeners", &self.listeners)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

impl Vault {
    /// Open the vault at `root`, creating and migrating the index if needed.
    ///
    /// # Errors
    ///
    /// Returns a config error for a malformed config file, or an internal
    /// error when the index cannot be opened.
    pub fn open(root: &Path) -> Result<Self> {
        let config = config::load_vault_config(root)?;
        let conn = db::open_store(&config::index_path(root))?;
        Ok(Self {
            root: root.to_path_buf(),
            conn,
            config,
            listeners: ListenerSet::new(),
            capabilities: Capabilities::none(),
        })
    }

    /// Create the vault directory and index, dispatching `vault-initialized`.
    ///
    /// # Errors
    ///
    /// Same as [`Vault::open`].
    pub fn init(root: &Path, listeners: ListenerSet) -> Result<(Self, Vec<String>)> {
        let mut vault = Self::open(root)?.with_listeners(listeners);
        let fresh = db::generation(&vault.conn)? == 0;
        if fresh {
            let tx = db::begin_write(&mut vault.conn)?;
            db::bump_generation(&tx)?;
            tx.commit()?;
        }
        info!(root = %root.display(), fresh, "vault initialized");
        let warnings = vault.listeners.dispatch(&LifecycleEvent::VaultInitialized {
            path: root.display().to_string(),
        });
        Ok((vault, warnings))
    }

    #[must_use]
    pub fn with_listeners(mut self, listeners: ListenerSet) -> Self {
        self.listeners = listeners;
        self
    }

    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub const fn config(&self) -> &VaultConfig {
        &self.config
    }

    #[must_use]
    pub const fn conn(&self) -> &Connection {
        &self.conn
    }

    #[must_use]
    pub const fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Run `op` inside one immediate write transaction.
    ///
    /// On success the store generation is bumped, the transaction commits,
    /// and the pending events are dispatched. Any error rolls everything
    /// back and no events are sent.
    ///
    /// # Errors
    ///
    /// Propagates the error of `op`, or a storage error from commit.
    pub fn write<T, F>(&mut self, op: F) -> Result<(T, Vec<String>)>
    where
        F: FnOnce(&Transaction<'_>, &VaultConfig) -> Result<Applied<T>>,
    {
        let tx = db::begin_write(&mut self.conn)?;
        let applied = op(&tx, &self.config)?;
        db::bump_generation(&tx)?;
        tx.commit()?;
        Ok(applied.dispatch(&self.listeners))
    }

    /// Run a read-only `op` against one consistent snapshot.
    ///
    /// # Errors
    ///
    /// Propagates the error of `op`.
    pub fn read<T, F>(&mut self, op: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>, &VaultConfig) -> Result<T>,
    {
        let tx = self.conn.transaction()?;
        let value = op(&tx, &self.config)?;
        tx.commit()?;
        Ok(value)
    }

    /// Run `op` on an immediate transaction for work that reads a snapshot
    /// and writes back derived columns only (the analytics cache).
    ///
    /// The write lock is taken before the snapshot, so a concurrent writer
    /// waits instead of invalidating it. The generation is left alone and
    /// no events are dispatched.
    ///
    /// # Errors
    ///
    /// Propagates the error of `op`, or a storage error when the lock
    /// cannot be taken.
    pub fn refresh<T, F>(&mut self, op: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>, &VaultConfig) -> Result<T>,
    {
        let tx = db::begin_write(&mut self.conn)?;
        let value = op(&tx, &self.config)?;
        tx.commit()?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content;
    use crate::events::Listener;
    use crate::model::{ContentType, NewContent};
    use std::sync::{Arc, Mutex};

    struct Names(Arc<Mutex<Vec<String>>>);

    impl Listener for Names {
        fn name(&self) -> &str {
            "names"
        }

        fn on_event(&self, event: &LifecycleEvent) -> anyhow::Result<()> {
            self.0
                .lock()
                .map_err(|_| anyhow::anyhow!("poisoned"))?
                .push(event.name().to_string());
            Ok(())
        }
    }

    #[test]
    fn events_fire_only_after_commit() -> Result<()> {
        let dir = tempfile::tempdir().expect("tempdir");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut listeners = ListenerSet::new();
        listeners.register(Box::new(Names(Arc::clone(&seen))));

        let (mut vault, warnings) = Vault::init(dir.path(), listeners)?;
        assert!(warnings.is_empty());

        let (created, _) = vault.write(|tx, config| {
            content::create_content(tx, &NewContent::new(ContentType::Note, "First"), config)
        })?;
        assert!(created.id.starts_with("note-"));

        let failed = vault.write(|tx, _| content::transition(tx, &created.id, "linked"));
        assert!(failed.is_err());

        let names = seen.lock().expect("lock").clone();
        assert_eq!(names, vec!["vault-initialized", "content-created"]);
        assert_eq!(db::generation(vault.conn())?, 2);
        Ok(())
    }

    #[test]
    fn refresh_commits_without_bumping_generation() -> Result<()> {
        let dir = tempfile::tempdir().expect("tempdir");
        let (mut vault, _) = Vault::init(dir.path(), ListenerSet::new())?;
        let (created, _) = vault.write(|tx, config| {
            content::create_content(tx, &NewContent::new(ContentType::Note, "Cached"), config)
        })?;
        let before = db::generation(vault.conn())?;

        vault.refresh(|tx, _| {
            tx.execute(
                "UPDATE nodes SET rank_score = 0.5 WHERE node_id = ?1",
                [&created.id],
            )?;
            Ok(())
        })?;

        assert_eq!(db::generation(vault.conn())?, before);
        let node = crate::db::query::get_node(vault.conn(), &created.id)?.expect("node");
        assert_eq!(node.analytics.rank_score, Some(0.5));
        Ok(())
    }
}
