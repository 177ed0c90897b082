//! Command handlers.
//!
//! Each handler opens the vault, runs one operation, and renders a single
//! [`Outcome`]. Handlers return whether the outcome succeeded so `main` can
//! pick the exit code.

pub mod analyze;
pub mod content;
pub mod reweave;
pub mod vault;

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};
use weft_core::config::VAULT_DIR;
use weft_core::events::{LifecycleEvent, Listener, ListenerSet};
use weft_core::{Outcome, Result, Vault, WeftError};

use crate::output::{OutputMode, render_outcome};

/// Logs every lifecycle event at info level.
struct TraceListener;

impl Listener for TraceListener {
    fn name(&self) -> &str {
        "trace"
    }

    fn on_event(&self, event: &LifecycleEvent) -> anyhow::Result<()> {
        let payload = serde_json::to_string(event)?;
        info!(event = %event, %payload, "lifecycle event");
        Ok(())
    }
}

pub fn listeners() -> ListenerSet {
    let mut set = ListenerSet::new();
    set.register(Box::new(TraceListener));
    set
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir().map_or_else(|| path.to_path_buf(), |home| home.join(rest)),
        Err(_) => path.to_path_buf(),
    }
}

/// Per-invocation settings shared by every handler.
#[derive(Debug, Clone)]
pub struct Context {
    pub root: PathBuf,
    pub mode: OutputMode,
}

impl Context {
    /// Open an initialized vault with the CLI listeners registered.
    ///
    /// # Errors
    ///
    /// [`WeftError::Validation`] when `root` has no `.weft` directory, or
    /// whatever [`Vault::open`] reports.
    pub fn open(&self) -> Result<Vault> {
        if !self.root.join(VAULT_DIR).is_dir() {
            return Err(WeftError::validation(format!(
                "{} is not a weft vault; run `weft init` first",
                self.root.display()
            )));
        }
        Ok(Vault::open(&self.root)?.with_listeners(listeners()))
    }

    /// Wrap `result` in an outcome and render it.
    pub fn finish<T: Serialize>(
        &self,
        operation: &str,
        result: Result<(T, Vec<String>)>,
        text_fn: impl FnOnce(&T, &mut dyn Write) -> io::Result<()>,
    ) -> anyhow::Result<bool> {
        let outcome = match result {
            Ok((data, warnings)) => Outcome::ok(operation, data).with_warnings(warnings),
            Err(err) => {
                debug!(operation, code = err.code().name(), %err, "operation failed");
                Outcome::failed(operation, &err)
            }
        };
        render_outcome(self.mode, &outcome, text_fn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_home_leaves_plain_paths() {
        assert_eq!(expand_home(Path::new("/tmp/vault")), PathBuf::from("/tmp/vault"));
        assert_eq!(expand_home(Path::new("notes")), PathBuf::from("notes"));
    }

    #[test]
    fn expand_home_rewrites_tilde() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home(Path::new("~/vault")), home.join("vault"));
        }
    }

    #[test]
    fn open_rejects_uninitialized_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = Context {
            root: dir.path().to_path_buf(),
            mode: OutputMode::Json,
        };
        let err = ctx.open().expect_err("no vault");
        assert_eq!(err.code(), weft_core::ErrorCode::Validation);
    }

    #[test]
    fn trace_listener_accepts_events() {
        let set = listeners();
        let warnings = set.dispatch(&LifecycleEvent::SessionStarted {
            id: "SES-0001".into(),
        });
        assert!(warnings.is_empty());
    }
}
