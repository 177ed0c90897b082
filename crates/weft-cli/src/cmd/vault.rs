//! `weft init` and `weft check`.

use std::fs;
use std::io::Write;

use clap::Args;
use serde::Serialize;
use tracing::info;
use weft_core::config::{self, VAULT_DIR, VaultConfig};
use weft_core::content::{IntegrityReport, check_integrity};
use weft_core::{Result, Vault, WeftError};

use super::{Context, listeners};
use crate::output::kv;

#[derive(Debug, Serialize)]
pub struct InitReport {
    pub root: String,
    pub index: String,
    /// Whether a default `config.toml` was written.
    pub wrote_config: bool,
}

fn write_default_config(ctx: &Context) -> Result<bool> {
    let path = ctx.root.join(VAULT_DIR).join("config.toml");
    if path.exists() {
        return Ok(false);
    }
    let body = toml::to_string_pretty(&VaultConfig::default())
        .map_err(|err| WeftError::Config(format!("failed to render default config: {err}")))?;
    fs::write(&path, body)
        .map_err(|err| WeftError::Config(format!("failed to write {}: {err}", path.display())))?;
    info!(path = %path.display(), "wrote default config");
    Ok(true)
}

pub fn run_init(ctx: &Context) -> anyhow::Result<bool> {
    let result = Vault::init(&ctx.root, listeners()).and_then(|(vault, warnings)| {
        let wrote_config = write_default_config(ctx)?;
        let report = InitReport {
            root: vault.root().display().to_string(),
            index: config::index_path(vault.root()).display().to_string(),
            wrote_config,
        };
        Ok((report, warnings))
    });
    ctx.finish("init", result, |report: &InitReport, w| {
        kv(w, "vault", &report.root)?;
        kv(w, "index", &report.index)
    })
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Recompute stale machine statuses.
    #[arg(long)]
    pub repair: bool,
}

pub fn run_check(args: &CheckArgs, ctx: &Context) -> anyhow::Result<bool> {
    let result = ctx
        .open()
        .and_then(|mut vault| vault.write(|tx, config| check_integrity(tx, config, args.repair)));
    ctx.finish("check", result, |report: &IntegrityReport, w| {
        kv(w, "nodes", report.nodes.to_string())?;
        kv(w, "edges", report.edges.to_string())?;
        for issue in &report.issues {
            writeln!(w, "  {:?}  {}  {}", issue.kind, issue.node_id, issue.detail)?;
        }
        if report.repaired > 0 {
            kv(w, "repaired", report.repaired.to_string())?;
        }
        kv(w, "clean", if report.is_clean() { "yes" } else { "no" })
    })
}
