//! `weft reweave | prune | undo | log`.
//!
//! Dry runs go through a read transaction so they leave the store
//! generation alone; everything else commits through [`Vault::write`].
//!
//! [`Vault::write`]: weft_core::Vault::write

use std::io::{self, Write};
use std::path::PathBuf;

use clap::Args;
use weft_core::model::{Edge, LogEntry};
use weft_core::{Result, WeftError};
use weft_densify::{
    PruneReport, PruneRequest, ReweaveReport, ReweaveRequest, UndoReport, history, prune, reweave,
    undo,
};

use super::Context;
use crate::output::kv;

fn write_edges(w: &mut dyn Write, sign: char, edges: &[Edge]) -> io::Result<()> {
    for edge in edges {
        writeln!(
            w,
            "  {sign} {} -[{}]-> {}  ({:.3})",
            edge.source_id, edge.edge_type, edge.target_id, edge.weight
        )?;
    }
    Ok(())
}

#[derive(Args, Debug)]
pub struct ReweaveArgs {
    /// Source node; defaults to the most recently created one.
    #[arg(long)]
    pub source: Option<String>,

    /// Body text of the source, scanned for `[[references]]`.
    #[arg(long, conflicts_with = "body_file")]
    pub body: Option<String>,

    /// Read the body text from a file.
    #[arg(long, value_name = "PATH")]
    pub body_file: Option<PathBuf>,

    /// Show the candidates without creating edges.
    #[arg(long)]
    pub dry_run: bool,
}

impl ReweaveArgs {
    fn request(&self) -> Result<ReweaveRequest> {
        let body = match &self.body_file {
            Some(path) => Some(std::fs::read_to_string(path).map_err(|err| {
                WeftError::validation(format!("cannot read {}: {err}", path.display()))
            })?),
            None => self.body.clone(),
        };
        Ok(ReweaveRequest {
            source: self.source.clone(),
            body,
            dry_run: self.dry_run,
        })
    }
}

pub fn run_reweave(args: &ReweaveArgs, ctx: &Context) -> anyhow::Result<bool> {
    let result = args.request().and_then(|request| {
        let mut vault = ctx.open()?;
        if request.dry_run {
            vault
                .read(|tx, config| reweave(tx, &request, config))
                .map(|applied| (applied.value, applied.warnings))
        } else {
            vault.write(|tx, config| reweave(tx, &request, config))
        }
    });
    ctx.finish("reweave", result, |report: &ReweaveReport, w| {
        kv(w, "source", &report.source_id)?;
        kv(w, "examined", report.examined.to_string())?;
        for candidate in &report.candidates {
            writeln!(
                w,
                "  {:.3}  {} -[{}]-> {}  {}",
                candidate.score, report.source_id, candidate.edge_type, candidate.id, candidate.title
            )?;
        }
        if let Some(log_id) = report.log_id {
            kv(w, "log", log_id.to_string())?;
        } else if report.dry_run {
            writeln!(w, "dry run, nothing written")?;
        }
        Ok(())
    })
}

#[derive(Args, Debug)]
pub struct PruneArgs {
    /// Only re-score pipeline edges touching this node.
    #[arg(long)]
    pub target: Option<String>,

    /// Show the edges that would go without removing them.
    #[arg(long)]
    pub dry_run: bool,
}

pub fn run_prune(args: &PruneArgs, ctx: &Context) -> anyhow::Result<bool> {
    let request = PruneRequest {
        target: args.target.clone(),
        dry_run: args.dry_run,
    };
    let result = ctx.open().and_then(|mut vault| {
        if request.dry_run {
            vault
                .read(|tx, config| prune(tx, &request, config))
                .map(|applied| (applied.value, applied.warnings))
        } else {
            vault.write(|tx, config| prune(tx, &request, config))
        }
    });
    ctx.finish("prune", result, |report: &PruneReport, w| {
        kv(w, "examined", report.examined.to_string())?;
        for rescored in &report.removed {
            let edge = &rescored.edge;
            writeln!(
                w,
                "  - {} -[{}]-> {}  ({:.3})",
                edge.source_id, edge.edge_type, edge.target_id, rescored.score
            )?;
        }
        if let Some(log_id) = report.log_id {
            kv(w, "log", log_id.to_string())?;
        }
        Ok(())
    })
}

#[derive(Args, Debug)]
pub struct UndoArgs {
    /// Log entry to revert; defaults to the newest one not yet reverted.
    pub log_id: Option<i64>,
}

pub fn run_undo(args: &UndoArgs, ctx: &Context) -> anyhow::Result<bool> {
    let result = ctx
        .open()
        .and_then(|mut vault| vault.write(|tx, config| undo(tx, args.log_id, config)));
    ctx.finish("undo", result, |report: &UndoReport, w| {
        writeln!(
            w,
            "reverted {} entry {} as {}",
            report.reverted_kind, report.reverted_log_id, report.log_id
        )?;
        write_edges(w, '+', &report.restored)?;
        write_edges(w, '-', &report.removed)
    })
}

#[derive(Args, Debug)]
pub struct LogArgs {
    /// Number of entries to show, newest first.
    #[arg(long, default_value = "20")]
    pub limit: usize,
}

pub fn run_log(args: &LogArgs, ctx: &Context) -> anyhow::Result<bool> {
    let result = ctx.open().and_then(|mut vault| {
        let entries = vault.read(|tx, _| history(tx, args.limit))?;
        Ok((entries, Vec::new()))
    });
    ctx.finish("log", result, |entries: &Vec<LogEntry>, w| {
        if entries.is_empty() {
            return writeln!(w, "no densification history");
        }
        for entry in entries {
            let target = entry.target_id.as_deref().unwrap_or("*");
            match entry.reverts_log_id {
                Some(reverted) => writeln!(
                    w,
                    "{:>5}  {:<8} {target}  reverts {reverted}",
                    entry.log_id,
                    entry.kind.as_str()
                )?,
                None => writeln!(
                    w,
                    "{:>5}  {:<8} {target}  {} edges",
                    entry.log_id,
                    entry.kind.as_str(),
                    entry.edges.len()
                )?,
            }
        }
        Ok(())
    })
}
