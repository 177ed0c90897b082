//! `weft related | rank | themes | path | bridges | gaps | similar | search`.
//!
//! Graph queries run on a read transaction. `rank`, `themes` and `bridges`
//! refresh the analytics cache columns as a side effect, so they run on
//! [`Vault::refresh`] instead.

use std::io::{self, Write};

use clap::Args;
use serde::Serialize;
use weft_core::config::VaultConfig;
use weft_core::{Result, Vault};
use weft_graph::GraphStore;
use weft_graph::analytics::{
    self, GapReport, PathResult, RankReport, Scored, ThemesReport,
};

use super::Context;
use crate::output::section;

const DEFAULT_TOP: &str = "10";

/// Whether a graph query writes the analytics cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Read,
    Refresh,
}

fn query_graph<T, F>(ctx: &Context, access: Access, op: F) -> Result<(T, Vec<String>)>
where
    F: FnOnce(&mut GraphStore<'_>, &VaultConfig) -> Result<T>,
{
    let mut vault = ctx.open()?;
    let value = match access {
        Access::Read => vault.read(|tx, config| op(&mut GraphStore::new(tx), config))?,
        Access::Refresh => vault.refresh(|tx, config| op(&mut GraphStore::new(tx), config))?,
    };
    Ok((value, Vec::new()))
}

fn write_scored(items: &[Scored], w: &mut dyn Write) -> io::Result<()> {
    if items.is_empty() {
        return writeln!(w, "no results");
    }
    for item in items {
        writeln!(w, "{:>8.4}  {}  {}", item.score, item.id, item.title)?;
    }
    Ok(())
}

#[derive(Args, Debug)]
pub struct RelatedArgs {
    /// Node to spread activation from.
    pub id: String,

    /// Hops to spread, 1 to 5.
    #[arg(long, default_value = "2")]
    pub depth: usize,

    #[arg(long, default_value = DEFAULT_TOP)]
    pub top: usize,
}

pub fn run_related(args: &RelatedArgs, ctx: &Context) -> anyhow::Result<bool> {
    let result = query_graph(ctx, Access::Read, |store, config| {
        analytics::related(store, &args.id, args.depth, args.top, &config.analytics)
    });
    ctx.finish("related", result, |items: &Vec<Scored>, w| write_scored(items, w))
}

#[derive(Args, Debug)]
pub struct TopArgs {
    /// Number of results to return.
    #[arg(long, default_value = DEFAULT_TOP)]
    pub top: usize,
}

pub fn run_rank(args: &TopArgs, ctx: &Context) -> anyhow::Result<bool> {
    let result = query_graph(ctx, Access::Refresh, |store, config| {
        analytics::rank(store, args.top, &config.analytics)
    });
    ctx.finish("rank", result, |report: &RankReport, w| {
        write_scored(&report.ranked, w)?;
        if !report.converged {
            writeln!(w, "(stopped after {} iterations)", report.iterations)?;
        }
        Ok(())
    })
}

pub fn run_themes(ctx: &Context) -> anyhow::Result<bool> {
    let result = query_graph(ctx, Access::Refresh, |store, config| {
        analytics::themes(store, &config.analytics)
    });
    ctx.finish("themes", result, |report: &ThemesReport, w| {
        if report.clusters.is_empty() {
            return writeln!(w, "no results");
        }
        for cluster in &report.clusters {
            section(
                w,
                &format!(
                    "cluster {} ({} members, around {})",
                    cluster.cluster_id, cluster.size, cluster.representative
                ),
            )?;
            for member in &cluster.members {
                writeln!(w, "  {member}")?;
            }
        }
        writeln!(w, "modularity {:.4}", report.modularity)
    })
}

#[derive(Args, Debug)]
pub struct PathArgs {
    pub from: String,
    pub to: String,
}

pub fn run_path(args: &PathArgs, ctx: &Context) -> anyhow::Result<bool> {
    let result = query_graph(ctx, Access::Read, |store, _| {
        analytics::path(store, &args.from, &args.to)
    });
    ctx.finish("path", result, |found: &PathResult, w| match found {
        PathResult::Connected { nodes, hops, cost } => {
            writeln!(w, "{}", nodes.join(" -> "))?;
            writeln!(w, "{hops} hops, cost {cost:.4}")
        }
        PathResult::NotConnected { source, target } => {
            writeln!(w, "{source} and {target} are not connected")
        }
    })
}

pub fn run_bridges(args: &TopArgs, ctx: &Context) -> anyhow::Result<bool> {
    let result = query_graph(ctx, Access::Refresh, |store, _| analytics::bridges(store, args.top));
    ctx.finish("bridges", result, |items: &Vec<Scored>, w| write_scored(items, w))
}

pub fn run_gaps(args: &TopArgs, ctx: &Context) -> anyhow::Result<bool> {
    let result = query_graph(ctx, Access::Read, |store, config| {
        analytics::gaps(store, args.top, &config.analytics)
    });
    ctx.finish("gaps", result, |report: &GapReport, w| {
        if report.nodes.is_empty() {
            return writeln!(w, "no results");
        }
        section(w, "boundary nodes")?;
        for gap in &report.nodes {
            writeln!(
                w,
                "{:>8.4}  {}  borders {} ({})",
                gap.score, gap.id, gap.communities_bordered, gap.title
            )?;
        }
        if !report.pairs.is_empty() {
            section(w, "unlinked pairs")?;
            for pair in &report.pairs {
                writeln!(w, "{:>8.4}  {} .. {}  via {}", pair.score, pair.a, pair.b, pair.via)?;
            }
        }
        Ok(())
    })
}

// ---------------------------------------------------------------------------
// optional indexes
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct Neighbour {
    pub id: String,
    pub score: f64,
}

#[derive(Args, Debug)]
pub struct SimilarArgs {
    pub id: String,

    #[arg(long, default_value = DEFAULT_TOP)]
    pub top: usize,
}

/// Semantic neighbours; needs a registered vector index.
pub fn run_similar(args: &SimilarArgs, ctx: &Context) -> anyhow::Result<bool> {
    let result = ctx.open().and_then(|vault: Vault| {
        let hits = vault.capabilities().similar(&args.id, args.top)?;
        let hits: Vec<Neighbour> = hits
            .into_iter()
            .map(|(id, score)| Neighbour { id, score })
            .collect();
        Ok((hits, Vec::new()))
    });
    ctx.finish("similar", result, |hits: &Vec<Neighbour>, w| {
        for hit in hits {
            writeln!(w, "{:>8.4}  {}", hit.score, hit.id)?;
        }
        Ok(())
    })
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    pub query: String,

    #[arg(long, default_value = DEFAULT_TOP)]
    pub limit: usize,
}

/// Full-text search; needs a registered text index.
pub fn run_search(args: &SearchArgs, ctx: &Context) -> anyhow::Result<bool> {
    let result = ctx.open().and_then(|vault: Vault| {
        let ids = vault.capabilities().search(&args.query, args.limit)?;
        Ok((ids, Vec::new()))
    });
    ctx.finish("search", result, |ids: &Vec<String>, w| {
        for id in ids {
            writeln!(w, "{id}")?;
        }
        Ok(())
    })
}
