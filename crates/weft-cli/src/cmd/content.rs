//! `weft create | link | update | transition | maturity | archive | session`.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Write};

use clap::{Args, Subcommand};
use weft_core::content::{
    self, ContentPatch, Created, LinkChange, Transitioned, Updated,
};
use weft_core::model::{ContentType, Edge, Maturity, NewContent};

use super::Context;
use crate::output::kv;

/// A `TYPE=ID` link declaration; a bare `ID` uses the configured default
/// edge type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkArg {
    pub edge_type: Option<String>,
    pub target: String,
}

pub fn parse_link(raw: &str) -> Result<LinkArg, String> {
    let (edge_type, target) = match raw.split_once('=') {
        Some((edge_type, target)) => (Some(edge_type.trim()), target.trim()),
        None => (None, raw.trim()),
    };
    if target.is_empty() || edge_type.is_some_and(str::is_empty) {
        return Err(format!("expected TYPE=ID or ID, got '{raw}'"));
    }
    Ok(LinkArg {
        edge_type: edge_type.map(str::to_string),
        target: target.to_string(),
    })
}

fn declarations(links: &[LinkArg], default_edge_type: &str) -> BTreeMap<String, Vec<String>> {
    let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for link in links {
        let edge_type = link.edge_type.as_deref().unwrap_or(default_edge_type);
        map.entry(edge_type.to_string())
            .or_default()
            .push(link.target.clone());
    }
    map
}

fn write_edges(w: &mut dyn Write, sign: char, edges: &[Edge]) -> io::Result<()> {
    for edge in edges {
        writeln!(w, "  {sign} {} -[{}]-> {}", edge.source_id, edge.edge_type, edge.target_id)?;
    }
    Ok(())
}

fn write_transition(t: &Transitioned, w: &mut dyn Write) -> io::Result<()> {
    writeln!(w, "{}: {} -> {}", t.id, t.from, t.to)?;
    if t.closed {
        writeln!(w, "  closed")?;
    }
    Ok(())
}

fn write_updated(u: &Updated, w: &mut dyn Write) -> io::Result<()> {
    if u.fields.is_empty() {
        writeln!(w, "{}: unchanged", u.id)
    } else {
        writeln!(w, "{}: updated {}", u.id, u.fields.join(", "))
    }
}

// ---------------------------------------------------------------------------
// create
// ---------------------------------------------------------------------------

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Title of the new item.
    pub title: String,

    /// Content type: note, reference, task, decision, or session.
    #[arg(long = "type", short = 't', default_value = "note")]
    pub content_type: ContentType,

    /// Free-form subtype, e.g. `moc` or `paper`.
    #[arg(long)]
    pub subtype: Option<String>,

    /// One-line description.
    #[arg(long, short = 'd')]
    pub description: Option<String>,

    /// Tag to attach (repeatable).
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,

    /// Hierarchical topic, e.g. `cooking/bread`.
    #[arg(long)]
    pub topic: Option<String>,

    /// Initial maturity: seedling, budding, or evergreen.
    #[arg(long)]
    pub maturity: Option<Maturity>,

    /// Outgoing link as TYPE=ID or ID (repeatable).
    #[arg(long = "link", value_name = "TYPE=ID", value_parser = parse_link)]
    pub links: Vec<LinkArg>,
}

pub fn run_create(args: &CreateArgs, ctx: &Context) -> anyhow::Result<bool> {
    let result = ctx.open().and_then(|mut vault| {
        vault.write(|tx, config| {
            let mut new = NewContent::new(args.content_type, args.title.clone())
                .with_tags(args.tags.iter().cloned());
            new.subtype.clone_from(&args.subtype);
            new.description.clone_from(&args.description);
            new.topic.clone_from(&args.topic);
            new.maturity = args.maturity;
            new.links = declarations(&args.links, &config.densify.default_edge_type);
            content::create_content(tx, &new, config)
        })
    });
    ctx.finish("create", result, |created: &Created, w| {
        kv(w, "id", &created.id)?;
        kv(w, "type", created.content_type.as_str())?;
        kv(w, "status", &created.status)?;
        if created.existing {
            kv(w, "existing", "yes")?;
        }
        Ok(())
    })
}

// ---------------------------------------------------------------------------
// link
// ---------------------------------------------------------------------------

#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Node whose manual links are replaced.
    pub id: String,

    /// The complete set of manual links as TYPE=ID or ID. None clears them.
    #[arg(value_name = "TYPE=ID", value_parser = parse_link)]
    pub links: Vec<LinkArg>,
}

pub fn run_link(args: &LinkArgs, ctx: &Context) -> anyhow::Result<bool> {
    let result = ctx.open().and_then(|mut vault| {
        vault.write(|tx, config| {
            let decls = declarations(&args.links, &config.densify.default_edge_type);
            content::set_links(tx, &args.id, &decls, config)
        })
    });
    ctx.finish("link", result, |change: &LinkChange, w| {
        writeln!(w, "{} ({})", change.id, change.status)?;
        write_edges(w, '+', &change.added)?;
        write_edges(w, '-', &change.removed)
    })
}

// ---------------------------------------------------------------------------
// update
// ---------------------------------------------------------------------------

#[derive(Args, Debug)]
pub struct UpdateArgs {
    pub id: String,

    #[arg(long)]
    pub title: Option<String>,

    /// New description; an empty string clears it.
    #[arg(long, short = 'd')]
    pub description: Option<String>,

    /// New topic; an empty string clears it.
    #[arg(long)]
    pub topic: Option<String>,

    /// New subtype; an empty string clears it.
    #[arg(long)]
    pub subtype: Option<String>,

    /// Replace the tag set (repeatable).
    #[arg(long = "tag", value_name = "TAG", conflicts_with = "clear_tags")]
    pub tags: Vec<String>,

    /// Remove every tag.
    #[arg(long)]
    pub clear_tags: bool,
}

impl UpdateArgs {
    fn patch(&self) -> ContentPatch {
        let tags = if self.clear_tags {
            Some(BTreeSet::new())
        } else if self.tags.is_empty() {
            None
        } else {
            Some(self.tags.iter().cloned().collect())
        };
        ContentPatch {
            title: self.title.clone(),
            description: self.description.clone(),
            topic: self.topic.clone(),
            subtype: self.subtype.clone(),
            tags,
        }
    }
}

pub fn run_update(args: &UpdateArgs, ctx: &Context) -> anyhow::Result<bool> {
    let patch = args.patch();
    let result = ctx
        .open()
        .and_then(|mut vault| vault.write(|tx, _| content::update_content(tx, &args.id, &patch)));
    ctx.finish("update", result, write_updated)
}

// ---------------------------------------------------------------------------
// transition / maturity / archive
// ---------------------------------------------------------------------------

#[derive(Args, Debug)]
pub struct TransitionArgs {
    pub id: String,

    /// Target status, e.g. `active`, `done`, `accepted`.
    pub status: String,
}

pub fn run_transition(args: &TransitionArgs, ctx: &Context) -> anyhow::Result<bool> {
    let result = ctx
        .open()
        .and_then(|mut vault| vault.write(|tx, _| content::transition(tx, &args.id, &args.status)));
    ctx.finish("transition", result, write_transition)
}

#[derive(Args, Debug)]
pub struct MaturityArgs {
    pub id: String,

    /// Target level: seedling, budding, or evergreen.
    pub level: String,
}

pub fn run_maturity(args: &MaturityArgs, ctx: &Context) -> anyhow::Result<bool> {
    let result = ctx
        .open()
        .and_then(|mut vault| vault.write(|tx, _| content::set_maturity(tx, &args.id, &args.level)));
    ctx.finish("maturity", result, write_transition)
}

#[derive(Args, Debug)]
pub struct ArchiveArgs {
    pub id: String,
}

pub fn run_archive(args: &ArchiveArgs, ctx: &Context) -> anyhow::Result<bool> {
    let result = ctx
        .open()
        .and_then(|mut vault| vault.write(|tx, _| content::archive(tx, &args.id)));
    ctx.finish("archive", result, write_updated)
}

// ---------------------------------------------------------------------------
// session
// ---------------------------------------------------------------------------

#[derive(Subcommand, Debug)]
pub enum SessionCommand {
    /// Open a new session log.
    Start {
        /// Session title.
        title: String,
    },
    /// Close an open session log.
    Close {
        /// Session id, e.g. `SES-0001`.
        id: String,
    },
}

pub fn run_session(command: &SessionCommand, ctx: &Context) -> anyhow::Result<bool> {
    match command {
        SessionCommand::Start { title } => {
            let result = ctx.open().and_then(|mut vault| {
                vault.write(|tx, config| content::start_session(tx, title, config))
            });
            ctx.finish("session.start", result, |created: &Created, w| {
                kv(w, "id", &created.id)?;
                kv(w, "status", &created.status)
            })
        }
        SessionCommand::Close { id } => {
            let result = ctx
                .open()
                .and_then(|mut vault| vault.write(|tx, _| content::close_session(tx, id)));
            ctx.finish("session.close", result, write_transition)
        }
    }
}
