#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use cmd::Context;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "weft: a link-graph engine for personal knowledge vaults",
    long_about = None
)]
struct Cli {
    /// Vault root directory. Defaults to `WEFT_VAULT`, then the current
    /// directory.
    #[arg(long, global = true, value_name = "DIR")]
    vault: Option<PathBuf>,

    /// Emit the outcome as JSON instead of short text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn vault_root(&self) -> anyhow::Result<PathBuf> {
        let root = match &self.vault {
            Some(path) => path.clone(),
            None => match env::var_os("WEFT_VAULT") {
                Some(path) => PathBuf::from(path),
                None => env::current_dir()?,
            },
        };
        Ok(cmd::expand_home(&root))
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Vault",
        about = "Initialize a vault",
        after_help = "EXAMPLES:\n    weft init\n    weft --vault ~/notes init --json"
    )]
    Init,

    #[command(
        next_help_heading = "Content",
        about = "Create a note, reference, task, decision, or session",
        after_help = "EXAMPLES:\n    weft create \"Sourdough starters\" --tag baking --topic cooking/bread\n    weft create \"Adopt SQLite\" --type decision --link supports=note-1a2b3c4d"
    )]
    Create(cmd::content::CreateArgs),

    #[command(
        next_help_heading = "Content",
        about = "Replace the manual links of a node",
        after_help = "EXAMPLES:\n    weft link note-1a2b3c4d cites=ref-0f0e0d0c note-99aa88bb\n    weft link note-1a2b3c4d"
    )]
    Link(cmd::content::LinkArgs),

    #[command(next_help_heading = "Content", about = "Edit title, description, tags, topic, or subtype")]
    Update(cmd::content::UpdateArgs),

    #[command(
        next_help_heading = "Lifecycle",
        about = "Move a task, decision, or session to a new status",
        after_help = "EXAMPLES:\n    weft transition TASK-0001 active\n    weft transition DEC-0002 accepted"
    )]
    Transition(cmd::content::TransitionArgs),

    #[command(next_help_heading = "Lifecycle", about = "Promote or demote maturity")]
    Maturity(cmd::content::MaturityArgs),

    #[command(next_help_heading = "Lifecycle", about = "Archive a node")]
    Archive(cmd::content::ArchiveArgs),

    #[command(next_help_heading = "Lifecycle", about = "Start or close a session log")]
    Session {
        #[command(subcommand)]
        command: cmd::content::SessionCommand,
    },

    #[command(
        next_help_heading = "Analytics",
        about = "Nodes related to a source by spreading activation",
        after_help = "EXAMPLES:\n    weft related note-1a2b3c4d --depth 3 --top 5"
    )]
    Related(cmd::analyze::RelatedArgs),

    #[command(next_help_heading = "Analytics", about = "Rank nodes by PageRank")]
    Rank(cmd::analyze::TopArgs),

    #[command(next_help_heading = "Analytics", about = "Detect topic clusters")]
    Themes,

    #[command(next_help_heading = "Analytics", about = "Shortest chain between two nodes")]
    Path(cmd::analyze::PathArgs),

    #[command(next_help_heading = "Analytics", about = "Nodes bridging the graph")]
    Bridges(cmd::analyze::TopArgs),

    #[command(next_help_heading = "Analytics", about = "Structural holes between clusters")]
    Gaps(cmd::analyze::TopArgs),

    #[command(next_help_heading = "Analytics", about = "Semantic neighbours (needs a vector index)")]
    Similar(cmd::analyze::SimilarArgs),

    #[command(next_help_heading = "Analytics", about = "Full-text search (needs a text index)")]
    Search(cmd::analyze::SearchArgs),

    #[command(
        next_help_heading = "Densification",
        about = "Discover, score, and connect missing links",
        after_help = "EXAMPLES:\n    weft reweave --source note-1a2b3c4d --dry-run\n    weft reweave --body-file notes/starters.md --json"
    )]
    Reweave(cmd::reweave::ReweaveArgs),

    #[command(next_help_heading = "Densification", about = "Drop pipeline links that no longer score")]
    Prune(cmd::reweave::PruneArgs),

    #[command(
        next_help_heading = "Densification",
        about = "Revert a densification log entry",
        after_help = "EXAMPLES:\n    weft undo\n    weft undo 4"
    )]
    Undo(cmd::reweave::UndoArgs),

    #[command(next_help_heading = "Densification", about = "Show the densification log")]
    Log(cmd::reweave::LogArgs),

    #[command(next_help_heading = "Vault", about = "Check index integrity")]
    Check(cmd::vault::CheckArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("WEFT_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "weft=debug,info"
        } else {
            "weft=info,warn"
        })
    });

    let format = env::var("WEFT_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<bool> {
    let ctx = Context {
        root: cli.vault_root()?,
        mode: output::resolve_output_mode(cli.json),
    };
    debug!(root = %ctx.root.display(), "resolved vault root");

    match &cli.command {
        Commands::Init => cmd::vault::run_init(&ctx),
        Commands::Create(args) => cmd::content::run_create(args, &ctx),
        Commands::Link(args) => cmd::content::run_link(args, &ctx),
        Commands::Update(args) => cmd::content::run_update(args, &ctx),
        Commands::Transition(args) => cmd::content::run_transition(args, &ctx),
        Commands::Maturity(args) => cmd::content::run_maturity(args, &ctx),
        Commands::Archive(args) => cmd::content::run_archive(args, &ctx),
        Commands::Session { command } => cmd::content::run_session(command, &ctx),
        Commands::Related(args) => cmd::analyze::run_related(args, &ctx),
        Commands::Rank(args) => cmd::analyze::run_rank(args, &ctx),
        Commands::Themes => cmd::analyze::run_themes(&ctx),
        Commands::Path(args) => cmd::analyze::run_path(args, &ctx),
        Commands::Bridges(args) => cmd::analyze::run_bridges(args, &ctx),
        Commands::Gaps(args) => cmd::analyze::run_gaps(args, &ctx),
        Commands::Similar(args) => cmd::analyze::run_similar(args, &ctx),
        Commands::Search(args) => cmd::analyze::run_search(args, &ctx),
        Commands::Reweave(args) => cmd::reweave::run_reweave(args, &ctx),
        Commands::Prune(args) => cmd::reweave::run_prune(args, &ctx),
        Commands::Undo(args) => cmd::reweave::run_undo(args, &ctx),
        Commands::Log(args) => cmd::reweave::run_log(args, &ctx),
        Commands::Check(args) => cmd::vault::run_check(args, &ctx),
    }
}

fn main() -> anyhow::Result<ExitCode> {
    init_tracing();

    let cli = Cli::parse();
    if run(&cli)? {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_flag_parses_after_subcommand() {
        let cli = Cli::parse_from(["weft", "rank", "--json"]);
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::Rank(_)));
    }

    #[test]
    fn vault_flag_is_global() {
        let cli = Cli::parse_from(["weft", "themes", "--vault", "/tmp/v"]);
        assert_eq!(cli.vault.as_deref(), Some(std::path::Path::new("/tmp/v")));
        assert_eq!(cli.vault_root().expect("root"), PathBuf::from("/tmp/v"));
    }

    #[test]
    fn create_parses_type_tags_and_links() {
        let cli = Cli::parse_from([
            "weft",
            "create",
            "Adopt SQLite",
            "--type",
            "decision",
            "--tag",
            "storage",
            "--tag",
            "infra",
            "--link",
            "supports=note-1a2b3c4d",
        ]);
        let Commands::Create(args) = cli.command else {
            panic!("expected create");
        };
        assert_eq!(args.content_type, weft_core::model::ContentType::Decision);
        assert_eq!(args.tags, vec!["storage".to_string(), "infra".to_string()]);
        assert_eq!(args.links[0].edge_type.as_deref(), Some("supports"));
    }

    #[test]
    fn unknown_content_type_is_rejected() {
        assert!(Cli::try_parse_from(["weft", "create", "x", "--type", "poem"]).is_err());
    }

    #[test]
    fn session_subcommands_parse() {
        let cli = Cli::parse_from(["weft", "session", "start", "Morning review"]);
        assert!(matches!(
            cli.command,
            Commands::Session {
                command: cmd::content::SessionCommand::Start { .. }
            }
        ));
        let cli = Cli::parse_from(["weft", "session", "close", "SES-0001"]);
        assert!(matches!(
            cli.command,
            Commands::Session {
                command: cmd::content::SessionCommand::Close { .. }
            }
        ));
    }

    #[test]
    fn body_and_body_file_conflict() {
        assert!(
            Cli::try_parse_from([
                "weft",
                "reweave",
                "--body",
                "x",
                "--body-file",
                "y.md"
            ])
            .is_err()
        );
    }

    #[test]
    fn all_subcommands_listed() {
        let subcommands = [
            vec!["weft", "init"],
            vec!["weft", "create", "x"],
            vec!["weft", "link", "note-1a2b3c4d"],
            vec!["weft", "update", "note-1a2b3c4d", "--title", "y"],
            vec!["weft", "transition", "TASK-0001", "done"],
            vec!["weft", "maturity", "note-1a2b3c4d", "budding"],
            vec!["weft", "archive", "note-1a2b3c4d"],
            vec!["weft", "related", "note-1a2b3c4d"],
            vec!["weft", "rank"],
            vec!["weft", "themes"],
            vec!["weft", "path", "a", "b"],
            vec!["weft", "bridges"],
            vec!["weft", "gaps"],
            vec!["weft", "similar", "note-1a2b3c4d"],
            vec!["weft", "search", "bread"],
            vec!["weft", "reweave"],
            vec!["weft", "prune", "--dry-run"],
            vec!["weft", "undo", "3"],
            vec!["weft", "log"],
            vec!["weft", "check", "--repair"],
        ];
        for args in &subcommands {
            let result = Cli::try_parse_from(args.iter());
            assert!(result.is_ok(), "failed to parse {args:?}: {:?}", result.err());
        }
    }
}
