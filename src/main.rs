use std::path::PathBuf;
use std::rc::Rc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use svndag::areas::fixture::load_fixture;
use svndag::areas::repository::SourceRepository;
use svndag::artifacts::changes::Revnum;
use svndag::artifacts::layout::{CustomLayout, LayoutSpec, PathLayout, WildcardLayout};
use svndag::artifacts::mapping::MappingVersion;
use svndag::commands::Session;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "svndag",
    version = "0.1.0",
    about = "Reconstruct DAG history from a flat changed-path log",
    long_about = "Reads a recorded changed-path log (a flat, globally numbered \
    history of copy-based branches) and answers DAG questions about it: which \
    paths are branches, what a branch's ancestry is across renames and copies, \
    which stable identifier a revision maps to, and which file identities a \
    branch carries.",
    help_template = r"
{name} {version} - {about}

USAGE:
    {usage}

OPTIONS:
    {all-args}
",
)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Log fixture describing the source repository")]
    log: PathBuf,

    #[arg(
        long,
        default_value = "trunk",
        help = "Path layout: trunk, trunkN, itrunkN or root"
    )]
    layout: String,

    #[arg(
        long = "branch-pattern",
        value_name = "PATTERN",
        help = "Explicit branch path or wildcard pattern (repeatable; overrides --layout)"
    )]
    branch_patterns: Vec<String>,

    #[arg(
        long = "tag-pattern",
        value_name = "PATTERN",
        help = "Explicit tag path or wildcard pattern (repeatable)"
    )]
    tag_patterns: Vec<String>,

    #[arg(long, default_value = "v4", help = "Identifier version to derive (v3 or v4)")]
    mapping: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(
        name = "classify",
        about = "Decompose a repository path into project, branch root and inner path"
    )]
    Classify {
        #[arg(index = 1, help = "The repository path to classify")]
        path: String,
    },
    #[command(name = "branches", about = "List branch roots present at a revision")]
    Branches {
        #[arg(short, long, help = "Revision to enumerate at (defaults to the newest)")]
        revision: Option<Revnum>,
        #[arg(short, long, help = "Restrict to one project")]
        project: Option<String>,
    },
    #[command(name = "tags", about = "List tag roots present at a revision")]
    Tags {
        #[arg(short, long, help = "Revision to enumerate at (defaults to the newest)")]
        revision: Option<Revnum>,
        #[arg(short, long, help = "Restrict to one project")]
        project: Option<String>,
    },
    #[command(
        name = "log",
        about = "Walk a branch's mainline backward through renames and copies"
    )]
    Log {
        #[arg(index = 1, help = "The branch root path")]
        branch: String,
        #[arg(short, long, help = "Revision to start from (defaults to the newest)")]
        revision: Option<Revnum>,
        #[arg(short = 'n', long, help = "Stop after this many revisions")]
        limit: Option<usize>,
    },
    #[command(name = "revid", about = "Print the stable identifier of a branch revision")]
    Revid {
        #[arg(index = 1, help = "The branch root path")]
        branch: String,
        #[arg(index = 2, help = "The revision number")]
        revision: Revnum,
    },
    #[command(name = "lookup", about = "Resolve a stable identifier back to a location")]
    Lookup {
        #[arg(index = 1, help = "The identifier to resolve")]
        identifier: String,
    },
    #[command(name = "merges", about = "Print the merged parents recorded for a revision")]
    Merges {
        #[arg(index = 1, help = "The branch root path")]
        branch: String,
        #[arg(index = 2, help = "The revision number")]
        revision: Revnum,
    },
    #[command(name = "file-ids", about = "Print the file-identity map of a branch")]
    FileIds {
        #[arg(index = 1, help = "The branch root path")]
        branch: String,
        #[arg(short, long, help = "Revision to build at (defaults to the newest)")]
        revision: Option<Revnum>,
    },
}

fn resolve_layout(cli: &Cli) -> Result<Rc<dyn PathLayout>> {
    if !cli.branch_patterns.is_empty() || !cli.tag_patterns.is_empty() {
        let wildcards = cli
            .branch_patterns
            .iter()
            .chain(&cli.tag_patterns)
            .any(|p| p.contains('*'));
        let branches = cli.branch_patterns.clone();
        let tags = cli.tag_patterns.clone();
        return Ok(if wildcards {
            Rc::new(WildcardLayout::new(branches, tags))
        } else {
            Rc::new(CustomLayout::new(branches, tags))
        });
    }
    Ok(cli.layout.parse::<LayoutSpec>()?.into_layout())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let fixture = load_fixture(&cli.log)?;
    let layout = resolve_layout(&cli)?;
    let version = match cli.mapping.as_str() {
        "v3" => MappingVersion::V3,
        "v4" => MappingVersion::V4,
        other => anyhow::bail!("unknown mapping version {other:?} (expected v3 or v4)"),
    };
    let repo = SourceRepository::open(fixture.uuid, Rc::new(fixture.log), layout, version)?;
    let session = Session::new(repo, Box::new(std::io::stdout()));

    match &cli.command {
        Commands::Classify { path } => session.classify(path)?,
        Commands::Branches { revision, project } => {
            session.branches(*revision, project.as_deref())?
        }
        Commands::Tags { revision, project } => session.tags(*revision, project.as_deref())?,
        Commands::Log { branch, revision, limit } => {
            session.log(branch.trim_matches('/'), *revision, *limit)?
        }
        Commands::Revid { branch, revision } => {
            session.revid(branch.trim_matches('/'), *revision)?
        }
        Commands::Lookup { identifier } => session.lookup(identifier)?,
        Commands::Merges { branch, revision } => {
            session.merges(branch.trim_matches('/'), *revision)?
        }
        Commands::FileIds { branch, revision } => {
            session.file_ids(branch.trim_matches('/'), *revision)?
        }
    }

    Ok(())
}
