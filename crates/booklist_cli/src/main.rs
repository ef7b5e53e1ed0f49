//! Command-line front end for the booklist core.
//!
//! # Responsibility
//! - Map subcommands onto core services against one SQLite file.
//! - Print results as JSON on stdout.

use anyhow::{Context, Result};
use booklist_core::db::open_db;
use booklist_core::{
    default_log_level, init_logging, IngestRequest, IngestService, ListId, ListService,
    Mention, MetaListId, RankingService, SqliteListRepository,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Aggregate curated book lists into frequency rankings.
#[derive(Parser, Debug)]
#[clap(name = "booklist", version)]
struct Args {
    /// SQLite database file
    #[clap(long, env = "BOOKLIST_DB", default_value = "booklist.db")]
    db: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[clap(long, env = "BOOKLIST_LOG_LEVEL")]
    log_level: Option<String>,

    /// Directory for rolling log files; logging stays off when unset
    #[clap(long, env = "BOOKLIST_LOG_DIR")]
    log_dir: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest a JSON array of mentions as one raw list
    Ingest {
        /// Target list name, created on first use
        #[clap(long)]
        list: String,
        /// Description applied when the list is created
        #[clap(long)]
        description: Option<String>,
        /// Source the raw list was scraped from
        #[clap(long)]
        source: String,
        #[clap(long)]
        url: Option<String>,
        /// File holding a JSON array of mentions
        mentions: PathBuf,
    },
    /// Print the distinct books of a list
    Members {
        #[clap(long)]
        list: ListId,
    },
    /// Meta list management
    #[clap(subcommand)]
    Meta(MetaCommand),
    /// Recompute and print a meta list's ranking
    Rank {
        #[clap(long)]
        meta: MetaListId,
    },
    /// Print the last stored ranking without recomputing
    Result {
        #[clap(long)]
        meta: MetaListId,
    },
}

#[derive(Subcommand, Debug)]
enum MetaCommand {
    /// Create an empty meta list
    Create {
        name: String,
        #[clap(long)]
        description: Option<String>,
    },
    /// Add a list to a meta list
    Add {
        #[clap(long)]
        meta: MetaListId,
        #[clap(long)]
        list: ListId,
    },
    /// Remove a list from a meta list
    Remove {
        #[clap(long)]
        meta: MetaListId,
        #[clap(long)]
        list: ListId,
    },
    /// Print the member lists of a meta list
    Lists {
        #[clap(long)]
        meta: MetaListId,
    },
}

#[derive(Serialize)]
struct MembershipChange {
    meta_list_id: MetaListId,
    list_id: ListId,
    changed: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(dir) = &args.log_dir {
        let dir = absolute(dir)?;
        let level = args
            .log_level
            .as_deref()
            .unwrap_or(default_log_level());
        init_logging(level, &dir.to_string_lossy()).context("failed to initialize logging")?;
    }

    let mut conn = open_db(&args.db)
        .with_context(|| format!("failed to open database {}", args.db.display()))?;
    log::info!(
        "event=cli_command module=cli status=start command={:?}",
        args.command
    );

    match args.command {
        Command::Ingest {
            list,
            description,
            source,
            url,
            mentions,
        } => {
            let mentions = read_mentions(&mentions)?;
            let request = IngestRequest {
                list_name: list,
                list_description: description,
                source_name: source,
                source_url: url,
                mentions,
            };
            let report = IngestService::new(&mut conn).ingest(&request)?;
            print_json(&report)
        }
        Command::Members { list } => {
            let lists = ListService::new(SqliteListRepository::try_new(&conn)?);
            print_json(&lists.members_of(list)?)
        }
        Command::Meta(command) => run_meta(RankingService::new(&mut conn), command),
        Command::Rank { meta } => print_json(&RankingService::new(&mut conn).rank(meta)?),
        Command::Result { meta } => {
            print_json(&RankingService::new(&mut conn).latest_result(meta)?)
        }
    }
}

fn run_meta(mut ranking: RankingService<'_>, command: MetaCommand) -> Result<()> {
    match command {
        MetaCommand::Create { name, description } => {
            print_json(&ranking.create_meta_list(&name, description.as_deref())?)
        }
        MetaCommand::Add { meta, list } => {
            let changed = ranking.add_list(meta, list)?;
            print_json(&MembershipChange {
                meta_list_id: meta,
                list_id: list,
                changed,
            })
        }
        MetaCommand::Remove { meta, list } => {
            let changed = ranking.remove_list(meta, list)?;
            print_json(&MembershipChange {
                meta_list_id: meta,
                list_id: list,
                changed,
            })
        }
        MetaCommand::Lists { meta } => print_json(&ranking.member_lists_of(meta)?),
    }
}

fn read_mentions(path: &Path) -> Result<Vec<Mention>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read mentions from {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array of mentions", path.display()))
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("failed to resolve working directory")?;
    Ok(cwd.join(path))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
