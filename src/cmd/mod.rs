// Command-line interface.
// Defines the top-level lookup flags and the `cache` management subcommands.

pub mod cache;
pub mod format;

use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand, error::ErrorKind};

use crate::config::CACHE_DIR_ENV;

#[derive(Parser, Debug)]
#[command(name = "ctx7")]
#[command(about = "Fetch Context7 documentation for a library, with a local cache")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Library to look up, e.g. "react-router".
    #[arg(value_name = "LIBRARY")]
    pub query: Option<String>,

    /// Show a selection menu when several libraries match.
    #[arg(short, long)]
    pub interactive: bool,

    /// Show detailed logs.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Show a version selection menu.
    #[arg(long, visible_alias = "select-version")]
    pub versions: bool,

    /// Skip the cache and force a fresh fetch.
    #[arg(long)]
    pub no_cache: bool,

    /// Clear all cached content and exit. Asks for confirmation like `cache clear`.
    #[arg(long, conflicts_with = "query")]
    pub clear_cache: bool,

    /// Cache root directory.
    #[arg(long, global = true, env = CACHE_DIR_ENV, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,
}

impl Cli {
    /// The cache command to run instead of a lookup, if any.
    ///
    /// `--clear-cache` is shorthand for `cache clear` and goes through the same prompt.
    pub fn cache_command(&self) -> Option<CacheCommand> {
        match &self.command {
            Some(Command::Cache(command)) => Some(command.clone()),
            None if self.clear_cache => Some(CacheCommand::Clear(ConfirmArgs::default())),
            None => None,
        }
    }

    /// Reject combinations the parser cannot express: a library name or
    /// `--clear-cache` alongside a subcommand.
    pub fn check_conflicts(&self) -> Result<(), clap::Error> {
        if self.command.is_none() {
            return Ok(());
        }
        if let Some(query) = &self.query {
            return Err(Cli::command().error(
                ErrorKind::ArgumentConflict,
                format!("library '{}' cannot be combined with a subcommand", query),
            ));
        }
        if self.clear_cache {
            return Err(Cli::command().error(
                ErrorKind::ArgumentConflict,
                "--clear-cache cannot be combined with a subcommand",
            ));
        }
        Ok(())
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Inspect and manage the local cache.
    #[command(subcommand)]
    Cache(CacheCommand),
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum CacheCommand {
    /// Show cache statistics.
    Stats {
        /// Output in JSON format.
        #[arg(long)]
        json: bool,
    },
    /// List all cached libraries.
    List {
        /// Output in JSON format.
        #[arg(long)]
        json: bool,
    },
    /// Clear the entire cache.
    Clear(ConfirmArgs),
    /// Remove a library, or one of its versions.
    Remove(RemoveArgs),
    /// Invalidate a library so the next lookup fetches fresh content.
    Update(UpdateArgs),
    /// Remove entries older than N days.
    Prune(PruneArgs),
}

/// Flags shared by destructive commands.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfirmArgs {
    /// Skip the confirmation prompt.
    #[arg(short, long)]
    pub force: bool,

    /// Preview changes without applying them.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct RemoveArgs {
    /// Library ID, e.g. /vercel/next.js.
    pub library_id: String,

    /// Remove only this version.
    #[arg(long)]
    pub version: Option<String>,

    #[command(flatten)]
    pub confirm: ConfirmArgs,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct UpdateArgs {
    /// Library ID, e.g. /vercel/next.js.
    pub library_id: String,

    /// Invalidate only this version.
    #[arg(long)]
    pub version: Option<String>,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct PruneArgs {
    /// Age threshold in days.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub days: u64,

    /// Keep the most recently fetched version of each library.
    #[arg(long)]
    pub keep_latest: bool,

    #[command(flatten)]
    pub confirm: ConfirmArgs,
}
