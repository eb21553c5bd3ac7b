// ctx7: fetch Context7 documentation for a library from the terminal.
// Documents go to stdout; selectors, logs, and errors go to stderr.

mod app;
mod cache;
mod cmd;
mod config;
mod context7;
mod error;
mod ui;

use std::io::{self, Write};
use std::process::ExitCode;

use clap::{CommandFactory, Parser, error::ErrorKind};
use tracing_subscriber::EnvFilter;

use crate::app::{Lookup, LookupOptions};
use crate::cache::Cache;
use crate::cmd::Cli;
use crate::config::Config;
use crate::context7::Context7Client;
use crate::error::{Ctx7Error, Result};
use crate::ui::TerminalSelector;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = cli.check_conflicts() {
        err.exit();
    }
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(Ctx7Error::Cancelled) => {
            eprintln!("Cancelled");
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr. `RUST_LOG` overrides the level chosen by `--verbose`.
fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("ctx7={}", level)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::resolve(cli.cache_dir.clone())?;
    tracing::debug!(cache_dir = %config.cache_dir.display(), base_url = %config.base_url, "resolved configuration");

    if let Some(command) = cli.cache_command() {
        let cache = Cache::new(&config.cache_dir)?;
        return cmd::cache::run(&cache, command);
    }

    let Some(query) = cli.query.as_deref() else {
        Cli::command()
            .error(ErrorKind::MissingRequiredArgument, "a library name is required")
            .exit();
    };

    let cache = match Cache::new(&config.cache_dir) {
        Ok(cache) => Some(cache),
        Err(err) => {
            tracing::warn!(error = %err, "cache unavailable, continuing without it");
            None
        }
    };

    let client = Context7Client::new(&config.base_url)?;
    let mut selector = TerminalSelector::new();
    let options = LookupOptions {
        interactive: cli.interactive,
        no_cache: cli.no_cache,
        show_versions: cli.versions,
    };

    let outcome = Lookup::new(&config, cache.as_ref(), &client, &mut selector, options)
        .run(query)
        .await?;
    tracing::debug!(
        library = %outcome.library_id,
        version = outcome.version.as_deref(),
        from_cache = outcome.from_cache,
        "lookup complete"
    );

    let mut stdout = io::stdout().lock();
    stdout.write_all(outcome.content.as_bytes())?;
    stdout.flush()?;
    Ok(())
}
