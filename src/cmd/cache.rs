// Cache management commands.
// Each handler previews, confirms unless forced, applies, and returns a report.

use std::io::{self, BufRead, Write};
use std::time::Duration;

use serde::Serialize;

use crate::cache::{Cache, Catalog, DetailedStats, LibraryId, PruneOptions, PruneResult};
use crate::error::{Ctx7Error, Result};

use super::format::{confirm_action, format_age, format_date, format_size, print_header, print_json};
use super::{CacheCommand, ConfirmArgs, PruneArgs, RemoveArgs, UpdateArgs};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);
const TOP_LIBRARIES: usize = 5;

/// What a destructive command ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Applied,
    DryRun,
    Cancelled,
    NothingToDo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClearReport {
    pub removed_entries: usize,
    pub freed_space: u64,
    pub status: Status,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoveReport {
    pub library_id: String,
    pub removed_versions: Vec<String>,
    pub freed_space: u64,
    pub status: Status,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateReport {
    pub library_id: String,
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PruneReport {
    /// The result of the real pass, or of the preview when nothing was applied.
    pub result: PruneResult,
    pub status: Status,
}

#[derive(Serialize)]
struct ListJson<'a> {
    libraries: &'a [crate::cache::CachedLibrary],
    total_libraries: usize,
    warnings: &'a [crate::cache::ScanWarning],
}

/// Run a cache subcommand against stdout and stdin.
pub fn run(cache: &Cache, command: CacheCommand) -> Result<()> {
    let mut out = io::stdout().lock();
    let mut input = io::stdin().lock();
    dispatch(cache, command, &mut out, &mut input)
}

fn dispatch(
    cache: &Cache,
    command: CacheCommand,
    out: &mut impl Write,
    input: &mut impl BufRead,
) -> Result<()> {
    match command {
        CacheCommand::Stats { json } => {
            stats(cache, json, out)?;
        }
        CacheCommand::List { json } => {
            list(cache, json, out)?;
        }
        CacheCommand::Clear(args) => {
            clear(cache, &args, out, input)?;
        }
        CacheCommand::Remove(args) => {
            remove(cache, &args, out, input)?;
        }
        CacheCommand::Update(args) => {
            update(cache, &args, out)?;
        }
        CacheCommand::Prune(args) => {
            prune(cache, &args, out, input)?;
        }
    }
    Ok(())
}

pub fn stats(cache: &Cache, json: bool, out: &mut impl Write) -> Result<DetailedStats> {
    let stats = cache.detailed_stats()?;
    if json {
        print_json(out, &stats)?;
        return Ok(stats);
    }

    let summary = &stats.summary;
    print_header(out, "Cache Statistics")?;
    writeln!(out, "Location:        {}", summary.cache_dir.display())?;
    writeln!(out, "Total Libraries: {}", stats.library_breakdown.len())?;
    writeln!(out, "Total Versions:  {}", summary.total_entries)?;
    writeln!(out, "Total Size:      {}", format_size(summary.total_size))?;

    if summary.total_entries > 0 {
        writeln!(
            out,
            "Oldest Entry:    {} ({})",
            format_date(summary.oldest_entry),
            format_age(summary.oldest_entry)
        )?;
    }
    if let Some(newest) = summary.newest_entry {
        writeln!(out, "Newest Entry:    {} ({})", format_date(newest), format_age(newest))?;
    }

    if !stats.library_breakdown.is_empty() {
        writeln!(out)?;
        writeln!(out, "Top Libraries by Size:")?;
        for (i, lib) in stats.library_breakdown.iter().take(TOP_LIBRARIES).enumerate() {
            writeln!(
                out,
                "  {}. {:<30} {:>10}  ({} versions)",
                i + 1,
                lib.library_id,
                format_size(lib.total_size),
                lib.version_count
            )?;
        }
    }

    if stats.search_cache_entries > 0 {
        writeln!(out)?;
        writeln!(
            out,
            "Search Cache:    {} ({} entries)",
            format_size(stats.search_cache_size),
            stats.search_cache_entries
        )?;
    }

    Ok(stats)
}

pub fn list(cache: &Cache, json: bool, out: &mut impl Write) -> Result<Catalog> {
    let catalog = cache.list_all()?;
    log_warnings(&catalog);

    if json {
        print_json(
            out,
            &ListJson {
                libraries: &catalog.libraries,
                total_libraries: catalog.libraries.len(),
                warnings: &catalog.warnings,
            },
        )?;
        return Ok(catalog);
    }

    if catalog.is_empty() {
        writeln!(out, "Cache is empty")?;
        return Ok(catalog);
    }

    print_header(out, "Cached Libraries")?;
    for lib in &catalog.libraries {
        writeln!(out, "{}", lib.library_id)?;
        for v in &lib.versions {
            let marker = if v.is_default { " (default)" } else { "" };
            writeln!(
                out,
                "  └─ {:<12} {:>10}    {}{}",
                v.version,
                format_size(v.size),
                format_date(v.fetched_at),
                marker
            )?;
        }
        writeln!(out)?;
    }
    writeln!(
        out,
        "Total: {} libraries, {} versions, {}",
        catalog.libraries.len(),
        catalog.total_versions(),
        format_size(catalog.total_size())
    )?;

    Ok(catalog)
}

pub fn clear(
    cache: &Cache,
    args: &ConfirmArgs,
    out: &mut impl Write,
    input: &mut impl BufRead,
) -> Result<ClearReport> {
    let stats = cache.stats()?;
    let mut report = ClearReport {
        removed_entries: stats.total_entries,
        freed_space: stats.total_size,
        status: Status::NothingToDo,
    };

    if stats.total_entries == 0 {
        writeln!(out, "Cache is already empty")?;
        return Ok(report);
    }

    writeln!(
        out,
        "⚠️  Warning: This will delete ALL cached libraries ({})\n",
        format_size(stats.total_size)
    )?;

    report.status = confirm_step(args, out, input, "Are you sure?", "Would remove all cache entries")?;
    if report.status != Status::Applied {
        return Ok(report);
    }

    writeln!(out, "\nClearing cache...")?;
    cache.clear()?;

    writeln!(out, "✓ Removed {} library versions", report.removed_entries)?;
    writeln!(out, "✓ Freed {} of disk space\n", format_size(report.freed_space))?;
    writeln!(out, "Cache cleared successfully")?;
    Ok(report)
}

pub fn remove(
    cache: &Cache,
    args: &RemoveArgs,
    out: &mut impl Write,
    input: &mut impl BufRead,
) -> Result<RemoveReport> {
    let id = LibraryId::parse(&args.library_id)?;
    let catalog = cache.list_all()?;
    let library = catalog
        .find(&args.library_id)
        .ok_or_else(|| Ctx7Error::NotFound(id.to_string()))?;

    let mut report = match &args.version {
        Some(version) => {
            let info = library
                .version(version)
                .ok_or_else(|| Ctx7Error::NotFound(format!("{}@{}", library.library_id, version)))?;

            writeln!(out, "Found cached version: {}@{}", library.library_id, version)?;
            writeln!(out, "  Size: {}\n", format_size(info.size))?;

            RemoveReport {
                library_id: library.library_id.clone(),
                removed_versions: vec![version.clone()],
                freed_space: info.size,
                status: Status::NothingToDo,
            }
        }
        None => {
            let versions: Vec<String> = library.versions.iter().map(|v| v.version.clone()).collect();

            writeln!(out, "Found cached library: {}", library.library_id)?;
            writeln!(out, "  Versions: {} ({})", versions.len(), versions.join(", "))?;
            writeln!(out, "  Total Size: {}\n", format_size(library.total_size()))?;

            RemoveReport {
                library_id: library.library_id.clone(),
                removed_versions: versions,
                freed_space: library.total_size(),
                status: Status::NothingToDo,
            }
        }
    };

    let target = match &args.version {
        Some(version) => format!("{}@{}", report.library_id, version),
        None => report.library_id.clone(),
    };
    report.status = confirm_step(
        &args.confirm,
        out,
        input,
        &format!("Remove {}?", target),
        &format!("Would remove {}", target),
    )?;
    if report.status != Status::Applied {
        return Ok(report);
    }

    match &args.version {
        Some(version) => cache.remove_version(&report.library_id, version)?,
        None => cache.remove_library(&report.library_id)?,
    }

    writeln!(out, "\n✓ Removed {}", target)?;
    writeln!(out, "✓ Freed {} of disk space", format_size(report.freed_space))?;
    Ok(report)
}

pub fn update(cache: &Cache, args: &UpdateArgs, out: &mut impl Write) -> Result<UpdateReport> {
    let id = LibraryId::parse(&args.library_id)?;
    let version = args.version.clone().filter(|v| !v.is_empty());

    match &version {
        Some(v) => writeln!(out, "Invalidating cache for: {}@{}", id, v)?,
        None => writeln!(out, "Invalidating cache for: {}", id)?,
    }

    cache.force_update(&args.library_id, version.as_deref())?;

    match &version {
        Some(v) => writeln!(out, "\n✓ Cache invalidated for {}@{}", id, v)?,
        None => writeln!(out, "\n✓ Cache invalidated for all versions")?,
    }
    writeln!(out, "✓ Next fetch will retrieve fresh content")?;
    writeln!(out, "\nTo fetch now, run: ctx7 {}", id)?;

    Ok(UpdateReport {
        library_id: id.to_string(),
        version,
    })
}

pub fn prune(
    cache: &Cache,
    args: &PruneArgs,
    out: &mut impl Write,
    input: &mut impl BufRead,
) -> Result<PruneReport> {
    let mut opts = PruneOptions {
        max_age: DAY * u32::try_from(args.days).unwrap_or(u32::MAX),
        keep_latest: args.keep_latest,
        dry_run: true,
    };

    writeln!(out, "Analyzing cache entries older than {} days...\n", args.days)?;
    let preview = cache.prune(opts)?;

    if preview.removed_count == 0 {
        writeln!(out, "No stale entries found")?;
        return Ok(PruneReport {
            result: preview,
            status: Status::NothingToDo,
        });
    }

    writeln!(out, "Found {} stale entries:", preview.removed_count)?;
    for item in &preview.removed_items {
        writeln!(out, "  └─ {}", item)?;
    }
    writeln!(out, "\nTotal: {} to be freed\n", format_size(preview.freed_space))?;

    let status = confirm_step(&args.confirm, out, input, "Prune these entries?", "Preview complete")?;
    if status != Status::Applied {
        return Ok(PruneReport {
            result: preview,
            status,
        });
    }

    writeln!(out, "\nPruning cache...")?;
    opts.dry_run = false;
    let result = cache.prune(opts)?;

    writeln!(out, "✓ Removed {} entries", result.removed_count)?;
    writeln!(out, "✓ Freed {} of disk space\n", format_size(result.freed_space))?;
    writeln!(out, "Cache pruned successfully")?;

    Ok(PruneReport {
        result,
        status: Status::Applied,
    })
}

/// Stop at the preview for `--dry-run`, ask unless `--force`, otherwise proceed.
fn confirm_step(
    args: &ConfirmArgs,
    out: &mut impl Write,
    input: &mut impl BufRead,
    prompt: &str,
    dry_run_note: &str,
) -> Result<Status> {
    if args.dry_run {
        writeln!(out, "[DRY RUN] {}", dry_run_note)?;
        return Ok(Status::DryRun);
    }
    if !args.force && !confirm_action(out, input, prompt)? {
        writeln!(out, "Cancelled")?;
        return Ok(Status::Cancelled);
    }
    Ok(Status::Applied)
}

fn log_warnings(catalog: &Catalog) {
    for warning in &catalog.warnings {
        tracing::debug!(path = %warning.path.display(), reason = %warning.reason, "skipped cache entry");
    }
}
