// Statistics aggregator.
// Summary and per-library metrics derived from a catalog scan.

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;

use super::Cache;
use super::catalog::Catalog;
use super::paths;

/// Aggregate statistics for the libraries subtree.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub total_size: u64,
    /// Starts at the scan time and only moves back, so an empty cache
    /// reports "now".
    pub oldest_entry: DateTime<Utc>,
    pub newest_entry: Option<DateTime<Utc>>,
    pub cache_dir: PathBuf,
}

/// Statistics for one library.
#[derive(Debug, Clone, Serialize)]
pub struct LibraryStats {
    pub library_id: String,
    pub version_count: usize,
    pub total_size: u64,
    pub oldest_version: DateTime<Utc>,
    pub newest_version: DateTime<Utc>,
}

/// [`CacheStats`] plus a per-library breakdown and search-cache usage.
#[derive(Debug, Clone, Serialize)]
pub struct DetailedStats {
    #[serde(flatten)]
    pub summary: CacheStats,
    /// Largest libraries first.
    pub library_breakdown: Vec<LibraryStats>,
    pub search_cache_size: u64,
    pub search_cache_entries: usize,
}

impl CacheStats {
    fn from_catalog(catalog: &Catalog, cache_dir: PathBuf, now: DateTime<Utc>) -> Self {
        let mut stats = Self {
            total_entries: 0,
            total_size: 0,
            oldest_entry: now,
            newest_entry: None,
            cache_dir,
        };

        for (_, version) in catalog.entries() {
            stats.total_entries += 1;
            stats.total_size += version.size;
            if version.fetched_at < stats.oldest_entry {
                stats.oldest_entry = version.fetched_at;
            }
            if stats.newest_entry.is_none_or(|newest| version.fetched_at > newest) {
                stats.newest_entry = Some(version.fetched_at);
            }
        }

        stats
    }
}

impl Cache {
    /// Entry count, total size, and oldest/newest fetch times.
    pub fn stats(&self) -> Result<CacheStats> {
        let catalog = self.list_all()?;
        Ok(CacheStats::from_catalog(
            &catalog,
            self.root().to_path_buf(),
            Utc::now(),
        ))
    }

    /// Summary plus per-library breakdown and search-cache usage.
    pub fn detailed_stats(&self) -> Result<DetailedStats> {
        let catalog = self.list_all()?;
        let summary = CacheStats::from_catalog(&catalog, self.root().to_path_buf(), Utc::now());

        let mut library_breakdown: Vec<LibraryStats> = catalog
            .libraries
            .iter()
            .filter_map(|lib| {
                let oldest = lib.versions.iter().map(|v| v.fetched_at).min()?;
                let newest = lib.versions.iter().map(|v| v.fetched_at).max()?;
                Some(LibraryStats {
                    library_id: lib.library_id.clone(),
                    version_count: lib.versions.len(),
                    total_size: lib.total_size(),
                    oldest_version: oldest,
                    newest_version: newest,
                })
            })
            .collect();
        library_breakdown.sort_by(|a, b| b.total_size.cmp(&a.total_size));

        let (search_cache_size, search_cache_entries) = self.search_cache_usage();

        Ok(DetailedStats {
            summary,
            library_breakdown,
            search_cache_size,
            search_cache_entries,
        })
    }

    fn search_cache_usage(&self) -> (u64, usize) {
        let Ok(entries) = fs::read_dir(paths::searches_dir(self.root())) else {
            return (0, 0);
        };

        // Only committed records; staging temps end in `.tmp`.
        entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "json"))
            .filter_map(|entry| entry.metadata().ok())
            .filter(|meta| meta.is_file())
            .fold((0, 0), |(size, count), meta| (size + meta.len(), count + 1))
    }
}
