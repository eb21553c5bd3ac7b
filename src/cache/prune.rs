// Retention engine.
// Selects versions older than a max age (optionally sparing each library's latest) and removes them.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;

use super::Cache;
use super::catalog::Catalog;

/// Pruning policy.
#[derive(Debug, Clone, Copy)]
pub struct PruneOptions {
    pub max_age: Duration,
    /// Never remove the most recently fetched version of a library.
    pub keep_latest: bool,
    /// Select without deleting.
    pub dry_run: bool,
}

/// Outcome of a prune pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PruneResult {
    pub removed_count: usize,
    pub freed_space: u64,
    /// `/org/name@version` labels in catalog order.
    pub removed_items: Vec<String>,
    pub dry_run: bool,
}

impl Cache {
    /// Remove (or with `dry_run`, report) stale versions.
    pub fn prune(&self, opts: PruneOptions) -> Result<PruneResult> {
        self.prune_at(opts, Utc::now())
    }

    pub(crate) fn prune_at(&self, opts: PruneOptions, now: DateTime<Utc>) -> Result<PruneResult> {
        let catalog = self.list_all()?;
        Ok(self.prune_catalog(&catalog, opts, now))
    }

    /// Apply the policy to an already scanned catalog. Entries that fail to
    /// delete are logged and left out of the result.
    pub(crate) fn prune_catalog(
        &self,
        catalog: &Catalog,
        opts: PruneOptions,
        now: DateTime<Utc>,
    ) -> PruneResult {
        let latest = if opts.keep_latest {
            latest_versions(catalog)
        } else {
            HashMap::new()
        };

        let mut result = PruneResult {
            dry_run: opts.dry_run,
            ..PruneResult::default()
        };

        for (lib, version) in catalog.entries() {
            if latest.get(lib.library_id.as_str()) == Some(&version.version.as_str()) {
                continue;
            }

            let age = now
                .signed_duration_since(version.fetched_at)
                .to_std()
                .unwrap_or(Duration::ZERO);
            if age <= opts.max_age {
                continue;
            }

            let label = format!("{}@{}", lib.library_id, version.version);
            if !opts.dry_run {
                if let Err(err) = self.remove_version(&lib.library_id, &version.version) {
                    tracing::warn!(entry = %label, error = %err, "failed to prune entry, skipping");
                    continue;
                }
                tracing::debug!(entry = %label, "pruned entry");
            }

            result.removed_count += 1;
            result.freed_space += version.size;
            result.removed_items.push(label);
        }

        result
    }
}

/// Most recently fetched version per library. Ties keep the first in catalog order.
fn latest_versions(catalog: &Catalog) -> HashMap<&str, &str> {
    let mut latest = HashMap::new();
    for lib in &catalog.libraries {
        let mut newest: Option<(DateTime<Utc>, &str)> = None;
        for v in &lib.versions {
            if newest.is_none_or(|(at, _)| v.fetched_at > at) {
                newest = Some((v.fetched_at, v.version.as_str()));
            }
        }
        if let Some((_, version)) = newest {
            latest.insert(lib.library_id.as_str(), version);
        }
    }
    latest
}
