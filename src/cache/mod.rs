// Cache module for the local filesystem document cache.
// Stores fetched documentation per library version plus hashed search results.

#![allow(dead_code)]

pub mod catalog;
pub mod entry;
pub mod lifecycle;
pub mod paths;
pub mod prune;
pub mod search;
pub mod stats;
pub mod store;

use std::path::{Path, PathBuf};

use crate::error::Result;

pub use catalog::{CachedLibrary, Catalog, ScanWarning};
pub use entry::Metadata;
pub(crate) use entry::null_as_default;
pub use paths::{DEFAULT_VERSION, LibraryId};
pub use prune::{PruneOptions, PruneResult};
pub use stats::DetailedStats;

/// Handle to a cache root directory.
///
/// All operations are synchronous and single-writer per entry path. Writes
/// rely on atomic rename rather than locking: concurrent writers to the same
/// entry never corrupt it, and the last rename wins.
#[derive(Debug, Clone)]
pub struct Cache {
    root: PathBuf,
}

impl Cache {
    /// Open (creating if needed) a cache rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let cache = Self { root: root.into() };
        cache.ensure_layout()?;
        Ok(cache)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn ensure_layout(&self) -> Result<()> {
        store::create_dir_all(&paths::libraries_dir(&self.root))?;
        store::create_dir_all(&paths::searches_dir(&self.root))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_new_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("nested/ctx7");

        Cache::new(&root).unwrap();
        let cache = Cache::new(&root).unwrap();

        assert_eq!(cache.root(), root);
        assert!(root.join("libraries").is_dir());
        assert!(root.join("searches").is_dir());
    }
}
