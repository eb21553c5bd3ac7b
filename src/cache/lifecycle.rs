// Whole-cache and per-library lifecycle operations: clear, remove, force invalidation.

use std::fs;
use std::io;

use crate::error::{Ctx7Error, Result};

use super::Cache;
use super::paths::{self, LibraryId};
use super::store;

impl Cache {
    /// Delete everything under `libraries/` and `searches/`, then recreate both.
    pub fn clear(&self) -> Result<()> {
        for dir in [
            paths::libraries_dir(self.root()),
            paths::searches_dir(self.root()),
        ] {
            match fs::remove_dir_all(&dir) {
                Ok(()) => {}
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        tracing::info!(root = %self.root().display(), "cache cleared");
        self.ensure_layout()
    }

    /// Delete every cached version of a library.
    pub fn remove_library(&self, library_id: &str) -> Result<()> {
        let id = LibraryId::parse(library_id)?;
        let library_dir = paths::library_dir(self.root(), &id);
        if !library_dir.is_dir() {
            return Err(Ctx7Error::NotFound(id.to_string()));
        }

        fs::remove_dir_all(&library_dir)?;
        store::remove_dir_if_empty(&paths::org_dir(self.root(), &id));

        tracing::info!(library = %id, "removed library from cache");
        Ok(())
    }

    /// Delete one cached version of a library.
    pub fn remove_version(&self, library_id: &str, version: &str) -> Result<()> {
        let id = LibraryId::parse(library_id)?;
        let version_dir = paths::version_dir(self.root(), &id, Some(version))?;
        if !version_dir.is_dir() {
            return Err(Ctx7Error::NotFound(paths::entry_label(
                &id,
                paths::version_dir_name(Some(version))?,
            )));
        }

        fs::remove_dir_all(&version_dir)?;
        if store::remove_dir_if_empty(&paths::library_dir(self.root(), &id)) {
            store::remove_dir_if_empty(&paths::org_dir(self.root(), &id));
        }

        tracing::debug!(library = %id, version, "removed version from cache");
        Ok(())
    }

    /// Invalidate a version, or the whole library when no version is given,
    /// so the next read is a miss.
    pub fn force_update(&self, library_id: &str, version: Option<&str>) -> Result<()> {
        match version {
            Some(v) if !v.is_empty() => self.remove_version(library_id, v),
            _ => self.remove_library(library_id),
        }
    }
}
