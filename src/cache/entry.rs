// Entry store: one cached document plus its metadata record per library version.
// Reads check freshness; writes stage both files before committing either.

use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Ctx7Error, MissReason, Result};

use super::Cache;
use super::paths::{self, CONTENT_FILE, LibraryId, METADATA_FILE};
use super::store::{self, Backup, stage_bytes, stage_json};

/// Metadata stored alongside a cached document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub library_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    pub fetched_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_update_date: String,
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default)]
    pub total_snippets: u64,
    #[serde(default)]
    pub stars: u64,
    #[serde(default)]
    pub trust_score: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub versions: Vec<String>,
}

/// Treat an explicit `null` like a missing field. Records written by other
/// tools store an empty version list as `null`.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Metadata {
    /// Check if the entry is older than `max_age` at `now`.
    ///
    /// A fetch timestamp in the future (clock moved backwards) counts as fresh.
    pub fn is_expired_at(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        let elapsed = now
            .signed_duration_since(self.fetched_at)
            .to_std()
            .unwrap_or(Duration::ZERO);

        elapsed > max_age
    }
}

/// A complete cache entry: metadata and content, always read together.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub metadata: Metadata,
    pub content: String,
}

impl Cache {
    /// Read the default-version entry for a library.
    pub fn get(&self, library_id: &str, max_age: Duration) -> Result<CacheEntry> {
        self.get_version(library_id, None, max_age)
    }

    /// Read a specific version's entry if it is younger than `max_age`.
    pub fn get_version(
        &self,
        library_id: &str,
        version: Option<&str>,
        max_age: Duration,
    ) -> Result<CacheEntry> {
        let id = LibraryId::parse(library_id)?;
        self.read_entry_at(&id, version, max_age, Utc::now())
    }

    /// Whether a fresh default-version entry exists.
    pub fn is_valid(&self, library_id: &str, max_age: Duration) -> bool {
        self.get(library_id, max_age).is_ok()
    }

    /// Store the default-version entry for a library.
    pub fn set(&self, library_id: &str, content: &str, metadata: &Metadata) -> Result<()> {
        self.set_version(library_id, None, content, metadata)
    }

    /// Store content and metadata for a version.
    ///
    /// Both files are staged and synced before either is renamed into place;
    /// the metadata rename is last because the catalog keys on it.
    pub fn set_version(
        &self,
        library_id: &str,
        version: Option<&str>,
        content: &str,
        metadata: &Metadata,
    ) -> Result<()> {
        let id = LibraryId::parse(library_id)?;
        let dir = paths::version_dir(self.root(), &id, version)?;
        store::create_dir_all(&dir)?;

        let content_path = dir.join(CONTENT_FILE);
        let staged_content = stage_bytes(&content_path, content.as_bytes())?;
        let staged_metadata = stage_json(&dir.join(METADATA_FILE), metadata)?;

        // The previous content comes back if the metadata rename fails.
        let backup = Backup::of(&content_path)?;
        staged_content.commit()?;
        if let Err(err) = staged_metadata.commit() {
            backup.restore(&content_path);
            return Err(err);
        }

        tracing::debug!(library = %id, dir = %dir.display(), "cached entry written");
        Ok(())
    }

    pub(crate) fn read_entry_at(
        &self,
        id: &LibraryId,
        version: Option<&str>,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> Result<CacheEntry> {
        let dir = paths::version_dir(self.root(), id, version)?;

        let metadata = read_metadata(&dir.join(METADATA_FILE))?;
        if metadata.is_expired_at(max_age, now) {
            tracing::debug!(library = %id, fetched_at = %metadata.fetched_at, "cache entry expired");
            return Err(Ctx7Error::CacheMiss(MissReason::Expired));
        }

        let content = fs::read_to_string(dir.join(CONTENT_FILE)).map_err(|err| {
            tracing::debug!(library = %id, error = %err, "metadata without readable content");
            Ctx7Error::CacheMiss(MissReason::Unreadable)
        })?;

        Ok(CacheEntry { metadata, content })
    }
}

fn read_metadata(path: &Path) -> Result<Metadata> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(Ctx7Error::CacheMiss(MissReason::Absent));
        }
        Err(err) => {
            tracing::debug!(path = %path.display(), error = %err, "failed to read metadata");
            return Err(Ctx7Error::CacheMiss(MissReason::Unreadable));
        }
    };

    serde_json::from_str(&contents).map_err(|err| {
        tracing::debug!(path = %path.display(), error = %err, "failed to decode metadata");
        Ctx7Error::CacheMiss(MissReason::Unreadable)
    })
}
