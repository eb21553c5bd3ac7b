// Cache path utilities.
// Normalizes library identifiers and maps them onto the on-disk cache hierarchy.

use std::fmt;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;

use crate::error::{Ctx7Error, Result};

/// Subtree holding one directory per cached library version.
pub const LIBRARIES_DIR: &str = "libraries";
/// Subtree holding hashed search result documents.
pub const SEARCHES_DIR: &str = "searches";
/// Version directory used when no explicit version was requested.
pub const DEFAULT_VERSION: &str = "default";
/// Raw document payload inside a version directory.
pub const CONTENT_FILE: &str = "content.txt";
/// Metadata record inside a version directory.
pub const METADATA_FILE: &str = "metadata.json";

/// Get the platform cache directory (~/.cache/ctx7 on Linux).
pub fn default_cache_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "ctx7").map(|dirs| dirs.cache_dir().to_path_buf())
}

/// A validated `org/name` library identifier.
///
/// Parsing strips a single leading `/`; [`fmt::Display`] restores it, so
/// `"/vercel/next.js"` and `"vercel/next.js"` refer to the same entry and are
/// both reported back as `"/vercel/next.js"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LibraryId {
    org: String,
    name: String,
}

impl LibraryId {
    /// Parse and normalize a raw identifier.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.strip_prefix('/').unwrap_or(raw);
        let mut parts = trimmed.split('/');

        match (parts.next(), parts.next(), parts.next()) {
            (Some(org), Some(name), None) if is_valid_segment(org) && is_valid_segment(name) => {
                Ok(Self {
                    org: org.to_string(),
                    name: name.to_string(),
                })
            }
            _ => Err(Ctx7Error::InvalidIdentifier(raw.to_string())),
        }
    }

    /// Build an identifier from segments already read off disk.
    pub(crate) fn from_segments(org: &str, name: &str) -> Option<Self> {
        (is_valid_segment(org) && is_valid_segment(name)).then(|| Self {
            org: org.to_string(),
            name: name.to_string(),
        })
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for LibraryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.org, self.name)
    }
}

/// Resolve the directory name for a requested version.
///
/// `None` and the empty string map to [`DEFAULT_VERSION`]. Versions that could
/// escape their library directory are rejected.
pub fn version_dir_name(version: Option<&str>) -> Result<&str> {
    match version {
        None | Some("") => Ok(DEFAULT_VERSION),
        Some(v) if is_valid_segment(v) => Ok(v),
        Some(v) => Err(Ctx7Error::InvalidIdentifier(format!("version {:?}", v))),
    }
}

/// Label used in reports: `/org/name@version`.
pub fn entry_label(id: &LibraryId, version: &str) -> String {
    format!("{}@{}", id, version)
}

/// Path to the libraries subtree.
pub fn libraries_dir(root: &Path) -> PathBuf {
    root.join(LIBRARIES_DIR)
}

/// Path to the searches subtree.
pub fn searches_dir(root: &Path) -> PathBuf {
    root.join(SEARCHES_DIR)
}

/// Path to an organization's directory.
pub fn org_dir(root: &Path, id: &LibraryId) -> PathBuf {
    libraries_dir(root).join(&id.org)
}

/// Path to a library's directory (parent of all its versions).
pub fn library_dir(root: &Path, id: &LibraryId) -> PathBuf {
    org_dir(root, id).join(&id.name)
}

/// Path to a single version's directory.
pub fn version_dir(root: &Path, id: &LibraryId, version: Option<&str>) -> Result<PathBuf> {
    Ok(library_dir(root, id).join(version_dir_name(version)?))
}

/// Path to a cached search document.
pub fn search_path(root: &Path, query_hash: &str) -> PathBuf {
    searches_dir(root).join(format!("{}.json", query_hash))
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains(['/', '\\', '\0'])
}
