// Catalog scanner.
// Rebuilds the inventory of cached libraries and versions from the directory tree on every call.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use walkdir::WalkDir;

use crate::error::Result;

use super::Cache;
use super::entry::Metadata;
use super::paths::{self, CONTENT_FILE, DEFAULT_VERSION, LibraryId, METADATA_FILE};
use super::store;

/// One cached version of a library.
#[derive(Debug, Clone, Serialize)]
pub struct VersionInfo {
    pub version: String,
    pub is_default: bool,
    /// Metadata plus content bytes.
    pub size: u64,
    pub fetched_at: DateTime<Utc>,
    pub metadata: Metadata,
}

/// A cached library with all of its versions.
#[derive(Debug, Clone, Serialize)]
pub struct CachedLibrary {
    /// Normalized identifier with a leading `/`.
    pub library_id: String,
    pub organization: String,
    pub name: String,
    /// `default` first, then by version string.
    pub versions: Vec<VersionInfo>,
}

impl CachedLibrary {
    pub fn total_size(&self) -> u64 {
        self.versions.iter().map(|v| v.size).sum()
    }

    pub fn version(&self, version: &str) -> Option<&VersionInfo> {
        self.versions.iter().find(|v| v.version == version)
    }
}

/// Something under `libraries/` that was skipped during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanWarning {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of a catalog scan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Catalog {
    /// Sorted by library identifier.
    pub libraries: Vec<CachedLibrary>,
    /// Entries that could not be included.
    pub warnings: Vec<ScanWarning>,
}

impl Catalog {
    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }

    pub fn total_versions(&self) -> usize {
        self.libraries.iter().map(|lib| lib.versions.len()).sum()
    }

    pub fn total_size(&self) -> u64 {
        self.libraries.iter().map(CachedLibrary::total_size).sum()
    }

    /// Look up a library by identifier, with or without the leading `/`.
    pub fn find(&self, library_id: &str) -> Option<&CachedLibrary> {
        let id = LibraryId::parse(library_id).ok()?.to_string();
        self.libraries.iter().find(|lib| lib.library_id == id)
    }

    /// Iterate over every (library, version) pair in catalog order.
    pub fn entries(&self) -> impl Iterator<Item = (&CachedLibrary, &VersionInfo)> {
        self.libraries
            .iter()
            .flat_map(|lib| lib.versions.iter().map(move |v| (lib, v)))
    }
}

impl Cache {
    /// Scan `libraries/` and return every readable entry.
    ///
    /// Structurally invalid or corrupted entries are skipped and reported in
    /// [`Catalog::warnings`] instead of failing the scan.
    pub fn list_all(&self) -> Result<Catalog> {
        let libraries_dir = paths::libraries_dir(self.root());
        let mut catalog = Catalog::default();

        if !libraries_dir.exists() {
            return Ok(catalog);
        }

        let mut by_id: BTreeMap<String, CachedLibrary> = BTreeMap::new();

        for entry in WalkDir::new(&libraries_dir).min_depth(1) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err.path().map(Path::to_path_buf).unwrap_or_default();
                    catalog.skip(path, format!("walk error: {}", err));
                    continue;
                }
            };

            if !entry.file_type().is_file() || entry.file_name() != METADATA_FILE {
                continue;
            }

            let path = entry.path();
            let Some((id, version)) = entry_position(&libraries_dir, path) else {
                catalog.skip(path.to_path_buf(), "unexpected location under libraries/".into());
                continue;
            };

            let metadata = match read_metadata(path) {
                Ok(metadata) => metadata,
                Err(reason) => {
                    catalog.skip(path.to_path_buf(), reason);
                    continue;
                }
            };

            let metadata_size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            let content_size = path
                .parent()
                .map(|dir| store::file_size(&dir.join(CONTENT_FILE)))
                .unwrap_or(0);

            let library_id = id.to_string();
            let library = by_id
                .entry(library_id.clone())
                .or_insert_with(|| CachedLibrary {
                    library_id,
                    organization: id.org().to_string(),
                    name: id.name().to_string(),
                    versions: Vec::new(),
                });

            library.versions.push(VersionInfo {
                is_default: version == DEFAULT_VERSION,
                version,
                size: metadata_size + content_size,
                fetched_at: metadata.fetched_at,
                metadata,
            });
        }

        catalog.libraries = by_id
            .into_values()
            .map(|mut lib| {
                lib.versions.sort_by(|a, b| {
                    b.is_default
                        .cmp(&a.is_default)
                        .then_with(|| a.version.cmp(&b.version))
                });
                lib
            })
            .collect();

        Ok(catalog)
    }
}

impl Catalog {
    fn skip(&mut self, path: PathBuf, reason: String) {
        tracing::debug!(path = %path.display(), %reason, "skipping catalog entry");
        self.warnings.push(ScanWarning { path, reason });
    }
}

/// Derive `(library, version)` from `<libraries>/<org>/<name>/<version>/metadata.json`.
fn entry_position(libraries_dir: &Path, metadata_path: &Path) -> Option<(LibraryId, String)> {
    let rel = metadata_path.strip_prefix(libraries_dir).ok()?;
    let segments: Vec<&str> = rel
        .components()
        .map(|c| match c {
            Component::Normal(s) => s.to_str(),
            _ => None,
        })
        .collect::<Option<_>>()?;

    match segments.as_slice() {
        [org, name, version, _] => {
            let id = LibraryId::from_segments(org, name)?;
            paths::version_dir_name(Some(*version)).ok()?;
            Some((id, version.to_string()))
        }
        _ => None,
    }
}

fn read_metadata(path: &Path) -> std::result::Result<Metadata, String> {
    let contents = fs::read_to_string(path).map_err(|e| format!("unreadable metadata: {}", e))?;
    serde_json::from_str(&contents).map_err(|e| format!("corrupt metadata: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::entry::tests::{FOREIGN_METADATA, sample_metadata};
    use tempfile::TempDir;

    fn populate(cache: &Cache) {
        for (id, version) in [
            ("/zeta/lib", None),
            ("/acme/widgets", Some("2.0")),
            ("/acme/widgets", None),
            ("/acme/widgets", Some("1.0")),
            ("/acme/gadgets", Some("0.1")),
        ] {
            let metadata = sample_metadata(id, version.unwrap_or(""));
            cache.set_version(id, version, "content", &metadata).unwrap();
        }
    }

    #[test]
    fn test_empty_cache_lists_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let cache = Cache::new(temp_dir.path()).unwrap();

        let catalog = cache.list_all().unwrap();
        assert!(catalog.is_empty());
        assert!(catalog.warnings.is_empty());
    }

    #[test]
    fn test_libraries_and_versions_are_sorted() {
        let temp_dir = TempDir::new().unwrap();
        let cache = Cache::new(temp_dir.path()).unwrap();
        populate(&cache);

        let catalog = cache.list_all().unwrap();
        let ids: Vec<_> = catalog.libraries.iter().map(|l| l.library_id.as_str()).collect();
        assert_eq!(ids, ["/acme/gadgets", "/acme/widgets", "/zeta/lib"]);

        let widgets = catalog.find("acme/widgets").unwrap();
        assert_eq!(widgets.organization, "acme");
        assert_eq!(widgets.name, "widgets");
        let versions: Vec<_> = widgets.versions.iter().map(|v| v.version.as_str()).collect();
        assert_eq!(versions, ["default", "1.0", "2.0"]);
        assert!(widgets.versions[0].is_default);
        assert!(!widgets.versions[1].is_default);
        assert_eq!(catalog.total_versions(), 5);
    }

    #[test]
    fn test_size_is_metadata_plus_content() {
        let temp_dir = TempDir::new().unwrap();
        let cache = Cache::new(temp_dir.path()).unwrap();
        cache
            .set("/acme/widgets", "0123456789", &sample_metadata("/acme/widgets", ""))
            .unwrap();
        let dir = temp_dir.path().join("libraries/acme/widgets/default");
        let metadata_len = fs::metadata(dir.join("metadata.json")).unwrap().len();

        let catalog = cache.list_all().unwrap();
        assert_eq!(catalog.libraries[0].versions[0].size, metadata_len + 10);

        fs::remove_file(dir.join("content.txt")).unwrap();
        let catalog = cache.list_all().unwrap();
        assert_eq!(catalog.libraries[0].versions[0].size, metadata_len);
    }

    #[test]
    fn test_corrupt_and_misplaced_entries_are_skipped_with_warnings() {
        let temp_dir = TempDir::new().unwrap();
        let cache = Cache::new(temp_dir.path()).unwrap();
        populate(&cache);

        let libs = temp_dir.path().join("libraries");
        fs::write(libs.join("acme/gadgets/0.1/metadata.json"), "not json").unwrap();
        fs::create_dir_all(libs.join("stray")).unwrap();
        fs::write(libs.join("stray/metadata.json"), "{}").unwrap();
        fs::create_dir_all(libs.join("a/b/c/d")).unwrap();
        fs::write(libs.join("a/b/c/d/metadata.json"), "{}").unwrap();

        let catalog = cache.list_all().unwrap();
        let ids: Vec<_> = catalog.libraries.iter().map(|l| l.library_id.as_str()).collect();
        assert_eq!(ids, ["/acme/widgets", "/zeta/lib"]);
        assert_eq!(catalog.warnings.len(), 3);
        assert!(
            catalog
                .warnings
                .iter()
                .any(|w| w.path.ends_with("acme/gadgets/0.1/metadata.json")
                    && w.reason.starts_with("corrupt metadata"))
        );
    }

    #[test]
    fn test_temp_files_are_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let cache = Cache::new(temp_dir.path()).unwrap();
        populate(&cache);
        let dir = temp_dir.path().join("libraries/zeta/lib/default");
        fs::write(dir.join(".metadata.json.123.0.tmp"), "partial").unwrap();

        let catalog = cache.list_all().unwrap();
        assert_eq!(catalog.total_versions(), 5);
        assert!(catalog.warnings.is_empty());
    }

    #[test]
    fn test_entries_with_null_fields_are_listed() {
        let temp_dir = TempDir::new().unwrap();
        let cache = Cache::new(temp_dir.path()).unwrap();
        let dir = temp_dir.path().join("libraries/acme/widgets/default");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("metadata.json"), FOREIGN_METADATA).unwrap();
        fs::write(dir.join("content.txt"), "doc").unwrap();

        let catalog = cache.list_all().unwrap();
        assert!(catalog.warnings.is_empty(), "{:?}", catalog.warnings);
        assert_eq!(catalog.total_versions(), 1);
        let info = &catalog.libraries[0].versions[0];
        assert!(info.is_default);
        assert!(info.metadata.versions.is_empty());
    }
}
