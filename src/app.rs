// Lookup flow.
// Resolves a query to one library version and returns its document, cache first.

use std::time::Duration;

use chrono::Utc;

use crate::cache::{Cache, DEFAULT_VERSION, Metadata};
use crate::config::Config;
use crate::context7::{Fetcher, Library};
use crate::error::{Ctx7Error, Result};
use crate::ui::Presenter;

/// Switches for a single lookup.
#[derive(Debug, Clone, Copy, Default)]
pub struct LookupOptions {
    /// Let the presenter choose among several search results.
    pub interactive: bool,
    /// Bypass the cache for both reads and writes.
    pub no_cache: bool,
    /// Let the presenter choose a version.
    pub show_versions: bool,
}

/// Result of a lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupOutcome {
    pub content: String,
    pub from_cache: bool,
    pub library_id: String,
    /// `None` for the unversioned document.
    pub version: Option<String>,
}

/// One query-to-document resolution against a cache, a fetcher and a presenter.
pub struct Lookup<'a, F, P> {
    cache: Option<&'a Cache>,
    fetcher: &'a F,
    presenter: &'a mut P,
    options: LookupOptions,
    doc_ttl: Duration,
    search_ttl: Duration,
}

impl<'a, F: Fetcher, P: Presenter> Lookup<'a, F, P> {
    /// `cache` is optional: without one every lookup goes to the fetcher.
    pub fn new(
        config: &Config,
        cache: Option<&'a Cache>,
        fetcher: &'a F,
        presenter: &'a mut P,
        options: LookupOptions,
    ) -> Self {
        Self {
            cache,
            fetcher,
            presenter,
            options,
            doc_ttl: config.doc_ttl,
            search_ttl: config.search_ttl,
        }
    }

    pub async fn run(&mut self, query: &str) -> Result<LookupOutcome> {
        let candidates = self.search(query).await?;
        let library = self.choose_library(query, &candidates)?;
        let version = self.choose_version(&library)?;

        if let Some(entry) = self.cached_document(&library.id, version.as_deref()) {
            return Ok(LookupOutcome {
                content: entry,
                from_cache: true,
                library_id: library.id,
                version,
            });
        }

        let document_id = match &version {
            Some(v) => format!("{}/{}", library.id.trim_end_matches('/'), v),
            None => library.id.clone(),
        };
        let content = self.fetcher.fetch_document(&document_id).await?;
        self.persist(&library, version.as_deref(), &content);

        Ok(LookupOutcome {
            content,
            from_cache: false,
            library_id: library.id,
            version,
        })
    }

    /// Cached results when fresh, otherwise a remote search whose results are cached.
    async fn search(&self, query: &str) -> Result<Vec<Library>> {
        let cache = self.cache.filter(|_| !self.options.no_cache);

        if let Some(cache) = cache {
            match cache.cached_search_results::<Vec<Library>>(query, self.search_ttl) {
                Ok(results) => {
                    tracing::debug!(query, count = results.len(), "using cached search results");
                    return Ok(results);
                }
                Err(err) if err.is_cache_miss() => {
                    tracing::debug!(query, reason = %err, "search cache miss");
                }
                Err(err) => {
                    tracing::warn!(query, error = %err, "ignoring unreadable search cache");
                }
            }
        }

        let results = self.fetcher.search(query).await?;
        if let Some(cache) = cache {
            if let Err(err) = cache.cache_search_results(query, &results) {
                tracing::warn!(query, error = %err, "failed to cache search results");
            }
        }
        Ok(results)
    }

    fn choose_library(&mut self, query: &str, candidates: &[Library]) -> Result<Library> {
        let first = candidates
            .first()
            .ok_or_else(|| Ctx7Error::NoResults(query.to_string()))?;

        if !self.options.interactive || candidates.len() == 1 {
            return Ok(first.clone());
        }

        let id = self.presenter.choose_library(candidates)?;
        candidates
            .iter()
            .find(|lib| lib.id == id)
            .cloned()
            .ok_or_else(|| Ctx7Error::Other(format!("selected unknown library {}", id)))
    }

    fn choose_version(&mut self, library: &Library) -> Result<Option<String>> {
        if !self.options.show_versions {
            return Ok(None);
        }

        let versions = if library.versions.is_empty() {
            vec![DEFAULT_VERSION.to_string()]
        } else {
            library.versions.clone()
        };

        let chosen = self.presenter.choose_version(&versions)?;
        Ok(Some(chosen).filter(|v| v != DEFAULT_VERSION && !v.is_empty()))
    }

    fn cached_document(&self, library_id: &str, version: Option<&str>) -> Option<String> {
        let cache = self.cache.filter(|_| !self.options.no_cache)?;

        match cache.get_version(library_id, version, self.doc_ttl) {
            Ok(entry) => {
                tracing::info!(library = library_id, version, "serving from cache");
                Some(entry.content)
            }
            Err(err) if err.is_cache_miss() => {
                tracing::debug!(library = library_id, version, reason = %err, "document cache miss");
                None
            }
            Err(err) => {
                tracing::warn!(library = library_id, error = %err, "cache read failed");
                None
            }
        }
    }

    /// Store a fetched document. Failures are logged; the lookup still succeeds.
    fn persist(&self, library: &Library, version: Option<&str>, content: &str) {
        let Some(cache) = self.cache.filter(|_| !self.options.no_cache) else {
            return;
        };

        let metadata = metadata_for(library, version);
        if let Err(err) = cache.set_version(&library.id, version, content, &metadata) {
            tracing::warn!(library = %library.id, error = %err, "failed to cache document");
        }
    }
}

/// Metadata record for a document fetched now.
fn metadata_for(library: &Library, version: Option<&str>) -> Metadata {
    Metadata {
        library_id: library.id.clone(),
        title: library.title.clone(),
        version: version.unwrap_or_default().to_string(),
        fetched_at: Utc::now(),
        last_update_date: library.last_update_date.clone(),
        total_tokens: library.total_tokens,
        total_snippets: library.total_snippets,
        stars: library.stars,
        trust_score: library.trust_score,
        versions: library.versions.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeFetcher {
        libraries: Vec<Library>,
        documents: HashMap<String, String>,
        searches: Cell<usize>,
        fetched: RefCell<Vec<String>>,
    }

    impl Fetcher for FakeFetcher {
        async fn search(&self, _query: &str) -> Result<Vec<Library>> {
            self.searches.set(self.searches.get() + 1);
            Ok(self.libraries.clone())
        }

        async fn fetch_document(&self, library_id: &str) -> Result<String> {
            self.fetched.borrow_mut().push(library_id.to_string());
            self.documents
                .get(library_id)
                .cloned()
                .ok_or_else(|| Ctx7Error::NotFound(library_id.to_string()))
        }
    }

    #[derive(Default)]
    struct FakePresenter {
        library_pick: usize,
        version_pick: usize,
        library_prompts: usize,
        version_prompts: usize,
        cancel: bool,
    }

    impl Presenter for FakePresenter {
        fn choose_library(&mut self, candidates: &[Library]) -> Result<String> {
            self.library_prompts += 1;
            if self.cancel {
                return Err(Ctx7Error::Cancelled);
            }
            Ok(candidates[self.library_pick].id.clone())
        }

        fn choose_version(&mut self, versions: &[String]) -> Result<String> {
            self.version_prompts += 1;
            Ok(versions[self.version_pick].clone())
        }
    }

    fn library(id: &str, versions: &[&str]) -> Library {
        Library {
            id: id.to_string(),
            title: id.rsplit('/').next().unwrap_or_default().to_string(),
            total_tokens: 1000,
            versions: versions.iter().map(|v| v.to_string()).collect(),
            ..Library::default()
        }
    }

    fn fetcher() -> FakeFetcher {
        FakeFetcher {
            libraries: vec![
                library("/remix-run/react-router", &["v7.1.0", "v6.28.0"]),
                library("/facebook/react", &[]),
            ],
            documents: HashMap::from([
                ("/remix-run/react-router".to_string(), "router docs".to_string()),
                ("/remix-run/react-router/v6.28.0".to_string(), "router v6 docs".to_string()),
                ("/facebook/react".to_string(), "react docs".to_string()),
            ]),
            ..FakeFetcher::default()
        }
    }

    fn setup() -> (TempDir, Config, Cache) {
        let temp_dir = TempDir::new().unwrap();
        let config = Config {
            cache_dir: temp_dir.path().to_path_buf(),
            doc_ttl: crate::config::DEFAULT_DOC_TTL,
            search_ttl: crate::config::DEFAULT_SEARCH_TTL,
            base_url: "http://localhost".to_string(),
        };
        let cache = Cache::new(temp_dir.path()).unwrap();
        (temp_dir, config, cache)
    }

    #[tokio::test]
    async fn test_first_result_fetched_then_served_from_cache() {
        let (_temp_dir, config, cache) = setup();
        let fetcher = fetcher();
        let mut presenter = FakePresenter::default();

        let first = Lookup::new(&config, Some(&cache), &fetcher, &mut presenter, LookupOptions::default())
            .run("react router")
            .await
            .unwrap();
        assert_eq!(first.content, "router docs");
        assert!(!first.from_cache);
        assert_eq!(first.library_id, "/remix-run/react-router");
        assert_eq!(first.version, None);

        let second = Lookup::new(&config, Some(&cache), &fetcher, &mut presenter, LookupOptions::default())
            .run("react router")
            .await
            .unwrap();
        assert_eq!(second.content, "router docs");
        assert!(second.from_cache);

        assert_eq!(fetcher.searches.get(), 1);
        assert_eq!(fetcher.fetched.borrow().len(), 1);
        assert_eq!(presenter.library_prompts, 0);

        let entry = cache.get("/remix-run/react-router", config.doc_ttl).unwrap();
        assert_eq!(entry.metadata.title, "react-router");
        assert_eq!(entry.metadata.versions, ["v7.1.0", "v6.28.0"]);
    }

    #[tokio::test]
    async fn test_interactive_asks_presenter() {
        let (_temp_dir, config, cache) = setup();
        let fetcher = fetcher();
        let mut presenter = FakePresenter {
            library_pick: 1,
            ..FakePresenter::default()
        };
        let options = LookupOptions {
            interactive: true,
            ..LookupOptions::default()
        };

        let outcome = Lookup::new(&config, Some(&cache), &fetcher, &mut presenter, options)
            .run("react")
            .await
            .unwrap();

        assert_eq!(outcome.library_id, "/facebook/react");
        assert_eq!(outcome.content, "react docs");
        assert_eq!(presenter.library_prompts, 1);
    }

    #[tokio::test]
    async fn test_interactive_single_result_skips_presenter() {
        let (_temp_dir, config, cache) = setup();
        let mut fetcher = fetcher();
        fetcher.libraries.truncate(1);
        let mut presenter = FakePresenter::default();
        let options = LookupOptions {
            interactive: true,
            ..LookupOptions::default()
        };

        Lookup::new(&config, Some(&cache), &fetcher, &mut presenter, options)
            .run("react router")
            .await
            .unwrap();

        assert_eq!(presenter.library_prompts, 0);
    }

    #[tokio::test]
    async fn test_version_selection_fetches_versioned_document() {
        let (_temp_dir, config, cache) = setup();
        let fetcher = fetcher();
        let mut presenter = FakePresenter {
            version_pick: 1,
            ..FakePresenter::default()
        };
        let options = LookupOptions {
            show_versions: true,
            ..LookupOptions::default()
        };

        let outcome = Lookup::new(&config, Some(&cache), &fetcher, &mut presenter, options)
            .run("react router")
            .await
            .unwrap();

        assert_eq!(outcome.version.as_deref(), Some("v6.28.0"));
        assert_eq!(outcome.content, "router v6 docs");
        assert_eq!(*fetcher.fetched.borrow(), ["/remix-run/react-router/v6.28.0"]);

        let entry = cache
            .get_version("/remix-run/react-router", Some("v6.28.0"), config.doc_ttl)
            .unwrap();
        assert_eq!(entry.metadata.version, "v6.28.0");
    }

    #[tokio::test]
    async fn test_unversioned_library_offers_default() {
        let (_temp_dir, config, cache) = setup();
        let mut fetcher = fetcher();
        fetcher.libraries.remove(0);
        let mut presenter = FakePresenter::default();
        let options = LookupOptions {
            show_versions: true,
            ..LookupOptions::default()
        };

        let outcome = Lookup::new(&config, Some(&cache), &fetcher, &mut presenter, options)
            .run("react")
            .await
            .unwrap();

        assert_eq!(presenter.version_prompts, 1);
        assert_eq!(outcome.version, None);
        assert_eq!(*fetcher.fetched.borrow(), ["/facebook/react"]);
    }

    #[tokio::test]
    async fn test_no_cache_bypasses_reads_and_writes() {
        let (temp_dir, config, cache) = setup();
        let fetcher = fetcher();
        let mut presenter = FakePresenter::default();
        let options = LookupOptions {
            no_cache: true,
            ..LookupOptions::default()
        };

        for _ in 0..2 {
            let outcome = Lookup::new(&config, Some(&cache), &fetcher, &mut presenter, options)
                .run("react router")
                .await
                .unwrap();
            assert!(!outcome.from_cache);
        }

        assert_eq!(fetcher.searches.get(), 2);
        assert_eq!(fetcher.fetched.borrow().len(), 2);
        assert!(cache.list_all().unwrap().is_empty());
        assert_eq!(std::fs::read_dir(temp_dir.path().join("searches")).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_without_cache_still_fetches() {
        let (_temp_dir, config, _cache) = setup();
        let fetcher = fetcher();
        let mut presenter = FakePresenter::default();

        let outcome = Lookup::new(&config, None, &fetcher, &mut presenter, LookupOptions::default())
            .run("react router")
            .await
            .unwrap();

        assert_eq!(outcome.content, "router docs");
        assert!(!outcome.from_cache);
    }

    #[tokio::test]
    async fn test_no_results() {
        let (_temp_dir, config, cache) = setup();
        let fetcher = FakeFetcher::default();
        let mut presenter = FakePresenter::default();

        let err = Lookup::new(&config, Some(&cache), &fetcher, &mut presenter, LookupOptions::default())
            .run("nothing")
            .await
            .unwrap_err();

        assert!(matches!(err, Ctx7Error::NoResults(q) if q == "nothing"));
    }

    #[tokio::test]
    async fn test_cancelled_selection_propagates() {
        let (_temp_dir, config, cache) = setup();
        let fetcher = fetcher();
        let mut presenter = FakePresenter {
            cancel: true,
            ..FakePresenter::default()
        };
        let options = LookupOptions {
            interactive: true,
            ..LookupOptions::default()
        };

        let err = Lookup::new(&config, Some(&cache), &fetcher, &mut presenter, options)
            .run("react")
            .await
            .unwrap_err();

        assert!(matches!(err, Ctx7Error::Cancelled));
        assert!(fetcher.fetched.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_error_propagates_and_caches_nothing() {
        let (_temp_dir, config, cache) = setup();
        let mut fetcher = fetcher();
        fetcher.documents.clear();
        let mut presenter = FakePresenter::default();

        let err = Lookup::new(&config, Some(&cache), &fetcher, &mut presenter, LookupOptions::default())
            .run("react router")
            .await
            .unwrap_err();

        assert!(matches!(err, Ctx7Error::NotFound(_)));
        assert!(cache.list_all().unwrap().is_empty());
    }
}
