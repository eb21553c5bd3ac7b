// Runtime configuration.
// Resolves the cache location, freshness windows, and service root once at startup.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::paths;
use crate::context7::client::DEFAULT_BASE_URL;
use crate::error::{Ctx7Error, Result};

pub const CACHE_DIR_ENV: &str = "CTX7_CACHE_DIR";
pub const BASE_URL_ENV: &str = "CTX7_BASE_URL";

/// Cached documents are served for a day.
pub const DEFAULT_DOC_TTL: Duration = Duration::from_secs(24 * 60 * 60);
/// Cached search results are served for an hour.
pub const DEFAULT_SEARCH_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone)]
pub struct Config {
    pub cache_dir: PathBuf,
    pub doc_ttl: Duration,
    pub search_ttl: Duration,
    pub base_url: String,
}

impl Config {
    /// Resolve configuration from an explicit cache directory (the `--cache-dir`
    /// flag, which clap already falls back to `CTX7_CACHE_DIR` for) and the
    /// process environment.
    pub fn resolve(cache_dir: Option<PathBuf>) -> Result<Self> {
        Self::resolve_with(cache_dir, |key| env::var(key).ok())
    }

    fn resolve_with(
        cache_dir: Option<PathBuf>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let cache_dir = match cache_dir {
            Some(dir) => dir,
            None => match lookup(CACHE_DIR_ENV).filter(|v| !v.is_empty()) {
                Some(dir) => PathBuf::from(dir),
                None => paths::default_cache_dir().ok_or_else(|| {
                    Ctx7Error::Other("could not determine a cache directory".to_string())
                })?,
            },
        };

        let base_url = lookup(BASE_URL_ENV)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(Self {
            cache_dir,
            doc_ttl: DEFAULT_DOC_TTL,
            search_ttl: DEFAULT_SEARCH_TTL,
            base_url,
        })
    }
}
