// Query result store: search responses cached by a hash of the normalized query.

use std::fs;
use std::io;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use sha2::{Digest, Sha256};

use crate::error::{Ctx7Error, MissReason, Result};

use super::Cache;
use super::paths;
use super::store;

/// On-disk search record. `timestamp` stays a string so a malformed value
/// surfaces as a decode error rather than a generic JSON failure.
#[derive(Debug, Deserialize)]
struct SearchRecord {
    query: String,
    timestamp: String,
    results: serde_json::Value,
}

#[derive(Serialize)]
struct SearchRecordRef<'a, T: ?Sized> {
    query: &'a str,
    timestamp: String,
    results: &'a T,
}

/// Hex SHA-256 of the trimmed, lowercased query.
pub fn hash_query(query: &str) -> String {
    let normalized = query.trim().to_lowercase();
    hex::encode(Sha256::digest(normalized.as_bytes()))
}

impl Cache {
    /// Cache search results for `query`.
    pub fn cache_search_results<T: Serialize + ?Sized>(&self, query: &str, results: &T) -> Result<()> {
        self.cache_search_results_at(query, results, Utc::now())
    }

    /// Read cached search results for `query` if younger than `max_age`.
    pub fn cached_search_results<T: DeserializeOwned>(
        &self,
        query: &str,
        max_age: Duration,
    ) -> Result<T> {
        self.cached_search_results_at(query, max_age, Utc::now())
    }

    pub(crate) fn cache_search_results_at<T: Serialize + ?Sized>(
        &self,
        query: &str,
        results: &T,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        let dir = paths::searches_dir(self.root());
        store::create_dir_all(&dir)?;

        let record = SearchRecordRef {
            query,
            timestamp: timestamp.to_rfc3339(),
            results,
        };
        store::write_json(&paths::search_path(self.root(), &hash_query(query)), &record)
    }

    pub(crate) fn cached_search_results_at<T: DeserializeOwned>(
        &self,
        query: &str,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> Result<T> {
        let path = paths::search_path(self.root(), &hash_query(query));
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(Ctx7Error::CacheMiss(MissReason::Absent));
            }
            Err(err) => return Err(err.into()),
        };

        let record: SearchRecord = serde_json::from_str(&contents)?;
        let timestamp = DateTime::parse_from_rfc3339(&record.timestamp)
            .map_err(|e| Ctx7Error::Decode(format!("invalid search timestamp: {}", e)))?
            .with_timezone(&Utc);

        let elapsed = now
            .signed_duration_since(timestamp)
            .to_std()
            .unwrap_or(Duration::ZERO);
        if elapsed > max_age {
            tracing::debug!(query = %record.query, "search cache expired");
            return Err(Ctx7Error::CacheMiss(MissReason::Expired));
        }

        Ok(serde_json::from_value(record.results)?)
    }
}
