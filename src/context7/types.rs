// Context7 API response types.
// Defines structs for deserializing library search results.

use serde::{Deserialize, Serialize};

use crate::cache::null_as_default;

/// A library returned by the search endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Library {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub branch: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_update_date: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default)]
    pub total_snippets: u64,
    #[serde(default)]
    pub stars: u64,
    #[serde(default)]
    pub trust_score: f64,
    #[serde(default)]
    pub benchmark_score: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub versions: Vec<String>,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub vip: bool,
}

impl Library {
    /// Organization segment of the ID (`/org/name` -> `org`).
    pub fn organization(&self) -> &str {
        self.id
            .trim_start_matches('/')
            .split('/')
            .next()
            .unwrap_or_default()
    }
}

/// Response wrapper for the search endpoint.
#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    pub results: Vec<Library>,
}
