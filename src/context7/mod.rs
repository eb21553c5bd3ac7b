// Context7 API module.
// Provides the fetcher abstraction and the HTTP client behind it.

pub mod client;
pub mod types;

use std::future::Future;

use crate::error::Result;

pub use client::Context7Client;
pub use types::Library;

/// Source of search results and documents.
pub trait Fetcher {
    /// Search for libraries matching `query`.
    fn search(&self, query: &str) -> impl Future<Output = Result<Vec<Library>>>;

    /// Fetch the document for `library_id`, optionally suffixed with `/<version>`.
    fn fetch_document(&self, library_id: &str) -> impl Future<Output = Result<String>>;
}
