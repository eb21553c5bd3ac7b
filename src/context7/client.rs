// Context7 HTTP client.
// Handles request construction, status mapping, and response decoding.

use std::time::Duration;

use reqwest::{
    Client, Response, StatusCode,
    header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT},
};

use crate::error::{Ctx7Error, Result};

use super::Fetcher;
use super::types::{Library, SearchResponse};

pub const DEFAULT_BASE_URL: &str = "https://context7.com";
const SEARCH_PATH: &str = "/api/v2/libs/search";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Context7 API client.
pub struct Context7Client {
    client: Client,
    base_url: String,
}

impl Context7Client {
    /// Create a client for the given service root.
    pub fn new(base_url: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain"));
        headers.insert(USER_AGENT, HeaderValue::from_static("ctx7"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(Ctx7Error::Api)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// URL of the llms.txt document for a library (or `library/version`).
    fn document_url(&self, library_id: &str) -> String {
        format!(
            "{}/{}/llms.txt",
            self.base_url,
            library_id.trim_matches('/')
        )
    }

    /// Check response status and convert errors.
    async fn check_response(response: Response) -> Result<Response> {
        match response.status() {
            StatusCode::OK => Ok(response),
            StatusCode::NOT_FOUND => Err(Ctx7Error::NotFound(response.url().to_string())),
            status => Err(Ctx7Error::Http {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            }),
        }
    }
}

impl Fetcher for Context7Client {
    async fn search(&self, query: &str) -> Result<Vec<Library>> {
        let url = format!("{}{}", self.base_url, SEARCH_PATH);
        tracing::debug!(%url, query, "searching libraries");

        let response = self.client.get(&url).query(&[("query", query)]).send().await?;
        let wrapper: SearchResponse = Self::check_response(response).await?.json().await?;
        Ok(wrapper.results)
    }

    async fn fetch_document(&self, library_id: &str) -> Result<String> {
        let url = self.document_url(library_id);
        tracing::info!(%url, "fetching documentation");

        let response = self.client.get(&url).send().await?;
        let content = Self::check_response(response).await?.text().await?;
        Ok(content)
    }
}
