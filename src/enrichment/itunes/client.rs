//! iTunes Search HTTP client

use async_trait::async_trait;
use std::time::Duration;

use super::{adapter, dto};
use crate::enrichment::domain::{OnlineCandidate, PluginInfo, ProviderError, SearchQuery};
use crate::enrichment::http::{self, USER_AGENT};
use crate::enrichment::registry::ProviderKind;
use crate::enrichment::traits::MetadataProvider;

/// Results requested per search
const SEARCH_LIMIT: u32 = 10;

/// iTunes Search API client
pub struct ItunesClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl ItunesClient {
    /// Create a new client
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        Self::with_base_url("https://itunes.apple.com", timeout)
    }

    /// Create a client against a custom base URL
    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            http_client: http::build_client(USER_AGENT, timeout)?,
            base_url: base_url.into(),
        })
    }

    fn search_url(&self, query: &SearchQuery) -> String {
        let term = format!("{} {}", query.title.trim(), query.artist.trim());
        format!(
            "{}/search?term={}&media=music&entity=song&limit={SEARCH_LIMIT}",
            self.base_url,
            urlencoding::encode(term.trim())
        )
    }
}

#[async_trait]
impl MetadataProvider for ItunesClient {
    fn name(&self) -> &str {
        ProviderKind::Itunes.as_str()
    }

    fn info(&self) -> PluginInfo {
        ProviderKind::Itunes.info()
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<OnlineCandidate>, ProviderError> {
        let url = self.search_url(query);
        tracing::debug!(target: "enrichment::itunes", url = %url, "Searching");
        let response: dto::SearchResponse = http::get_json(&self.http_client, &url).await?;
        Ok(response.results.into_iter().filter_map(adapter::to_candidate).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_url() {
        let client = ItunesClient::with_base_url("http://localhost:8080", Duration::from_secs(1)).unwrap();
        let url = client.search_url(&SearchQuery::new("Hotel California", "Eagles"));
        assert_eq!(
            url,
            "http://localhost:8080/search?term=Hotel%20California%20Eagles&media=music&entity=song&limit=10"
        );
    }

    #[test]
    fn test_client_name() {
        let client = ItunesClient::new(Duration::from_secs(8)).unwrap();
        assert_eq!(client.name(), "itunes");
        assert_eq!(client.info().name, "itunes");
    }
}
