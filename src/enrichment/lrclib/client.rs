//! LRCLIB HTTP client
//!
//! See: https://lrclib.net/docs

use async_trait::async_trait;
use std::time::Duration;

use super::{adapter, dto};
use crate::enrichment::domain::{OnlineCandidate, PluginInfo, ProviderError, SearchQuery};
use crate::enrichment::http::{self, USER_AGENT};
use crate::enrichment::registry::ProviderKind;
use crate::enrichment::traits::MetadataProvider;

/// LRCLIB API client
pub struct LrclibClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl LrclibClient {
    /// Create a new client
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        Self::with_base_url("https://lrclib.net/api", timeout)
    }

    /// Create a client against a custom base URL
    pub fn with_base_url(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            http_client: http::build_client(USER_AGENT, timeout)?,
            base_url: base_url.into(),
        })
    }

    fn search_url(&self, query: &SearchQuery) -> String {
        let mut url = format!(
            "{}/search?track_name={}",
            self.base_url,
            urlencoding::encode(query.title.trim())
        );
        if !query.artist.trim().is_empty() {
            url.push_str("&artist_name=");
            url.push_str(&urlencoding::encode(query.artist.trim()));
        }
        url
    }
}

#[async_trait]
impl MetadataProvider for LrclibClient {
    fn name(&self) -> &str {
        ProviderKind::Lrclib.as_str()
    }

    fn info(&self) -> PluginInfo {
        ProviderKind::Lrclib.info()
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<OnlineCandidate>, ProviderError> {
        let url = self.search_url(query);
        tracing::debug!(target: "enrichment::lrclib", url = %url, "Searching");
        let records: Vec<dto::LyricRecord> = http::get_json(&self.http_client, &url).await?;
        Ok(records.into_iter().filter_map(adapter::to_candidate).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = LrclibClient::new(Duration::from_secs(8)).unwrap();
        assert_eq!(client.base_url, "https://lrclib.net/api");
        assert_eq!(client.name(), "lrclib");
    }

    #[test]
    fn test_search_url_encodes_terms() {
        let client = LrclibClient::with_base_url("http://localhost:8080", Duration::from_secs(1)).unwrap();
        let url = client.search_url(&SearchQuery::new("Hotel California", "Eagles & Co"));
        assert_eq!(
            url,
            "http://localhost:8080/search?track_name=Hotel%20California&artist_name=Eagles%20%26%20Co"
        );

        let url = client.search_url(&SearchQuery::new("晴天", " "));
        assert_eq!(url, "http://localhost:8080/search?track_name=%E6%99%B4%E5%A4%A9");
    }
}
