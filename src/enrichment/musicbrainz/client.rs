//! MusicBrainz HTTP client
//!
//! Handles communication with the MusicBrainz web service.
//! See: https://musicbrainz.org/doc/MusicBrainz_API
//!
//! IMPORTANT: MusicBrainz requires a User-Agent header and rate limits to 1 req/sec.

use async_trait::async_trait;
use std::time::Duration;

use super::{adapter, dto};
use crate::enrichment::domain::{OnlineCandidate, PluginInfo, ProviderError, SearchQuery};
use crate::enrichment::http::{self, USER_AGENT};
use crate::enrichment::registry::ProviderKind;
use crate::enrichment::traits::MetadataProvider;

/// Results requested per search
const SEARCH_LIMIT: u32 = 10;

/// MusicBrainz API client
pub struct MusicBrainzClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl MusicBrainzClient {
    /// Create a new client
    ///
    /// `contact` is appended to the User-Agent, as MusicBrainz asks clients
    /// to identify how they can be reached.
    pub fn new(contact: Option<&str>, timeout: Duration) -> Result<Self, ProviderError> {
        Self::with_base_url("https://musicbrainz.org/ws/2", contact, timeout)
    }

    /// Create a client against a custom base URL
    pub fn with_base_url(
        base_url: impl Into<String>,
        contact: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let user_agent = match contact {
            Some(contact) => format!("{USER_AGENT} ( {contact} )"),
            None => USER_AGENT.to_string(),
        };
        Ok(Self {
            http_client: http::build_client(&user_agent, timeout)?,
            base_url: base_url.into(),
        })
    }

    fn search_url(&self, query: &SearchQuery) -> String {
        format!(
            "{}/recording?query={}&fmt=json&limit={SEARCH_LIMIT}",
            self.base_url,
            urlencoding::encode(&lucene_query(query))
        )
    }
}

/// Lucene query over recording title and artist.
fn lucene_query(query: &SearchQuery) -> String {
    let mut lucene = format!("recording:\"{}\"", escape(query.title.trim()));
    if !query.artist.trim().is_empty() {
        lucene.push_str(&format!(" AND artist:\"{}\"", escape(query.artist.trim())));
    }
    lucene
}

fn escape(term: &str) -> String {
    term.replace('\\', "\\\\").replace('"', "\\\"")
}

#[async_trait]
impl MetadataProvider for MusicBrainzClient {
    fn name(&self) -> &str {
        ProviderKind::MusicBrainz.as_str()
    }

    fn info(&self) -> PluginInfo {
        ProviderKind::MusicBrainz.info()
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<OnlineCandidate>, ProviderError> {
        let url = self.search_url(query);
        tracing::debug!(target: "enrichment::musicbrainz", url = %url, "Searching");
        let response: dto::SearchResponse = http::get_json(&self.http_client, &url).await?;
        Ok(response.recordings.into_iter().map(adapter::to_candidate).collect())
    }
}
