//! Trait definitions for online metadata providers.
//!
//! The aggregator only talks to [`MetadataProvider`], so tests can
//! substitute mock providers for the real network clients.
//!
//! # Example
//!
//! ```ignore
//! use tune_ledger::enrichment::traits::MetadataProvider;
//!
//! async fn first_title(provider: &dyn MetadataProvider, query: &SearchQuery) -> Option<String> {
//!     let results = provider.search(query).await.ok()?;
//!     results.into_iter().next().map(|c| c.title)
//! }
//! ```

use async_trait::async_trait;

use super::domain::{OnlineCandidate, PluginInfo, ProviderError, SearchQuery};

/// A source of online track metadata.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Registry name; also stamped on every candidate as its source.
    fn name(&self) -> &str;

    fn info(&self) -> PluginInfo;

    /// Search for recordings matching the query.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<OnlineCandidate>, ProviderError>;

    /// First search result that carries lyrics.
    async fn search_lyrics(
        &self,
        title: &str,
        artist: &str,
    ) -> Result<Option<OnlineCandidate>, ProviderError> {
        let results = self.search(&SearchQuery::new(title, artist)).await?;
        Ok(results.into_iter().find(|c| c.lyrics.is_some()))
    }
}
