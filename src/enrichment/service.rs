//! Online search service - fans a query out to providers and ranks the results
//!
//! 1. Dispatch to every provider (or one named provider) concurrently, each
//!    bounded by its own timeout
//! 2. Score every candidate against the query
//! 3. Sort by score, deduplicate by canonical title/artist/album
//! 4. Fill gaps from and write to the cache, if any, then return the top K
//!
//! A provider that fails or times out contributes nothing; it never stops
//! the others from being collected.

use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::cache::OnlineCache;
use super::domain::{EmptyReason, OnlineCandidate, PluginInfo, ProviderError, SearchOutcome, SearchQuery};
use super::registry::PluginManager;
use super::traits::MetadataProvider;
use crate::config::ProviderConfig;
use crate::error::Result;
use crate::text::{canonical_key, composite_score, normalize_artist, normalize_title};

/// Settings for the aggregator
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Per-provider timeout
    pub timeout: Duration,
    /// Maximum number of candidates returned
    pub top_k: usize,
    /// Provider whose candidates receive the authority boost
    pub authoritative: String,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self::from(&ProviderConfig::default())
    }
}

impl From<&ProviderConfig> for AggregatorConfig {
    fn from(config: &ProviderConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
            top_k: config.top_k.max(1),
            authoritative: config.authoritative.clone(),
        }
    }
}

/// Multi-provider search
#[derive(Debug, Clone)]
pub struct Aggregator {
    plugins: PluginManager,
    config: AggregatorConfig,
    cache: Option<OnlineCache>,
}

impl Aggregator {
    pub fn new(plugins: PluginManager, config: AggregatorConfig) -> Self {
        Self {
            plugins,
            config,
            cache: None,
        }
    }

    /// Fill candidate gaps from `cache` and persist every deduplicated
    /// result list to it.
    pub fn with_cache(mut self, cache: OnlineCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn list_plugins(&self) -> Vec<PluginInfo> {
        self.plugins.list_plugins()
    }

    /// Search one named provider, or all of them.
    ///
    /// An unknown plugin name is an error; every other way of finding
    /// nothing is an [`SearchOutcome::Empty`] with its reason.
    pub async fn search(&self, query: &SearchQuery, plugin: Option<&str>) -> Result<SearchOutcome> {
        let providers = match plugin {
            Some(name) => vec![self.plugins.get(name)?],
            None => self.plugins.all().to_vec(),
        };
        if providers.is_empty() {
            return Ok(SearchOutcome::Empty(EmptyReason::NoProviders));
        }

        let (candidates, answered) = self.collect(&providers, query).await;
        if answered == 0 {
            tracing::warn!(target: "enrichment", title = %query.title, "Every provider failed");
            return Ok(SearchOutcome::Empty(EmptyReason::AllProvidersFailed));
        }

        let ranked = self.rank(candidates, query);
        if ranked.is_empty() {
            return Ok(SearchOutcome::Empty(EmptyReason::NoMatches));
        }

        let mut ranked = ranked;
        if let Some(cache) = &self.cache {
            match cache.fill_gaps(&mut ranked).await {
                Ok(hits) => tracing::debug!(target: "enrichment", hits, "Filled candidates from cache"),
                Err(e) => tracing::warn!(target: "enrichment", error = %e, "Failed to read cached candidates"),
            }
            if let Err(e) = cache.store(&ranked).await {
                tracing::warn!(target: "enrichment", error = %e, "Failed to cache candidates");
            }
        }

        ranked.truncate(self.config.top_k);
        tracing::info!(
            target: "enrichment",
            title = %query.title,
            artist = %query.artist,
            providers = providers.len(),
            answered,
            results = ranked.len(),
            "Online search finished"
        );
        Ok(SearchOutcome::Found(ranked))
    }

    /// Ask providers in registration order for lyrics; first hit wins.
    pub async fn search_lyrics(
        &self,
        title: &str,
        artist: &str,
        plugin: Option<&str>,
    ) -> Result<Option<OnlineCandidate>> {
        let providers = match plugin {
            Some(name) => vec![self.plugins.get(name)?],
            None => self.plugins.all().to_vec(),
        };
        for provider in providers {
            match self.bounded(provider.search_lyrics(title, artist)).await {
                Ok(Some(found)) => return Ok(Some(found)),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(target: "enrichment", provider = provider.name(), error = %e, "Lyrics lookup failed")
                }
            }
        }
        Ok(None)
    }

    /// Run every provider concurrently. Returns the flattened candidates in
    /// registration order and how many providers answered.
    async fn collect(
        &self,
        providers: &[Arc<dyn MetadataProvider>],
        query: &SearchQuery,
    ) -> (Vec<OnlineCandidate>, usize) {
        let calls = providers.iter().map(|provider| async move {
            let result = self.bounded(provider.search(query)).await;
            (provider.name().to_string(), result)
        });

        let mut candidates = Vec::new();
        let mut answered = 0;
        for (name, result) in join_all(calls).await {
            match result {
                Ok(found) => {
                    answered += 1;
                    tracing::debug!(target: "enrichment", provider = %name, results = found.len(), "Provider answered");
                    candidates.extend(found.into_iter().map(|mut c| {
                        if c.source.is_empty() {
                            c.source = name.clone();
                        }
                        c
                    }));
                }
                Err(e) => {
                    tracing::warn!(target: "enrichment", provider = %name, error = %e, "Provider failed");
                }
            }
        }
        (candidates, answered)
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = std::result::Result<T, ProviderError>>,
    ) -> std::result::Result<T, ProviderError> {
        tokio::time::timeout(self.config.timeout, call)
            .await
            .map_err(|_| ProviderError::Timeout(self.config.timeout.as_secs()))?
    }

    /// Score, sort descending (stable) and deduplicate.
    fn rank(&self, mut candidates: Vec<OnlineCandidate>, query: &SearchQuery) -> Vec<OnlineCandidate> {
        let reference = query.match_fields();
        for candidate in &mut candidates {
            let authoritative = candidate.source == self.config.authoritative;
            candidate.score = composite_score(&candidate.match_fields(), &reference, authoritative);
        }

        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
        dedupe(candidates)
    }
}

/// Identity of a candidate for deduplication.
fn dedupe_key(candidate: &OnlineCandidate) -> (String, String, String) {
    (
        canonical_key(&normalize_title(&candidate.title)),
        canonical_key(&normalize_artist(&candidate.artist)),
        canonical_key(&normalize_title(candidate.album.as_deref().unwrap_or_default())),
    )
}

/// Keep the first (highest scoring) candidate per key, filling its gaps
/// from the ones dropped.
fn dedupe(sorted: Vec<OnlineCandidate>) -> Vec<OnlineCandidate> {
    let mut kept: Vec<OnlineCandidate> = Vec::with_capacity(sorted.len());
    let mut seen: HashMap<(String, String, String), usize> = HashMap::new();

    for candidate in sorted {
        let key = dedupe_key(&candidate);
        match seen.get(&key) {
            Some(&index) => kept[index].merge_missing(&candidate),
            None => {
                seen.insert(key, kept.len());
                kept.push(candidate);
            }
        }
    }
    kept
}
