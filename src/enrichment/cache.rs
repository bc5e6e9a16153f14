//! Persistent cache of online search results.
//!
//! Candidates are keyed by a SHA-256 hash of their provider name and ids,
//! so the same recording found twice overwrites its earlier row while equal
//! ids from two providers stay apart. A later search fills the gaps in a
//! fresh candidate from its cached row.

use sha2::{Digest, Sha256};
use sqlx::FromRow;
use sqlx::sqlite::SqlitePool;

use super::domain::OnlineCandidate;
use crate::db::repo::{self, Conflict, Record};
use crate::db::{Filter, Table, now_text};

/// Row in the `online_cache` table.
#[derive(Debug, Clone, FromRow)]
pub struct CacheRow {
    pub cache_key: String,
    pub source: String,
    pub source_id: String,
    pub album_id: Option<String>,
    pub title: String,
    pub artist: String,
    /// Candidate as JSON
    pub payload: String,
    pub created_at: String,
}

impl Table for CacheRow {
    const NAME: &'static str = "online_cache";
    const PRIMARY_KEY: &'static str = "cache_key";
    const COLUMNS: &'static [&'static str] = &[
        "cache_key",
        "source",
        "source_id",
        "album_id",
        "title",
        "artist",
        "payload",
        "created_at",
    ];
    const DEFAULT_SORT: &'static str = "created_at";
}

/// Hex SHA-256 of (source, source id, album id).
pub fn cache_key(source: &str, source_id: &str, album_id: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    for part in [source, source_id, album_id.unwrap_or_default()] {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn key_of(candidate: &OnlineCandidate) -> String {
    cache_key(&candidate.source, &candidate.source_id, candidate.album_id.as_deref())
}

/// Handle to the cache table.
#[derive(Debug, Clone)]
pub struct OnlineCache {
    pool: SqlitePool,
}

impl OnlineCache {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Write candidates in one transaction, replacing rows with the same key.
    pub async fn store(&self, candidates: &[OnlineCandidate]) -> crate::Result<u64> {
        let now = now_text();
        let mut records = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let payload = serde_json::to_string(candidate)?;
            records.push(
                Record::new()
                    .set("cache_key", key_of(candidate))
                    .set("source", candidate.source.as_str())
                    .set("source_id", candidate.source_id.as_str())
                    .set("album_id", candidate.album_id.clone())
                    .set("title", candidate.title.as_str())
                    .set("artist", candidate.artist.as_str())
                    .set("payload", payload)
                    .set("created_at", now.as_str()),
            );
        }
        let written = repo::batch_insert::<CacheRow>(&self.pool, &records, Conflict::Replace).await?;
        tracing::debug!(target: "enrichment::cache", written, "Cached candidates");
        Ok(written)
    }

    /// Cached candidate for a provider record, if any.
    pub async fn lookup(
        &self,
        source: &str,
        source_id: &str,
        album_id: Option<&str>,
    ) -> crate::Result<Option<OnlineCandidate>> {
        let row: Option<CacheRow> = sqlx::query_as("SELECT * FROM online_cache WHERE cache_key = ?")
            .bind(cache_key(source, source_id, album_id))
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(serde_json::from_str(&row.payload)?)),
            None => Ok(None),
        }
    }

    /// Fill missing fields of fresh candidates from their cached rows.
    /// Returns how many candidates had a cached row.
    pub async fn fill_gaps(&self, candidates: &mut [OnlineCandidate]) -> crate::Result<usize> {
        let mut hits = 0;
        for candidate in candidates.iter_mut() {
            let cached = self
                .lookup(&candidate.source, &candidate.source_id, candidate.album_id.as_deref())
                .await?;
            if let Some(cached) = cached {
                candidate.merge_missing(&cached);
                hits += 1;
            }
        }
        Ok(hits)
    }

    /// Number of cached rows from one provider.
    pub async fn count_for(&self, source: &str) -> crate::Result<u64> {
        Ok(repo::count::<CacheRow>(&self.pool, &Filter::new().eq("source", source)).await?)
    }
}
