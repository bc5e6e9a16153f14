//! Internal domain models for online metadata search.
//!
//! These types are OUR types - they don't change when external APIs change.
//! All provider responses get converted into these types via adapters.

use serde::{Deserialize, Serialize};

use crate::text::MatchFields;

/// One metadata match returned by a provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OnlineCandidate {
    pub title: String,
    pub artist: String,
    /// Other spellings of the artist name the provider knows about
    pub artist_aliases: Vec<String>,
    pub album: Option<String>,
    /// Provider's id for the recording or lyric record
    pub source_id: String,
    /// Provider's id for the album or release
    pub album_id: Option<String>,
    pub year: Option<i32>,
    /// Duration in seconds
    pub duration: Option<u32>,
    /// Cover image URL
    pub cover_image: Option<String>,
    pub lyrics: Option<String>,
    /// Provider name
    pub source: String,
    /// Match confidence; 0 until scored
    pub score: f64,
}

impl OnlineCandidate {
    /// Fill fields this candidate lacks from a discarded duplicate.
    pub fn merge_missing(&mut self, other: &OnlineCandidate) {
        if self.cover_image.is_none() { self.cover_image = other.cover_image.clone(); }
        if self.lyrics.is_none() { self.lyrics = other.lyrics.clone(); }
        if self.year.is_none() { self.year = other.year; }
        if self.duration.is_none() { self.duration = other.duration; }
        if self.album_id.is_none() { self.album_id = other.album_id.clone(); }
        if self.album.is_none() { self.album = other.album.clone(); }
        for alias in &other.artist_aliases {
            if !self.artist_aliases.contains(alias) {
                self.artist_aliases.push(alias.clone());
            }
        }
    }

    pub(crate) fn match_fields(&self) -> MatchFields<'_> {
        MatchFields {
            title: &self.title,
            artist: &self.artist,
            duration: self.duration,
            year: self.year,
        }
    }
}

/// What the caller is looking for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub title: String,
    pub artist: String,
    /// Duration in seconds
    pub duration: Option<u32>,
    pub year: Option<i32>,
}

impl SearchQuery {
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            ..Default::default()
        }
    }

    pub(crate) fn match_fields(&self) -> MatchFields<'_> {
        MatchFields {
            title: &self.title,
            artist: &self.artist,
            duration: self.duration,
            year: self.year,
        }
    }
}

/// Name and version of a registered provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginInfo {
    pub name: String,
    pub description: String,
    pub version: String,
}

/// Why a search produced nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EmptyReason {
    /// No provider is enabled
    NoProviders,
    /// Every provider failed or timed out
    AllProvidersFailed,
    /// At least one provider answered, with no results
    NoMatches,
}

/// Result of an online search.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Found(Vec<OnlineCandidate>),
    Empty(EmptyReason),
}

impl SearchOutcome {
    pub fn candidates(&self) -> &[OnlineCandidate] {
        match self {
            SearchOutcome::Found(candidates) => candidates,
            SearchOutcome::Empty(_) => &[],
        }
    }
}

/// Errors a provider call can produce
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("API request failed: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Rate limited - try again later")]
    RateLimited,

    #[error("Timed out after {0}s")]
    Timeout(u64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_missing() {
        let mut kept = OnlineCandidate {
            title: "Song".to_string(),
            lyrics: Some("la la".to_string()),
            artist_aliases: vec!["A".to_string()],
            ..Default::default()
        };

        let dropped = OnlineCandidate {
            title: "Other Title".to_string(),       // Should NOT override
            lyrics: Some("other".to_string()),      // Should NOT override
            cover_image: Some("http://c".to_string()), // Should fill in
            year: Some(1999),                       // Should fill in
            artist_aliases: vec!["A".to_string(), "B".to_string()],
            ..Default::default()
        };

        kept.merge_missing(&dropped);

        assert_eq!(kept.title, "Song");
        assert_eq!(kept.lyrics.as_deref(), Some("la la"));
        assert_eq!(kept.cover_image.as_deref(), Some("http://c"));
        assert_eq!(kept.year, Some(1999));
        assert_eq!(kept.artist_aliases, vec!["A", "B"]);
    }

    #[test]
    fn test_outcome_candidates() {
        assert!(SearchOutcome::Empty(EmptyReason::NoMatches).candidates().is_empty());
        let found = SearchOutcome::Found(vec![OnlineCandidate::default()]);
        assert_eq!(found.candidates().len(), 1);
    }
}
