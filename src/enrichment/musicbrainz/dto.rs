//! Response shapes of the MusicBrainz `/ws/2/recording` search.
//!
//! Field names follow the JSON (kebab-case) and only the fields the adapter
//! reads are declared; serde ignores the rest. Nothing outside this module
//! sees these types.
//!
//! Reference: https://musicbrainz.org/doc/MusicBrainz_API/Search

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub recordings: Vec<Recording>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Recording {
    pub id: String,
    /// Lucene relevance, 0-100
    pub score: Option<u32>,
    pub title: String,
    /// Milliseconds
    pub length: Option<u64>,
    #[serde(default)]
    pub artist_credit: Vec<ArtistCredit>,
    #[serde(default)]
    pub releases: Vec<Release>,
}

/// One credited artist. Collaborations carry several, glued together by
/// their join phrases.
#[derive(Debug, Clone, Deserialize)]
pub struct ArtistCredit {
    pub artist: Artist,
    /// Credited-as name when it differs from the artist's own name
    pub name: Option<String>,
    pub joinphrase: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Artist {
    pub id: String,
    pub name: String,
    pub sort_name: Option<String>,
    /// Only present when the search includes aliases
    #[serde(default)]
    pub aliases: Vec<Alias>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Alias {
    pub name: String,
    pub locale: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Release {
    pub id: String,
    pub title: String,
    /// "Official", "Promotion", "Bootleg", ...
    pub status: Option<String>,
    /// Partial dates are common: "1975" or "1975-10"
    pub date: Option<String>,
    pub release_group: Option<ReleaseGroup>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ReleaseGroup {
    pub id: String,
    /// "Album", "Single", "EP", ...
    pub primary_type: Option<String>,
}
