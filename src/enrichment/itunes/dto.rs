//! iTunes Search API Data Transfer Objects
//!
//! These types match EXACTLY what the iTunes Search API returns.
//! DO NOT use these types outside the itunes module - convert to domain types.

use serde::{Deserialize, Serialize};

/// Search response envelope
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    #[serde(default)]
    pub result_count: u32,
    #[serde(default)]
    pub results: Vec<SearchResult>,
}

/// One search result; songs have `wrapperType` "track" and `kind` "song"
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub wrapper_type: Option<String>,
    pub kind: Option<String>,
    pub track_id: Option<i64>,
    pub track_name: Option<String>,
    pub artist_name: Option<String>,
    pub collection_id: Option<i64>,
    pub collection_name: Option<String>,
    /// ISO 8601 timestamp
    pub release_date: Option<String>,
    pub track_time_millis: Option<u64>,
    pub artwork_url100: Option<String>,
    pub primary_genre_name: Option<String>,
}

// ============================================================================
// CONTRACT TESTS
// These verify our DTOs match what the real API returns.
// ============================================================================
