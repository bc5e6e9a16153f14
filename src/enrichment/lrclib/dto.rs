//! LRCLIB API Data Transfer Objects
//!
//! These types match EXACTLY what the LRCLIB API returns.
//! DO NOT use these types outside the lrclib module - convert to domain types.

use serde::{Deserialize, Serialize};

/// One lyric record, as returned by `/api/search` and `/api/get`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LyricRecord {
    pub id: i64,
    /// Some records only carry `name`
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub track_name: Option<String>,
    #[serde(default)]
    pub artist_name: Option<String>,
    #[serde(default)]
    pub album_name: Option<String>,
    /// Duration in seconds (may be fractional)
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub instrumental: bool,
    #[serde(default)]
    pub plain_lyrics: Option<String>,
    /// LRC formatted lyrics with timestamps
    #[serde(default)]
    pub synced_lyrics: Option<String>,
}

// ============================================================================
// CONTRACT TESTS
// These verify our DTOs match what the real API returns.
// ============================================================================

#[cfg(test)]
mod contract_tests {
    use super::*;

    #[test]
    fn test_parse_search_results() {
        let json = r#"[{
            "id": 3396226,
            "name": "I Want to Live",
            "trackName": "I Want to Live",
            "artistName": "Borislav Slavov",
            "albumName": "Baldur's Gate 3 (Original Game Soundtrack)",
            "duration": 233.0,
            "instrumental": false,
            "plainLyrics": "I feel your breath upon my neck",
            "syncedLyrics": "[00:17.12] I feel your breath upon my neck"
        }]"#;

        let records: Vec<LyricRecord> = serde_json::from_str(json).expect("Should parse search results");

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.id, 3396226);
        assert_eq!(record.track_name.as_deref(), Some("I Want to Live"));
        assert_eq!(record.artist_name.as_deref(), Some("Borislav Slavov"));
        assert_eq!(record.duration, Some(233.0));
        assert!(record.synced_lyrics.as_deref().unwrap().starts_with("[00:17.12]"));
    }

    #[test]
    fn test_parse_instrumental_record() {
        let json = r#"{
            "id": 1,
            "trackName": "Interlude",
            "artistName": "Someone",
            "albumName": null,
            "duration": 61,
            "instrumental": true,
            "plainLyrics": null,
            "syncedLyrics": null
        }"#;

        let record: LyricRecord = serde_json::from_str(json).expect("Should parse instrumental");
        assert!(record.instrumental);
        assert!(record.plain_lyrics.is_none());
        assert!(record.album_name.is_none());
    }
}
