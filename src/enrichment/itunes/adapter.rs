//! Adapter layer: Convert iTunes DTOs to domain models

use super::dto;
use crate::enrichment::domain::OnlineCandidate;
use crate::enrichment::http::{millis_to_secs, year_from_date};
use crate::enrichment::registry::ProviderKind;

/// Artwork edge length requested instead of the 100px thumbnail
const ARTWORK_SIZE: &str = "600x600bb";

/// Convert a search result to an unscored candidate.
///
/// Non-song results and results without an id or name yield `None`.
pub fn to_candidate(result: dto::SearchResult) -> Option<OnlineCandidate> {
    if result.kind.as_deref().is_some_and(|k| k != "song") {
        return None;
    }
    let track_id = result.track_id?;
    let title = result.track_name.filter(|t| !t.trim().is_empty())?;

    Some(OnlineCandidate {
        title,
        artist: result.artist_name.unwrap_or_default(),
        album: result.collection_name,
        source_id: track_id.to_string(),
        album_id: result.collection_id.map(|id| id.to_string()),
        year: result.release_date.as_deref().and_then(year_from_date),
        duration: result.track_time_millis.map(millis_to_secs),
        cover_image: result.artwork_url100.as_deref().map(upscale_artwork),
        source: ProviderKind::Itunes.as_str().to_string(),
        ..Default::default()
    })
}

/// Swap the thumbnail size segment for a larger one.
fn upscale_artwork(url: &str) -> String {
    url.replace("100x100bb", ARTWORK_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_result(kind: &str) -> dto::SearchResult {
        dto::SearchResult {
            wrapper_type: Some("track".to_string()),
            kind: Some(kind.to_string()),
            track_id: Some(42),
            track_name: Some("Song".to_string()),
            artist_name: Some("Band".to_string()),
            collection_id: Some(7),
            collection_name: Some("Record".to_string()),
            release_date: Some("1999-05-01T07:00:00Z".to_string()),
            track_time_millis: Some(181_600),
            artwork_url100: Some("https://img/100x100bb.jpg".to_string()),
            primary_genre_name: None,
        }
    }

    #[test]
    fn test_convert_song() {
        let candidate = to_candidate(make_result("song")).unwrap();
        assert_eq!(candidate.source_id, "42");
        assert_eq!(candidate.album_id.as_deref(), Some("7"));
        assert_eq!(candidate.year, Some(1999));
        assert_eq!(candidate.duration, Some(182));
        assert_eq!(candidate.cover_image.as_deref(), Some("https://img/600x600bb.jpg"));
        assert_eq!(candidate.source, "itunes");
    }

    #[test]
    fn test_skips_non_songs() {
        assert!(to_candidate(make_result("music-video")).is_none());
        let mut no_id = make_result("song");
        no_id.track_id = None;
        assert!(to_candidate(no_id).is_none());
    }
}
