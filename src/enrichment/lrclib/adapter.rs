//! Adapter layer: Convert LRCLIB DTOs to domain models

use super::dto;
use crate::enrichment::domain::OnlineCandidate;
use crate::enrichment::registry::ProviderKind;

/// Convert a lyric record to an unscored candidate.
///
/// Synced lyrics are preferred over plain ones. Records without a track
/// name yield `None`.
pub fn to_candidate(record: dto::LyricRecord) -> Option<OnlineCandidate> {
    let title = record.track_name.or(record.name).filter(|t| !t.trim().is_empty())?;

    let lyrics = if record.instrumental {
        None
    } else {
        record
            .synced_lyrics
            .filter(|l| !l.trim().is_empty())
            .or(record.plain_lyrics.filter(|l| !l.trim().is_empty()))
    };

    Some(OnlineCandidate {
        title,
        artist: record.artist_name.unwrap_or_default(),
        album: record.album_name.filter(|a| !a.trim().is_empty()),
        source_id: record.id.to_string(),
        duration: record
            .duration
            .filter(|d| d.is_finite() && *d >= 0.0)
            .map(|d| d.round() as u32),
        lyrics,
        source: ProviderKind::Lrclib.as_str().to_string(),
        ..Default::default()
    })
}
