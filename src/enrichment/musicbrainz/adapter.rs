//! MusicBrainz recordings to [`OnlineCandidate`]s.
//!
//! The album, year and cover come from one chosen release: the first
//! official album release, else the first official one, else the first.

use super::dto;
use crate::enrichment::domain::OnlineCandidate;
use crate::enrichment::http::{millis_to_secs, year_from_date};
use crate::enrichment::registry::ProviderKind;

/// Cover Art Archive front image for a release.
pub fn cover_art_url(release_id: &str) -> String {
    format!("https://coverartarchive.org/release/{release_id}/front-500")
}

/// Convert a search result recording to an unscored candidate.
pub fn to_candidate(recording: dto::Recording) -> OnlineCandidate {
    let artist = build_artist_string(&recording.artist_credit).unwrap_or_default();
    let artist_aliases = collect_aliases(&recording.artist_credit, &artist);
    let release = pick_release(&recording.releases);

    OnlineCandidate {
        title: recording.title,
        artist,
        artist_aliases,
        album: release.map(|r| r.title.clone()),
        source_id: recording.id,
        album_id: release.map(|r| r.id.clone()),
        year: release
            .and_then(|r| r.date.as_deref())
            .and_then(year_from_date),
        duration: recording.length.map(millis_to_secs),
        cover_image: release.map(|r| cover_art_url(&r.id)),
        lyrics: None,
        source: ProviderKind::MusicBrainz.as_str().to_string(),
        score: 0.0,
    }
}

/// Credited names joined by their join phrases, as printed on the release.
fn build_artist_string(credits: &[dto::ArtistCredit]) -> Option<String> {
    if credits.is_empty() {
        return None;
    }
    let joined: String = credits
        .iter()
        .flat_map(|credit| {
            let name = credit.name.as_deref().unwrap_or(&credit.artist.name);
            [name, credit.joinphrase.as_deref().unwrap_or_default()]
        })
        .collect();
    Some(joined.trim().to_string())
}

/// Official names and aliases that differ from the credited string.
fn collect_aliases(credits: &[dto::ArtistCredit], credited: &str) -> Vec<String> {
    let mut aliases: Vec<String> = Vec::new();
    let mut push = |name: &str| {
        let name = name.trim();
        if !name.is_empty() && name != credited && !aliases.iter().any(|a| a == name) {
            aliases.push(name.to_string());
        }
    };

    for credit in credits {
        push(&credit.artist.name);
        for alias in &credit.artist.aliases {
            push(&alias.name);
        }
    }
    aliases
}

/// Prefer official album releases, then any official release, then the first.
fn pick_release(releases: &[dto::Release]) -> Option<&dto::Release> {
    releases
        .iter()
        .find(|r| {
            r.status.as_deref() == Some("Official")
                && r.release_group
                    .as_ref()
                    .and_then(|rg| rg.primary_type.as_deref())
                    == Some("Album")
        })
        .or_else(|| {
            releases
                .iter()
                .find(|r| r.status.as_deref() == Some("Official"))
        })
        .or_else(|| releases.first())
}
