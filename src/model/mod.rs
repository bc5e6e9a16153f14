//! Core data models for the music library.
//!
//! Defines the primary entities: [`Track`], [`Artist`], and [`Album`].
//! These are the shapes handed to callers; the database row types in
//! [`crate::db`] convert into them.
//!
//! # Ownership
//!
//! - Tracks are created, updated and deleted by the scanner only.
//! - Artists and albums are created, and their counts mutated, by the
//!   entity index only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Display name used when a file carries no artist at all.
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Ordered artist names; most tracks have one or two.
pub type ArtistNames = SmallVec<[String; 2]>;

/// Ordered artist entity ids, parallel to [`ArtistNames`].
pub type ArtistIds = SmallVec<[i64; 2]>;

/// A track (audio file) in the music library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    /// Database ID (auto-generated)
    pub id: i64,
    /// Absolute file path (unique identifier)
    pub path: String,
    /// Normalized title
    pub title: String,
    /// Artist field as tagged, for display
    pub artist: String,
    /// Individual artist names split from the artist field
    pub artists: ArtistNames,
    /// Resolved artist entity ids, in the same order as `artists`
    pub artist_ids: ArtistIds,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub genre: Option<String>,
    pub year: Option<i32>,
    pub track_number: Option<u32>,
    pub disc_number: Option<u32>,
    /// Duration in seconds
    pub duration: u32,
    /// Bitrate in kbps
    pub bitrate: Option<u32>,
    /// Sample rate in Hz
    pub sample_rate: Option<u32>,
    pub channels: Option<u8>,
    /// File size in bytes
    pub size: u64,
    pub favorite: bool,
    pub play_count: u32,
    pub last_played: Option<DateTime<Utc>>,
    /// Embedded cover image bytes (not serialized; see `has_cover`)
    #[serde(skip)]
    pub cover_image: Option<Vec<u8>>,
    pub lyrics: Option<String>,
    pub album_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Track {
    /// Whether the file carried embedded cover art.
    pub fn has_cover(&self) -> bool {
        self.cover_image.as_ref().is_some_and(|c| !c.is_empty())
    }
}

/// An artist, unique by the canonical key of its name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artist {
    pub id: i64,
    /// Display name, as first seen
    pub name: String,
    pub track_count: u32,
    pub album_count: u32,
    pub photo: Option<String>,
    pub bio: Option<String>,
    pub country: Option<String>,
    pub genre: Option<String>,
    pub website: Option<String>,
    pub social_media: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An album, unique by (canonical title key, primary artist).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    pub id: i64,
    pub title: String,
    /// First artist of the track that created the album
    pub primary_artist: String,
    pub artists: ArtistNames,
    pub artist_ids: ArtistIds,
    pub track_count: u32,
    pub year: Option<i32>,
    #[serde(skip)]
    pub cover_image: Option<Vec<u8>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_track() -> Track {
        let now = Utc::now();
        Track {
            id: 1,
            path: "/music/song.mp3".to_string(),
            title: "Song".to_string(),
            artist: "A & B".to_string(),
            artists: ArtistNames::from_vec(vec!["A".to_string(), "B".to_string()]),
            artist_ids: ArtistIds::from_slice(&[1, 2]),
            album: None,
            album_artist: None,
            genre: None,
            year: Some(2001),
            track_number: Some(3),
            disc_number: None,
            duration: 200,
            bitrate: Some(320),
            sample_rate: Some(44100),
            channels: Some(2),
            size: 1024,
            favorite: false,
            play_count: 0,
            last_played: None,
            cover_image: Some(vec![1, 2, 3]),
            lyrics: None,
            album_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_track_serializes_camel_case_without_cover_bytes() {
        let json = serde_json::to_value(sample_track()).unwrap();
        assert_eq!(json["artistIds"], serde_json::json!([1, 2]));
        assert_eq!(json["playCount"], 0);
        assert!(json.get("coverImage").is_none());
    }

    #[test]
    fn test_has_cover() {
        let mut track = sample_track();
        assert!(track.has_cover());
        track.cover_image = Some(Vec::new());
        assert!(!track.has_cover());
    }
}
