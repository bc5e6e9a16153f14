//! Audio file metadata reading and writing.
//!
//! Uses the lofty crate for format-independent metadata access.
//! Supports reading from and writing to MP3, FLAC, OGG, M4A, and WAV files.
//!
//! The scanner only talks to the [`MetadataExtractor`] and [`TagWriter`]
//! traits, so tests can substitute fixed metadata for real audio files.
//! When extraction fails, or a tag lacks a title or artist,
//! [`filename_fallback`] guesses both from the file name.

use lofty::config::WriteOptions;
use lofty::error::ErrorKind;
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::picture::PictureType;
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey, Tag, TagExt};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

/// Tag and stream data read from one file. Every tag field is optional;
/// stream properties default to zero/absent when the container lacks them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
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
    pub sample_rate: Option<u32>,
    pub channels: Option<u8>,
    pub cover_image: Option<Vec<u8>>,
    pub lyrics: Option<String>,
}

/// Why a file's metadata could not be read.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("Cannot open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported format: {path}")]
    Unsupported { path: PathBuf },

    #[error("Corrupt or unreadable tags in {path}: {message}")]
    Corrupt { path: PathBuf, message: String },
}

/// Reads tag data from an audio file.
pub trait MetadataExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<RawMetadata, ExtractionError>;
}

/// [`MetadataExtractor`] backed by lofty.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoftyExtractor;

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl MetadataExtractor for LoftyExtractor {
    fn extract(&self, path: &Path) -> Result<RawMetadata, ExtractionError> {
        let probe = Probe::open(path).map_err(|e| match e.kind() {
            ErrorKind::Io(_) => ExtractionError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::other(e.to_string()),
            },
            _ => ExtractionError::Corrupt {
                path: path.to_path_buf(),
                message: e.to_string(),
            },
        })?;

        let tagged_file = probe.read().map_err(|e| match e.kind() {
            ErrorKind::UnknownFormat => ExtractionError::Unsupported {
                path: path.to_path_buf(),
            },
            _ => ExtractionError::Corrupt {
                path: path.to_path_buf(),
                message: e.to_string(),
            },
        })?;

        let properties = tagged_file.properties();
        let mut meta = RawMetadata {
            duration: u32::try_from(properties.duration().as_secs()).unwrap_or(u32::MAX),
            bitrate: properties.audio_bitrate().or(properties.overall_bitrate()),
            sample_rate: properties.sample_rate(),
            channels: properties.channels(),
            ..Default::default()
        };

        // Get the primary tag, or fall back to the first available tag
        let Some(tag) = tagged_file
            .primary_tag()
            .or_else(|| tagged_file.first_tag())
        else {
            return Ok(meta);
        };

        meta.title = non_empty(tag.title().as_deref());
        meta.artist = non_empty(tag.artist().as_deref());
        meta.album = non_empty(tag.album().as_deref());
        meta.album_artist = non_empty(tag.get_string(&ItemKey::AlbumArtist));
        meta.genre = non_empty(tag.genre().as_deref());
        meta.year = tag.year().and_then(|y| i32::try_from(y).ok()).filter(|y| *y > 0);
        meta.track_number = tag.track();
        meta.disc_number = tag.disk();
        meta.lyrics = non_empty(tag.get_string(&ItemKey::Lyrics));

        // Prefer front cover, fall back to first picture
        let pictures = tag.pictures();
        meta.cover_image = pictures
            .iter()
            .find(|p| p.pic_type() == PictureType::CoverFront)
            .or_else(|| pictures.first())
            .map(|p| p.data().to_vec())
            .filter(|data| !data.is_empty());

        Ok(meta)
    }
}

// ============================================================================
// Filename fallback
// ============================================================================

/// Leading track number in a file stem: "01 - ", "1. ", "03_", or a
/// zero-padded "07 " before a non-digit. Unpadded "99 Luftballons" and
/// "2 Become 1" are names, not track numbers.
static STEM_TRACK_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:\d{1,3}\s*[-–—._)]\s*|0\d\s+)(\D)").unwrap());

/// Separators between artist and title in a file stem, tried in order.
const STEM_SEPARATORS: [&str; 4] = [" - ", " – ", " — ", "_-_"];

/// Artist and title guessed from a file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameGuess {
    pub artist: Option<String>,
    pub title: String,
}

/// Guess artist and title from a path's file stem.
///
/// A leading track number is stripped first. "Artist - Title" style stems
/// split on the first separator; anything else becomes the title as is.
pub fn filename_fallback(path: &Path) -> FilenameGuess {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().trim().to_string())
        .unwrap_or_default();
    let stripped = STEM_TRACK_NUMBER.replace(&stem, "$1").trim().to_string();
    let base = if stripped.is_empty() { stem } else { stripped };

    for separator in STEM_SEPARATORS {
        if let Some((artist, title)) = base.split_once(separator) {
            let (artist, title) = (artist.trim(), title.trim());
            if !artist.is_empty() && !title.is_empty() {
                return FilenameGuess {
                    artist: Some(artist.to_string()),
                    title: title.to_string(),
                };
            }
        }
    }

    FilenameGuess {
        artist: None,
        title: base,
    }
}

// ============================================================================
// Tag writing
// ============================================================================

/// Fields to write into a file's tags. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagFields {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub genre: Option<String>,
    pub year: Option<i32>,
    pub track_number: Option<u32>,
    pub lyrics: Option<String>,
    /// Only write fields that are currently empty in the file
    pub only_fill_empty: bool,
}

impl TagFields {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.artist.is_none()
            && self.album.is_none()
            && self.album_artist.is_none()
            && self.genre.is_none()
            && self.year.is_none()
            && self.track_number.is_none()
            && self.lyrics.is_none()
    }
}

/// Writes tag fields into an audio file.
pub trait TagWriter: Send + Sync {
    /// Returns whether any field changed.
    fn write(&self, path: &Path, fields: &TagFields) -> crate::Result<bool>;
}

/// [`TagWriter`] backed by lofty.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoftyTagWriter;

impl TagWriter for LoftyTagWriter {
    fn write(&self, path: &Path, fields: &TagFields) -> crate::Result<bool> {
        if fields.is_empty() {
            return Ok(false);
        }

        let mut tagged_file = Probe::open(path)
            .and_then(|p| p.read())
            .map_err(|e| crate::Error::tag_write(path, e.to_string()))?;

        // Get the primary tag type for this format, or create one
        let tag_type = tagged_file.primary_tag_type();
        if tagged_file.tag(tag_type).is_none() {
            tagged_file.insert_tag(Tag::new(tag_type));
        }
        let tag = tagged_file
            .tag_mut(tag_type)
            .ok_or_else(|| crate::Error::tag_write(path, "no writable tag for format"))?;

        let changed = apply_fields(tag, fields);
        if changed == 0 {
            return Ok(false);
        }

        tag.save_to_path(path, WriteOptions::default())
            .map_err(|e| crate::Error::tag_write(path, e.to_string()))?;

        tracing::info!(
            target: "metadata",
            path = %path.display(),
            fields = changed,
            "Wrote tags"
        );
        Ok(true)
    }
}

/// Apply `fields` to an in-memory tag. Returns the number of fields set.
fn apply_fields(tag: &mut Tag, fields: &TagFields) -> usize {
    let fill_only = fields.only_fill_empty;
    let should_write = |existing: Option<&str>, new: &str| {
        let existing = existing.map(str::trim).unwrap_or_default();
        existing != new && (!fill_only || existing.is_empty())
    };
    let mut changed = 0;

    if let Some(title) = &fields.title
        && should_write(tag.title().as_deref(), title)
    {
        tag.set_title(title.clone());
        changed += 1;
    }

    if let Some(artist) = &fields.artist
        && should_write(tag.artist().as_deref(), artist)
    {
        tag.set_artist(artist.clone());
        changed += 1;
    }

    if let Some(album) = &fields.album
        && should_write(tag.album().as_deref(), album)
    {
        tag.set_album(album.clone());
        changed += 1;
    }

    if let Some(album_artist) = &fields.album_artist
        && should_write(tag.get_string(&ItemKey::AlbumArtist), album_artist)
    {
        tag.insert_text(ItemKey::AlbumArtist, album_artist.clone());
        changed += 1;
    }

    if let Some(genre) = &fields.genre
        && should_write(tag.genre().as_deref(), genre)
    {
        tag.set_genre(genre.clone());
        changed += 1;
    }

    if let Some(lyrics) = &fields.lyrics
        && should_write(tag.get_string(&ItemKey::Lyrics), lyrics)
    {
        tag.insert_text(ItemKey::Lyrics, lyrics.clone());
        changed += 1;
    }

    if let Some(year) = fields.year.and_then(|y| u32::try_from(y).ok()) {
        let existing = tag.year();
        if existing != Some(year) && (!fill_only || existing.is_none()) {
            tag.set_year(year);
            changed += 1;
        }
    }

    if let Some(track) = fields.track_number {
        let existing = tag.track();
        if existing != Some(track) && (!fill_only || existing.is_none()) {
            tag.set_track(track);
            changed += 1;
        }
    }

    changed
}
