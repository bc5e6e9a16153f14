//! Test utilities and fixtures for tune-ledger tests.
//!
//! This module provides common test helpers, mock collaborators, and
//! database utilities to reduce boilerplate in tests.
//!
//! # Example
//!
//! ```ignore
//! use tune_ledger::test_utils::{temp_db, insert_plain_track};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let (pool, _dir) = temp_db().await;
//!     let id = insert_plain_track(&pool, "/m/a.mp3", "Alpha").await;
//!     // ... test logic
//! }
//! ```

use parking_lot::Mutex;
use sqlx::sqlite::SqlitePool;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

use crate::db::tracks::{self, TrackFields};
use crate::metadata::{ExtractionError, MetadataExtractor, RawMetadata, TagFields, TagWriter};

/// Creates a temporary database for testing.
///
/// The database is created in a temporary directory that is automatically
/// cleaned up when the returned `TempDir` is dropped. Migrations are run
/// automatically.
///
/// Keep the TempDir alive for the duration of your test.
pub async fn temp_db() -> (SqlitePool, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    let db_path = dir.path().join("test.db");
    let db_url = crate::db::db_url(Some(&db_path));

    let pool = crate::db::init_db(&db_url)
        .await
        .expect("Failed to initialize test database");

    (pool, dir)
}

/// Track fields with sensible defaults and no album.
pub fn sample_fields(path: &str, title: &str, artist: &str) -> TrackFields {
    TrackFields {
        path: path.to_string(),
        title: title.to_string(),
        artist: artist.to_string(),
        duration: 200,
        size: 1024,
        ..Default::default()
    }
}

/// Inserts a bare track row, bypassing the entity index. Returns its id.
pub async fn insert_plain_track(pool: &SqlitePool, path: &str, title: &str) -> i64 {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    tracks::insert_track(&mut conn, &sample_fields(path, title, "Test Artist"))
        .await
        .expect("Failed to insert track")
}

/// Creates an empty file named `name` in `dir`.
pub fn touch(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::File::create(&path).expect("Failed to create file");
    path
}

/// Extractor returning canned metadata per path.
///
/// Unknown paths yield empty metadata; paths marked failing yield an
/// extraction error.
#[derive(Debug, Default)]
pub struct MockExtractor {
    metadata: HashMap<PathBuf, RawMetadata>,
    failing: HashSet<PathBuf>,
    delay: Option<Duration>,
}

impl MockExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: &Path, metadata: RawMetadata) -> Self {
        self.metadata.insert(path.to_path_buf(), metadata);
        self
    }

    pub fn failing(mut self, path: &Path) -> Self {
        self.failing.insert(path.to_path_buf());
        self
    }

    /// Sleep this long on every extraction.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl MetadataExtractor for MockExtractor {
    fn extract(&self, path: &Path) -> Result<RawMetadata, ExtractionError> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.failing.contains(path) {
            return Err(ExtractionError::Corrupt {
                path: path.to_path_buf(),
                message: "mock failure".to_string(),
            });
        }
        Ok(self.metadata.get(path).cloned().unwrap_or_default())
    }
}

/// Tag writer that records writes instead of touching files.
///
/// Any non-empty field set counts as a change.
#[derive(Debug, Default)]
pub struct RecordingTagWriter {
    pub writes: Mutex<Vec<(PathBuf, TagFields)>>,
}

impl TagWriter for RecordingTagWriter {
    fn write(&self, path: &Path, fields: &TagFields) -> crate::Result<bool> {
        if fields.is_empty() {
            return Ok(false);
        }
        self.writes.lock().push((path.to_path_buf(), fields.clone()));
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Filter;
    use crate::db::repo;

    #[tokio::test]
    async fn test_temp_db_creates_working_database() {
        let (pool, _dir) = temp_db().await;

        let total = repo::count::<tracks::TrackRow>(&pool, &Filter::new()).await.unwrap();
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_insert_plain_track() {
        let (pool, _dir) = temp_db().await;

        let id = insert_plain_track(&pool, "/test/song.mp3", "Song").await;
        assert!(id > 0);

        let track = tracks::get_track(&pool, id).await.unwrap().unwrap();
        assert_eq!(track.path, "/test/song.mp3");
        assert_eq!(track.title, "Song");
        assert!(track.artist_ids.is_empty());
    }

    #[test]
    fn test_mock_extractor() {
        let known = Path::new("/m/known.mp3");
        let broken = Path::new("/m/broken.mp3");
        let extractor = MockExtractor::new()
            .with(
                known,
                RawMetadata {
                    title: Some("Known".to_string()),
                    ..Default::default()
                },
            )
            .failing(broken);

        assert_eq!(extractor.extract(known).unwrap().title.as_deref(), Some("Known"));
        assert_eq!(extractor.extract(Path::new("/m/other.mp3")).unwrap(), RawMetadata::default());
        assert!(extractor.extract(broken).is_err());
    }
}
