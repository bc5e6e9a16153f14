//! Library scanner.
//!
//! Walks the configured library roots, reads each allow-listed file through
//! a [`MetadataExtractor`], cleans title and artist with the text
//! normalizers and hands the result to the [`EntityIndex`].
//!
//! - [`progress`]: shared scan state and counters
//! - [`watcher`]: debounced file system events
//! - [`worker`]: the single thread that applies watch events
//!
//! Only one scan runs at a time. A scan stops cooperatively: the stop flag
//! is checked between files.

pub mod progress;
pub mod watcher;
pub mod worker;

use chrono::Utc;
use futures::StreamExt;
use futures::stream::Stream;
use sqlx::sqlite::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use walkdir::WalkDir;

use crate::config::SharedConfig;
use crate::db::tracks::{self, TrackFields};
use crate::error::{Error, Result, ResultExt};
use crate::index::EntityIndex;
use crate::metadata::{MetadataExtractor, RawMetadata, filename_fallback};
use crate::model::UNKNOWN_ARTIST;
use crate::text::normalize_title;

pub use progress::{ProgressSnapshot, ScanProgress, ScanState, ScanSummary};
pub use watcher::{FileWatcher, WatchError, WatchEvent};
use watcher::ExtensionFilter;

/// Scans the given root directory recursively for allow-listed files.
///
/// Extensions are compared case-insensitively. Returns a Stream of
/// PathBufs; the walk runs on a blocking thread.
pub fn scan(root: PathBuf, extensions: Vec<String>) -> impl Stream<Item = PathBuf> {
    let (tx, rx) = mpsc::channel(100);
    let filter = ExtensionFilter::new(extensions);

    // Spawn a blocking task to perform the synchronous file system traversal
    tokio::task::spawn_blocking(move || {
        for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
            if entry.file_type().is_file() && filter.matches(entry.path()) {
                // If the receiver is dropped, stop walking.
                if tx.blocking_send(entry.path().to_path_buf()).is_err() {
                    break;
                }
            }
        }
    });

    // Convert the mpsc Receiver into a Stream
    futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|path| (path, rx))
    })
}

/// Result of indexing a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileOutcome {
    pub id: i64,
    /// A new track row was created
    pub created: bool,
    /// Tags could not be read; title/artist came from the file name
    pub fallback: bool,
}

/// Drives full scans and single-file updates.
#[derive(Clone)]
pub struct Scanner {
    pool: SqlitePool,
    config: SharedConfig,
    extractor: Arc<dyn MetadataExtractor>,
    index: EntityIndex,
    progress: ScanProgress,
    stop: Arc<AtomicBool>,
}

impl Scanner {
    pub fn new(
        pool: SqlitePool,
        config: SharedConfig,
        extractor: Arc<dyn MetadataExtractor>,
    ) -> Self {
        Self {
            index: EntityIndex::new(pool.clone()),
            pool,
            config,
            extractor,
            progress: ScanProgress::new(),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Current scan progress.
    pub fn progress(&self) -> ProgressSnapshot {
        self.progress.snapshot()
    }

    pub fn index(&self) -> &EntityIndex {
        &self.index
    }

    /// Start a background scan.
    ///
    /// Fails with [`Error::ScanInProgress`] if a scan is running; the
    /// running scan's progress is left untouched. A `full` scan first
    /// deletes every track row under the configured roots, dropping
    /// favorites and play history for those paths.
    pub fn start_scan(&self, full: bool) -> Result<JoinHandle<()>> {
        if !self.progress.try_begin() {
            return Err(Error::ScanInProgress);
        }
        self.stop.store(false, Ordering::SeqCst);

        tracing::info!(target: "scanner", full, "Scan started");
        let scanner = self.clone();
        Ok(tokio::spawn(async move { scanner.run_scan(full).await }))
    }

    /// Ask a running scan to stop after the current file.
    ///
    /// Returns false if no scan was running.
    pub fn stop_scan(&self) -> bool {
        if !self.progress.is_scanning() {
            return false;
        }
        self.stop.store(true, Ordering::SeqCst);
        tracing::info!(target: "scanner", "Scan stop requested");
        true
    }

    async fn run_scan(&self, full: bool) {
        let library = self.config.library();

        let roots: Vec<PathBuf> = library
            .paths
            .iter()
            .filter(|root| {
                let exists = root.is_dir();
                if !exists {
                    tracing::warn!(target: "scanner", root = %root.display(), "Library path missing, skipping");
                }
                exists
            })
            .cloned()
            .collect();

        if roots.is_empty() {
            tracing::error!(target: "scanner", "No library path exists");
            self.progress
                .finish(ScanState::Failed, "No library path exists");
            return;
        }

        if full {
            self.progress.set_status("Clearing existing tracks");
            for root in &roots {
                match tracks::delete_tracks_under(&self.pool, root).await {
                    Ok(purged) => self.progress.add_purged(purged),
                    Err(e) => {
                        tracing::error!(target: "scanner", root = %root.display(), error = %e, "Failed to clear tracks");
                        self.progress
                            .finish(ScanState::Failed, format!("Failed to clear tracks: {e}"));
                        return;
                    }
                }
            }
        }

        self.progress.set_status("Enumerating files");
        let mut files = Vec::new();
        for root in &roots {
            let found: Vec<PathBuf> = scan(root.clone(), library.supported_extensions.clone())
                .collect()
                .await;
            tracing::info!(target: "scanner", root = %root.display(), files = found.len(), "Enumerated library path");
            files.extend(found);
        }
        self.progress.set_total(files.len() as u64);
        self.progress
            .set_status(format!("Indexing {} files", files.len()));

        for (i, path) in files.iter().enumerate() {
            if self.stop.load(Ordering::SeqCst) {
                tracing::info!(target: "scanner", indexed = i, "Scan stopped");
                self.progress.finish(ScanState::Stopped, "Scan stopped");
                return;
            }

            let done = i as u64 + 1;
            match self.index_file(path).await {
                Ok(outcome) => {
                    self.progress
                        .record_indexed(outcome.created, outcome.fallback, done)
                }
                Err(e) => {
                    tracing::warn!(target: "scanner", path = %path.display(), error = %e, "Failed to index file");
                    self.progress
                        .record_error(format!("{}: {e}", path.display()), done);
                }
            }
        }

        let summary = self.progress.snapshot().results_summary;
        let text = format!(
            "Scanned {} files: {} added, {} updated, {} errors",
            summary.total, summary.added, summary.updated, summary.errors
        );
        tracing::info!(
            target: "scanner",
            total = summary.total,
            added = summary.added,
            updated = summary.updated,
            purged = summary.purged,
            errors = summary.errors,
            fallbacks = summary.fallbacks,
            "Scan completed"
        );
        self.progress.finish(ScanState::Completed, text);

        if let Err(e) = self.config.record_scan_finished(Utc::now()) {
            tracing::warn!(target: "scanner", error = %e, "Failed to record scan time");
        }
    }

    /// Read, normalize and index one file.
    pub async fn index_file(&self, path: &Path) -> Result<FileOutcome> {
        let stat = tokio::fs::metadata(path)
            .await
            .with_context(format!("stat {}", path.display()))?;

        let extractor = Arc::clone(&self.extractor);
        let owned = path.to_path_buf();
        let extracted = tokio::task::spawn_blocking(move || extractor.extract(&owned))
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e)))?;

        let (meta, fallback) = match extracted {
            Ok(meta) => (meta, false),
            Err(e) => {
                tracing::warn!(target: "scanner", path = %path.display(), error = %e, "Unreadable tags, using file name");
                (RawMetadata::default(), true)
            }
        };

        let fields = build_fields(path, meta, stat.len());
        let indexed = self.index.index_track(fields).await?;
        Ok(FileOutcome {
            id: indexed.id,
            created: indexed.created,
            fallback,
        })
    }

    /// Delete the row for a removed file. Returns whether a row existed.
    pub async fn remove_file(&self, path: &Path) -> Result<bool> {
        let removed = tracks::delete_track_by_path(&self.pool, &path.to_string_lossy()).await?;
        if removed > 0 {
            tracing::debug!(target: "scanner", path = %path.display(), "Removed track");
        }
        Ok(removed > 0)
    }

    /// Delete every track row under `root`.
    pub async fn remove_library_path(&self, root: &Path) -> Result<u64> {
        let removed = tracks::delete_tracks_under(&self.pool, root).await?;
        tracing::info!(target: "scanner", root = %root.display(), removed, "Removed library path");
        Ok(removed)
    }

    /// Index every allow-listed file under a directory.
    pub(crate) async fn index_dir(&self, dir: &Path) -> (u64, u64) {
        let extensions = self.config.library().supported_extensions;
        let files: Vec<PathBuf> = scan(dir.to_path_buf(), extensions).collect().await;
        let (mut ok, mut failed) = (0, 0);
        for path in files {
            match self.index_file(&path).await {
                Ok(_) => ok += 1,
                Err(e) => {
                    failed += 1;
                    tracing::warn!(target: "scanner", path = %path.display(), error = %e, "Failed to index file");
                }
            }
        }
        (ok, failed)
    }

    pub(crate) fn extensions(&self) -> Vec<String> {
        self.config.library().supported_extensions
    }
}

/// Combine extracted tags with the file-name guess into track fields.
///
/// Title and artist fall back to the file name when the tag lacks them.
/// The stored title is normalized; the artist is kept as tagged for display
/// and split/normalized later by the entity index.
fn build_fields(path: &Path, meta: RawMetadata, size: u64) -> TrackFields {
    let needs_guess = meta.title.is_none() || meta.artist.is_none();
    let guess = needs_guess.then(|| filename_fallback(path));

    let raw_title = meta
        .title
        .clone()
        .or_else(|| guess.as_ref().map(|g| g.title.clone()))
        .unwrap_or_default();
    let title = match normalize_title(&raw_title) {
        t if !t.is_empty() => t,
        _ if !raw_title.trim().is_empty() => raw_title.trim().to_string(),
        _ => path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };

    let artist = meta
        .artist
        .clone()
        .or_else(|| guess.and_then(|g| g.artist))
        .or_else(|| meta.album_artist.clone())
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| UNKNOWN_ARTIST.to_string());

    TrackFields {
        path: path.to_string_lossy().into_owned(),
        title,
        artist,
        album: meta.album,
        album_artist: meta.album_artist,
        genre: meta.genre,
        year: meta.year,
        track_number: meta.track_number,
        disc_number: meta.disc_number,
        duration: meta.duration,
        bitrate: meta.bitrate,
        sample_rate: meta.sample_rate,
        channels: meta.channels,
        size,
        cover_image: meta.cover_image,
        lyrics: meta.lyrics,
        ..Default::default()
    }
}
