//! Library facade.
//!
//! [`Library`] is the operation surface a route layer or the CLI calls. It
//! owns the database pool, the shared config, the scanner and the online
//! aggregator, and adds no rules of its own beyond mapping missing ids to
//! [`Error::NotFound`].

use sqlx::sqlite::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::config::{Config, SharedConfig};
use crate::db::entities::{AlbumRow, ArtistRow, RecountSummary};
use crate::db::repo::{self, Page, PageRequest};
use crate::db::tracks::{self, TrackRow};
use crate::db::{self as store, Filter, Sort};
use crate::enrichment::{
    Aggregator, AggregatorConfig, OnlineCache, OnlineCandidate, PluginInfo, PluginManager,
    SearchOutcome, SearchQuery,
};
use crate::error::{Error, Result, ResultExt};
use crate::metadata::{LoftyExtractor, LoftyTagWriter, MetadataExtractor, TagFields, TagWriter};
use crate::model::{Album, Artist, Track};
use crate::scanner::worker::{self, WorkerStats};
use crate::scanner::{FileWatcher, ProgressSnapshot, Scanner};

/// Running file watcher plus the worker applying its events.
pub struct WatchHandle {
    watcher: FileWatcher,
    worker: std::thread::JoinHandle<WorkerStats>,
}

impl WatchHandle {
    /// Watch an additional directory.
    pub fn watch(&mut self, path: &Path) -> Result<()> {
        Ok(self.watcher.watch(path)?)
    }

    /// Stop watching and wait for the worker to drain.
    pub fn stop(self) -> WorkerStats {
        drop(self.watcher);
        self.worker.join().unwrap_or_else(|_| {
            tracing::error!(target: "library", "Watch worker panicked");
            WorkerStats::default()
        })
    }
}

/// The media library.
#[derive(Clone)]
pub struct Library {
    pool: SqlitePool,
    config: SharedConfig,
    scanner: Scanner,
    aggregator: Aggregator,
    tag_writer: Arc<dyn TagWriter>,
}

impl Library {
    /// Open the database named by the config and build every collaborator
    /// with its production implementation.
    pub async fn open(config: Config, config_path: Option<PathBuf>) -> Result<Self> {
        let db_path = config
            .database
            .path
            .clone()
            .unwrap_or_else(store::default_db_path);
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(format!("create {}", parent.display()))?;
        }
        let pool = store::init_db(&store::db_url(Some(&db_path)))
            .await
            .with_context(format!("open {}", db_path.display()))?;
        tracing::info!(target: "library", db = %db_path.display(), "Library opened");

        let plugins = PluginManager::from_config(&config.providers);
        let shared = match config_path {
            Some(path) => SharedConfig::new(config, path),
            None => SharedConfig::in_memory(config),
        };
        Ok(Self::new(
            pool,
            shared,
            Arc::new(LoftyExtractor),
            Arc::new(LoftyTagWriter),
            plugins,
        ))
    }

    /// Assemble a library from explicit collaborators.
    pub fn new(
        pool: SqlitePool,
        config: SharedConfig,
        extractor: Arc<dyn MetadataExtractor>,
        tag_writer: Arc<dyn TagWriter>,
        plugins: PluginManager,
    ) -> Self {
        let providers = config.snapshot().providers;
        let mut aggregator = Aggregator::new(plugins, AggregatorConfig::from(&providers));
        if providers.cache_results {
            aggregator = aggregator.with_cache(OnlineCache::new(pool.clone()));
        }
        Self {
            scanner: Scanner::new(pool.clone(), config.clone(), extractor),
            pool,
            config,
            aggregator,
            tag_writer,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Scanning
    // ------------------------------------------------------------------

    /// Start a background scan. Fails with [`Error::ScanInProgress`] while
    /// one is running.
    pub fn start_scan(&self, full: bool) -> Result<JoinHandle<()>> {
        self.scanner.start_scan(full)
    }

    pub fn scan_progress(&self) -> ProgressSnapshot {
        self.scanner.progress()
    }

    /// Request a cooperative stop. Returns false when nothing was running.
    pub fn stop_scan(&self) -> bool {
        self.scanner.stop_scan()
    }

    /// Delete every track row under `root`.
    pub async fn remove_library_path(&self, root: &Path) -> Result<u64> {
        self.scanner.remove_library_path(root).await
    }

    /// Recompute artist and album counts from current rows.
    pub async fn recount(&self) -> Result<RecountSummary> {
        self.scanner.index().recount().await
    }

    /// Watch every configured library path and apply changes on a worker
    /// thread driven by `runtime`.
    ///
    /// Returns `None` when `watch_for_changes` is off in the config.
    pub fn start_watching(&self, runtime: Handle) -> Result<Option<WatchHandle>> {
        let library = self.config.library();
        if !library.watch_for_changes {
            tracing::info!(target: "library", "Watching disabled by config");
            return Ok(None);
        }
        let roots: Vec<PathBuf> = library.paths.into_iter().filter(|p| p.is_dir()).collect();
        let (watcher, events) = FileWatcher::new(roots, library.supported_extensions)?;
        let worker = worker::spawn(self.scanner.clone(), events, runtime)?;
        Ok(Some(WatchHandle { watcher, worker }))
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// One page of tracks. Unknown filter or sort columns are ignored.
    pub async fn list_tracks(
        &self,
        filter: &Filter,
        sort: Option<&Sort>,
        page: u32,
        page_size: u32,
    ) -> Result<Page<Track>> {
        let rows =
            repo::paginate::<TrackRow>(&self.pool, filter, sort, PageRequest::new(page, page_size))
                .await?;
        Ok(rows.map(Track::from))
    }

    /// One page of tracks in a seeded random order. Pass the returned seed
    /// back to get the next page of the same permutation.
    pub async fn shuffle_tracks(
        &self,
        filter: &Filter,
        page: u32,
        page_size: u32,
        seed: Option<i64>,
    ) -> Result<(Page<Track>, i64)> {
        let (rows, seed) = repo::paginate_random::<TrackRow>(
            &self.pool,
            filter,
            PageRequest::new(page, page_size),
            seed,
        )
        .await?;
        Ok((rows.map(Track::from), seed))
    }

    pub async fn get_track(&self, id: i64) -> Result<Track> {
        tracks::get_track(&self.pool, id)
            .await?
            .ok_or(Error::not_found("Track", id))
    }

    pub async fn list_artists(
        &self,
        filter: &Filter,
        sort: Option<&Sort>,
        page: u32,
        page_size: u32,
    ) -> Result<Page<Artist>> {
        let rows =
            repo::paginate::<ArtistRow>(&self.pool, filter, sort, PageRequest::new(page, page_size))
                .await?;
        Ok(rows.map(Artist::from))
    }

    pub async fn list_albums(
        &self,
        filter: &Filter,
        sort: Option<&Sort>,
        page: u32,
        page_size: u32,
    ) -> Result<Page<Album>> {
        let rows =
            repo::paginate::<AlbumRow>(&self.pool, filter, sort, PageRequest::new(page, page_size))
                .await?;
        Ok(rows.map(Album::from))
    }

    // ------------------------------------------------------------------
    // Track edits
    // ------------------------------------------------------------------

    pub async fn upsert_favorite(&self, track_id: i64, favorite: bool) -> Result<()> {
        if !tracks::set_favorite(&self.pool, track_id, favorite).await? {
            return Err(Error::not_found("Track", track_id));
        }
        tracing::debug!(target: "library", track_id, favorite, "Favorite updated");
        Ok(())
    }

    pub async fn record_play(&self, track_id: i64) -> Result<()> {
        if !tracks::record_play(&self.pool, track_id).await? {
            return Err(Error::not_found("Track", track_id));
        }
        Ok(())
    }

    /// Write tags into a track's file, then re-index it so the row matches.
    ///
    /// Returns whether the file changed.
    pub async fn write_tags(&self, track_id: i64, fields: TagFields) -> Result<bool> {
        let track = self.get_track(track_id).await?;
        let path = PathBuf::from(&track.path);

        let writer = Arc::clone(&self.tag_writer);
        let target = path.clone();
        let changed = tokio::task::spawn_blocking(move || writer.write(&target, &fields))
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e)))??;

        if changed {
            self.scanner.index_file(&path).await?;
        }
        Ok(changed)
    }

    // ------------------------------------------------------------------
    // Online search
    // ------------------------------------------------------------------

    /// Search online providers; `plugin` restricts the search to one.
    pub async fn search_online(
        &self,
        query: &SearchQuery,
        plugin: Option<&str>,
    ) -> Result<SearchOutcome> {
        self.aggregator.search(query, plugin).await
    }

    pub async fn search_lyrics(
        &self,
        title: &str,
        artist: &str,
        plugin: Option<&str>,
    ) -> Result<Option<OnlineCandidate>> {
        self.aggregator.search_lyrics(title, artist, plugin).await
    }

    pub fn list_plugins(&self) -> Vec<PluginInfo> {
        self.aggregator.list_plugins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::MetadataProvider;
    use crate::enrichment::traits::mocks::MockProvider;
    use crate::metadata::RawMetadata;
    use crate::scanner::ScanState;
    use crate::test_utils::{MockExtractor, RecordingTagWriter, insert_plain_track, temp_db, touch};
    use tempfile::tempdir;

    fn library(pool: SqlitePool, roots: Vec<PathBuf>, extractor: MockExtractor) -> Library {
        let mut config = Config::default();
        config.library.paths = roots;
        let plugins = PluginManager::with_providers(vec![
            Arc::new(MockProvider::with_results("lrclib", &[("Song", "Band")])) as Arc<dyn MetadataProvider>,
        ]);
        Library::new(
            pool,
            SharedConfig::in_memory(config),
            Arc::new(extractor),
            Arc::new(RecordingTagWriter::default()),
            plugins,
        )
    }

    #[tokio::test]
    async fn test_pages_cover_every_track() {
        let (pool, _db) = temp_db().await;
        for i in 0..23 {
            insert_plain_track(&pool, &format!("/m/{i:02}.mp3"), &format!("Track {i:02}")).await;
        }
        let library = library(pool, Vec::new(), MockExtractor::new());

        let mut seen = 0;
        let mut page = 1;
        loop {
            let result = library
                .list_tracks(&Filter::new(), Some(&Sort::asc("title")), page, 5)
                .await
                .unwrap();
            assert_eq!(result.pagination.total, 23);
            assert_eq!(result.pagination.pages, 5);
            assert!(result.data.len() <= 5);
            if result.data.is_empty() {
                break;
            }
            seen += result.data.len();
            page += 1;
        }
        assert_eq!(seen, 23);
    }

    #[tokio::test]
    async fn test_shuffle_pages_are_a_permutation() {
        let (pool, _db) = temp_db().await;
        for i in 0..12 {
            insert_plain_track(&pool, &format!("/m/{i}.mp3"), &format!("T{i}")).await;
        }
        let library = library(pool, Vec::new(), MockExtractor::new());

        let (first, seed) = library.shuffle_tracks(&Filter::new(), 1, 6, None).await.unwrap();
        let (second, same_seed) = library
            .shuffle_tracks(&Filter::new(), 2, 6, Some(seed))
            .await
            .unwrap();
        assert_eq!(seed, same_seed);

        let mut ids: Vec<i64> = first.data.iter().chain(&second.data).map(|t| t.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 12);
    }

    #[tokio::test]
    async fn test_favorite_and_play_missing_track() {
        let (pool, _db) = temp_db().await;
        let id = insert_plain_track(&pool, "/m/a.mp3", "A").await;
        let library = library(pool, Vec::new(), MockExtractor::new());

        library.upsert_favorite(id, true).await.unwrap();
        library.record_play(id).await.unwrap();
        let track = library.get_track(id).await.unwrap();
        assert!(track.favorite);
        assert_eq!(track.play_count, 1);

        let favorites = library
            .list_tracks(&Filter::new().eq("favorite", true), None, 1, 10)
            .await
            .unwrap();
        assert_eq!(favorites.pagination.total, 1);

        assert!(matches!(
            library.upsert_favorite(9999, true).await,
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(library.record_play(9999).await, Err(Error::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_scan_then_browse_entities() {
        let (pool, _db) = temp_db().await;
        let dir = tempdir().unwrap();
        let a = touch(dir.path(), "a.mp3");
        let b = touch(dir.path(), "b.mp3");
        let meta = |title: &str| RawMetadata {
            title: Some(title.to_string()),
            artist: Some("Alice & Bob".to_string()),
            album: Some("Duets".to_string()),
            ..Default::default()
        };
        let extractor = MockExtractor::new().with(&a, meta("One")).with(&b, meta("Two"));
        let library = library(pool, vec![dir.path().to_path_buf()], extractor);

        library.start_scan(false).unwrap().await.unwrap();
        assert_eq!(library.scan_progress().state, ScanState::Completed);

        let artists = library
            .list_artists(&Filter::new(), Some(&Sort::asc("name")), 1, 10)
            .await
            .unwrap();
        let names: Vec<&str> = artists.data.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Alice", "Bob"]);
        assert!(artists.data.iter().all(|a| a.track_count == 2 && a.album_count == 1));

        let albums = library.list_albums(&Filter::new(), None, 1, 10).await.unwrap();
        assert_eq!(albums.data.len(), 1);
        assert_eq!(albums.data[0].track_count, 2);

        assert_eq!(library.remove_library_path(dir.path()).await.unwrap(), 2);
        library.recount().await.unwrap();
        let artists = library.list_artists(&Filter::new(), None, 1, 10).await.unwrap();
        assert!(artists.data.iter().all(|a| a.track_count == 0));
        let albums = library.list_albums(&Filter::new(), None, 1, 10).await.unwrap();
        assert_eq!(albums.data[0].track_count, 0);
    }

    #[tokio::test]
    async fn test_write_tags_reindexes() {
        let (pool, _db) = temp_db().await;
        let dir = tempdir().unwrap();
        let path = touch(dir.path(), "song.mp3");
        let library = library(pool, vec![dir.path().to_path_buf()], MockExtractor::new());
        library.start_scan(false).unwrap().await.unwrap();
        let id = tracks::get_track_by_path(library.pool(), &path.to_string_lossy())
            .await
            .unwrap()
            .unwrap()
            .id;

        let changed = library
            .write_tags(
                id,
                TagFields {
                    title: Some("New".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(changed);

        let unchanged = library.write_tags(id, TagFields::default()).await.unwrap();
        assert!(!unchanged);

        assert!(matches!(
            library.write_tags(9999, TagFields::default()).await,
            Err(Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_search_online_through_facade() {
        let (pool, _db) = temp_db().await;
        let library = library(pool, Vec::new(), MockExtractor::new());

        let plugins: Vec<String> = library.list_plugins().into_iter().map(|p| p.name).collect();
        assert_eq!(plugins, vec!["lrclib"]);

        let outcome = library
            .search_online(&SearchQuery::new("Song", "Band"), None)
            .await
            .unwrap();
        let found = outcome.candidates();
        assert_eq!(found.len(), 1);
        // Authoritative boost: 0.7 * 1.1
        assert!((found[0].score - 0.77).abs() < 1e-9);

        assert!(matches!(
            library.search_online(&SearchQuery::new("Song", "Band"), Some("nope")).await,
            Err(Error::UnknownPlugin(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_start_and_stop_watching() {
        let (pool, _db) = temp_db().await;
        let dir = tempdir().unwrap();
        let library = library(pool, vec![dir.path().to_path_buf()], MockExtractor::new());

        let handle = library.start_watching(Handle::current()).unwrap().unwrap();
        let stats = tokio::task::spawn_blocking(move || handle.stop()).await.unwrap();
        assert_eq!(stats, WorkerStats::default());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_watching_off_in_config_starts_nothing() {
        let (pool, _db) = temp_db().await;
        let dir = tempdir().unwrap();
        let mut config = Config::default();
        config.library.paths = vec![dir.path().to_path_buf()];
        config.library.watch_for_changes = false;
        let library = Library::new(
            pool,
            SharedConfig::in_memory(config),
            Arc::new(MockExtractor::new()),
            Arc::new(RecordingTagWriter::default()),
            PluginManager::with_providers(Vec::new()),
        );

        assert!(library.start_watching(Handle::current()).unwrap().is_none());
    }
}
