//! Applies file watcher events to the library.
//!
//! One dedicated thread drains the watcher channel and handles events in
//! arrival order, so two events for the same path never race. Each event is
//! driven to completion on the tokio runtime before the next is taken.
//!
//! The worker exits when the channel closes, which happens when the
//! [`FileWatcher`](super::FileWatcher) is dropped.

use crossbeam_channel::Receiver;
use std::thread::{self, JoinHandle};
use tokio::runtime::Handle;

use super::{Scanner, WatchEvent};

/// Counters kept by the worker over its lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub indexed: u64,
    pub removed: u64,
    pub errors: u64,
}

/// Spawn the worker thread.
///
/// `runtime` must outlive the worker; events are executed with
/// [`Handle::block_on`].
pub fn spawn(
    scanner: Scanner,
    events: Receiver<WatchEvent>,
    runtime: Handle,
) -> std::io::Result<JoinHandle<WorkerStats>> {
    thread::Builder::new()
        .name("watch-worker".to_string())
        .spawn(move || {
            let mut stats = WorkerStats::default();
            tracing::info!(target: "scanner::worker", "Watch worker started");
            while let Ok(event) = events.recv() {
                runtime.block_on(apply(&scanner, event, &mut stats));
            }
            tracing::info!(
                target: "scanner::worker",
                indexed = stats.indexed,
                removed = stats.removed,
                errors = stats.errors,
                "Watch worker stopped"
            );
            stats
        })
}

/// Handle one watcher event.
pub async fn apply(scanner: &Scanner, event: WatchEvent, stats: &mut WorkerStats) {
    match event {
        WatchEvent::Created(path) | WatchEvent::Modified(path) => {
            match scanner.index_file(&path).await {
                Ok(outcome) => {
                    stats.indexed += 1;
                    tracing::debug!(
                        target: "scanner::worker",
                        path = %path.display(),
                        created = outcome.created,
                        "Re-indexed file"
                    );
                }
                Err(e) => {
                    stats.errors += 1;
                    tracing::warn!(target: "scanner::worker", path = %path.display(), error = %e, "Failed to index file");
                }
            }
        }
        WatchEvent::Removed(path) => match scanner.remove_file(&path).await {
            Ok(true) => stats.removed += 1,
            Ok(false) => {}
            Err(e) => {
                stats.errors += 1;
                tracing::warn!(target: "scanner::worker", path = %path.display(), error = %e, "Failed to remove track");
            }
        },
        WatchEvent::DirCreated(dir) => {
            let (indexed, failed) = scanner.index_dir(&dir).await;
            stats.indexed += indexed;
            stats.errors += failed;
            tracing::debug!(target: "scanner::worker", dir = %dir.display(), indexed, failed, "Indexed new directory");
        }
        WatchEvent::DirRemoved(dir) => match scanner.remove_library_path(&dir).await {
            Ok(removed) => {
                stats.removed += removed;
                tracing::debug!(target: "scanner::worker", dir = %dir.display(), removed, "Dropped tracks under removed directory");
            }
            Err(e) => {
                stats.errors += 1;
                tracing::warn!(target: "scanner::worker", dir = %dir.display(), error = %e, "Failed to drop tracks under directory");
            }
        },
        WatchEvent::Error(message) => {
            stats.errors += 1;
            tracing::warn!(target: "scanner::worker", error = %message, "Watcher reported an error");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, SharedConfig};
    use crate::db::tracks;
    use crate::test_utils::{MockExtractor, temp_db, touch};
    use crossbeam_channel::unbounded;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn scanner(pool: sqlx::SqlitePool) -> Scanner {
        Scanner::new(
            pool,
            SharedConfig::in_memory(Config::default()),
            Arc::new(MockExtractor::new()),
        )
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_events_apply_in_order() {
        let (pool, _db) = temp_db().await;
        let dir = tempdir().unwrap();
        let path = touch(dir.path(), "song.mp3");
        let scanner = scanner(pool.clone());

        let (tx, rx) = unbounded();
        let worker = spawn(scanner, rx, Handle::current()).unwrap();

        tx.send(WatchEvent::Created(path.clone())).unwrap();
        tx.send(WatchEvent::Modified(path.clone())).unwrap();
        tx.send(WatchEvent::Removed(path.clone())).unwrap();
        drop(tx);

        let stats = tokio::task::spawn_blocking(move || worker.join().unwrap())
            .await
            .unwrap();
        assert_eq!(stats.indexed, 2);
        assert_eq!(stats.removed, 1);
        assert_eq!(stats.errors, 0);

        let track = tracks::get_track_by_path(&pool, &path.to_string_lossy())
            .await
            .unwrap();
        assert!(track.is_none());
    }

    #[tokio::test]
    async fn test_new_directory_is_indexed() {
        let (pool, _db) = temp_db().await;
        let dir = tempdir().unwrap();
        let sub = dir.path().join("album");
        std::fs::create_dir(&sub).unwrap();
        touch(&sub, "a.mp3");
        touch(&sub, "b.mp3");
        touch(&sub, "cover.jpg");

        let scanner = scanner(pool);
        let mut stats = WorkerStats::default();
        apply(&scanner, WatchEvent::DirCreated(sub), &mut stats).await;
        assert_eq!(stats.indexed, 2);
    }

    #[tokio::test]
    async fn test_moved_directory_drops_its_tracks() {
        let (pool, _db) = temp_db().await;
        let dir = tempdir().unwrap();
        let old = dir.path().join("Old Album");
        std::fs::create_dir(&old).unwrap();
        let a = touch(&old, "a.mp3");
        let b = touch(&old, "b.mp3");
        let keep = touch(dir.path(), "Old Album Live.mp3");

        let scanner = scanner(pool.clone());
        let mut stats = WorkerStats::default();
        apply(&scanner, WatchEvent::DirCreated(old.clone()), &mut stats).await;
        apply(&scanner, WatchEvent::Created(keep.clone()), &mut stats).await;
        assert_eq!(stats.indexed, 3);

        let new = dir.path().join("New Album");
        std::fs::rename(&old, &new).unwrap();
        apply(&scanner, WatchEvent::DirRemoved(old), &mut stats).await;
        apply(&scanner, WatchEvent::DirCreated(new.clone()), &mut stats).await;

        assert_eq!(stats.removed, 2);
        assert_eq!(stats.errors, 0);
        for gone in [&a, &b] {
            let row = tracks::get_track_by_path(&pool, &gone.to_string_lossy()).await.unwrap();
            assert!(row.is_none());
        }
        let moved = tracks::get_track_by_path(&pool, &new.join("a.mp3").to_string_lossy())
            .await
            .unwrap();
        assert!(moved.is_some());
        let sibling = tracks::get_track_by_path(&pool, &keep.to_string_lossy()).await.unwrap();
        assert!(sibling.is_some());
    }

    #[tokio::test]
    async fn test_missing_file_counts_error() {
        let (pool, _db) = temp_db().await;
        let scanner = scanner(pool);
        let mut stats = WorkerStats::default();
        apply(
            &scanner,
            WatchEvent::Created("/nope/gone.mp3".into()),
            &mut stats,
        )
        .await;
        apply(&scanner, WatchEvent::Removed("/nope/gone.mp3".into()), &mut stats).await;
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.removed, 0);
    }
}
