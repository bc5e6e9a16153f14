//! Library root watcher.
//!
//! Wraps a `notify` debouncer over the library roots and turns its batches
//! into [`WatchEvent`]s for allow-listed audio files, delivered over a
//! bounded crossbeam channel. Rapid writes to one file coalesce into a
//! single event. Dropping the [`FileWatcher`] stops delivery and closes the
//! channel, which ends the consumer in [`super::worker`].
//!
//! ```rust,ignore
//! let (watcher, rx) = FileWatcher::new(roots, extensions)?;
//! let worker = worker::spawn(scanner, rx, runtime.handle().clone())?;
//! ```

use crossbeam_channel::{Receiver, Sender, bounded};
use notify::{
    RecommendedWatcher, RecursiveMode,
    event::{CreateKind, ModifyKind, RemoveKind, RenameMode},
};
use notify_debouncer_full::{DebounceEventResult, Debouncer, RecommendedCache, new_debouncer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Debounce window for file events.
const DEBOUNCE: Duration = Duration::from_millis(500);

/// Capacity of the event channel.
const CHANNEL_CAPACITY: usize = 1024;

/// Events emitted by the file watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A new audio file was created
    Created(PathBuf),
    /// An existing audio file was modified
    Modified(PathBuf),
    /// An audio file was removed
    Removed(PathBuf),
    /// A directory was created (may contain audio files)
    DirCreated(PathBuf),
    /// A directory was removed or moved away, or some other non-audio
    /// path vanished that may have held indexed files
    DirRemoved(PathBuf),
    /// An error occurred while watching
    Error(String),
}

/// Handle to a running file watcher.
///
/// Dropping this handle will stop the watcher.
pub struct FileWatcher {
    debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
    running: Arc<AtomicBool>,
}

impl FileWatcher {
    /// Create a new file watcher for the given directories.
    ///
    /// `extensions` is the allow-list (compared case-insensitively).
    /// Returns the watcher handle and a receiver for watch events.
    pub fn new(
        watch_paths: Vec<PathBuf>,
        extensions: Vec<String>,
    ) -> Result<(Self, Receiver<WatchEvent>), WatchError> {
        let (tx, rx) = bounded(CHANNEL_CAPACITY);
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = Arc::clone(&running);
        let filter = ExtensionFilter::new(extensions);

        let debouncer = new_debouncer(DEBOUNCE, None, move |result: DebounceEventResult| {
            if !running_clone.load(Ordering::Relaxed) {
                return;
            }
            handle_debounced_events(result, &filter, &tx);
        })
        .map_err(|e| WatchError::Init(e.to_string()))?;

        let mut watcher = Self { debouncer, running };

        for path in &watch_paths {
            watcher.watch(path)?;
        }

        Ok((watcher, rx))
    }

    /// Add a directory to watch.
    pub fn watch(&mut self, path: &Path) -> Result<(), WatchError> {
        tracing::info!(target: "scanner::watcher", path = %path.display(), "Watching directory");
        self.debouncer
            .watch(path, RecursiveMode::Recursive)
            .map_err(|e| WatchError::Watch(format!("{}: {e}", path.display())))
    }

    /// Stop watching a directory.
    pub fn unwatch(&mut self, path: &Path) -> Result<(), WatchError> {
        tracing::info!(target: "scanner::watcher", path = %path.display(), "Unwatching directory");
        self.debouncer
            .unwatch(path)
            .map_err(|e| WatchError::Watch(format!("{}: {e}", path.display())))
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        tracing::debug!(target: "scanner::watcher", "File watcher stopped");
    }
}

/// Case-insensitive extension allow-list.
#[derive(Debug, Clone)]
pub(crate) struct ExtensionFilter {
    extensions: Vec<String>,
}

impl ExtensionFilter {
    pub(crate) fn new(extensions: Vec<String>) -> Self {
        Self {
            extensions: extensions.into_iter().map(|e| e.to_lowercase()).collect(),
        }
    }

    pub(crate) fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|a| a.eq_ignore_ascii_case(ext)))
    }
}

/// Map one debounced batch to watch events.
fn handle_debounced_events(
    result: DebounceEventResult,
    filter: &ExtensionFilter,
    tx: &Sender<WatchEvent>,
) {
    match result {
        Ok(events) => {
            for event in events {
                for watch_event in classify(&event.kind, &event.paths, filter) {
                    if tx.try_send(watch_event).is_err() {
                        tracing::warn!(target: "scanner::watcher", "Event channel full, dropping event");
                    }
                }
            }
        }
        Err(errors) => {
            for error in errors {
                tracing::warn!(target: "scanner::watcher", error = %error, "Watch error");
                let _ = tx.try_send(WatchEvent::Error(error.to_string()));
            }
        }
    }
}

/// Translate a notify event into zero or more watch events.
///
/// A rename is a removal of the old path plus a creation of the new one.
/// A vanished path without an allow-listed extension is treated as a
/// directory, since it can no longer be stat'd.
fn classify(kind: &notify::EventKind, paths: &[PathBuf], filter: &ExtensionFilter) -> Vec<WatchEvent> {
    use notify::EventKind;

    match kind {
        EventKind::Create(CreateKind::Folder) => {
            paths.iter().cloned().map(WatchEvent::DirCreated).collect()
        }
        EventKind::Create(_) => paths
            .iter()
            .filter(|p| filter.matches(p))
            .cloned()
            .map(WatchEvent::Created)
            .collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if paths.len() == 2 => {
            let mut out = vec![gone(&paths[0], filter)];
            out.extend(appeared(&paths[1], filter));
            out
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            paths.iter().map(|p| gone(p, filter)).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            paths.iter().filter_map(|p| appeared(p, filter)).collect()
        }
        // Backends that can't pair renames only say the name changed
        EventKind::Modify(ModifyKind::Name(_)) => paths
            .iter()
            .filter_map(|p| {
                if p.exists() {
                    appeared(p, filter)
                } else {
                    Some(gone(p, filter))
                }
            })
            .collect(),
        EventKind::Modify(ModifyKind::Data(_))
        | EventKind::Modify(ModifyKind::Metadata(_))
        | EventKind::Modify(ModifyKind::Any) => paths
            .iter()
            .filter(|p| filter.matches(p))
            .cloned()
            .map(WatchEvent::Modified)
            .collect(),
        EventKind::Remove(RemoveKind::Folder) => {
            paths.iter().cloned().map(WatchEvent::DirRemoved).collect()
        }
        EventKind::Remove(RemoveKind::File) => paths
            .iter()
            .filter(|p| filter.matches(p))
            .cloned()
            .map(WatchEvent::Removed)
            .collect(),
        EventKind::Remove(_) => paths.iter().map(|p| gone(p, filter)).collect(),
        _ => Vec::new(),
    }
}

/// Event for a path that no longer exists.
fn gone(path: &Path, filter: &ExtensionFilter) -> WatchEvent {
    if filter.matches(path) {
        WatchEvent::Removed(path.to_path_buf())
    } else {
        WatchEvent::DirRemoved(path.to_path_buf())
    }
}

/// Event for a path that just showed up.
fn appeared(path: &Path, filter: &ExtensionFilter) -> Option<WatchEvent> {
    if filter.matches(path) {
        Some(WatchEvent::Created(path.to_path_buf()))
    } else if path.is_dir() {
        Some(WatchEvent::DirCreated(path.to_path_buf()))
    } else {
        None
    }
}

/// Errors that can occur during file watching.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WatchError {
    #[error("Failed to initialize watcher: {0}")]
    Init(String),
    #[error("Failed to watch path: {0}")]
    Watch(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::EventKind;
    use notify::event::DataChange;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn filter() -> ExtensionFilter {
        ExtensionFilter::new(vec!["mp3".into(), "FLAC".into()])
    }

    #[test]
    fn test_extension_filter() {
        let filter = filter();
        assert!(filter.matches(Path::new("song.mp3")));
        assert!(filter.matches(Path::new("song.flac")));
        assert!(filter.matches(Path::new("SONG.MP3")));
        assert!(!filter.matches(Path::new("image.png")));
        assert!(!filter.matches(Path::new("noext")));
    }

    #[test]
    fn test_classify_create_modify_remove() {
        let paths = vec![PathBuf::from("/m/a.mp3"), PathBuf::from("/m/cover.jpg")];
        assert_eq!(
            classify(&EventKind::Create(CreateKind::File), &paths, &filter()),
            vec![WatchEvent::Created(PathBuf::from("/m/a.mp3"))]
        );
        assert_eq!(
            classify(
                &EventKind::Modify(ModifyKind::Data(DataChange::Content)),
                &paths,
                &filter()
            ),
            vec![WatchEvent::Modified(PathBuf::from("/m/a.mp3"))]
        );
        assert_eq!(
            classify(&EventKind::Remove(RemoveKind::File), &paths, &filter()),
            vec![WatchEvent::Removed(PathBuf::from("/m/a.mp3"))]
        );
    }

    #[test]
    fn test_classify_rename() {
        let paths = vec![PathBuf::from("/m/old.mp3"), PathBuf::from("/m/new.mp3")];
        assert_eq!(
            classify(
                &EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
                &paths,
                &filter()
            ),
            vec![
                WatchEvent::Removed(PathBuf::from("/m/old.mp3")),
                WatchEvent::Created(PathBuf::from("/m/new.mp3")),
            ]
        );
    }

    #[test]
    fn test_classify_directory_moves_and_removals() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("Renamed Album");
        std::fs::create_dir(&target).unwrap();
        let old = PathBuf::from("/m/Old Album");

        let paths = vec![old.clone(), target.clone()];
        assert_eq!(
            classify(
                &EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
                &paths,
                &filter()
            ),
            vec![WatchEvent::DirRemoved(old.clone()), WatchEvent::DirCreated(target.clone())]
        );
        assert_eq!(
            classify(
                &EventKind::Modify(ModifyKind::Name(RenameMode::From)),
                &[old.clone()],
                &filter()
            ),
            vec![WatchEvent::DirRemoved(old.clone())]
        );
        assert_eq!(
            classify(&EventKind::Remove(RemoveKind::Folder), &[old.clone()], &filter()),
            vec![WatchEvent::DirRemoved(old.clone())]
        );
        assert_eq!(
            classify(&EventKind::Remove(RemoveKind::Any), &[old.clone()], &filter()),
            vec![WatchEvent::DirRemoved(old)]
        );
        // A stray non-audio file is not a directory
        assert!(
            classify(
                &EventKind::Remove(RemoveKind::File),
                &[PathBuf::from("/m/cover.jpg")],
                &filter()
            )
            .is_empty()
        );
    }

    #[test]
    fn test_classify_ignores_access() {
        let paths = vec![PathBuf::from("/m/a.mp3")];
        let kind = EventKind::Access(notify::event::AccessKind::Any);
        assert!(classify(&kind, &paths, &filter()).is_empty());
    }

    #[test]
    fn test_watcher_creation() {
        let dir = tempdir().unwrap();
        let (watcher, _rx) = FileWatcher::new(vec![dir.path().to_path_buf()], vec!["mp3".into()])
            .unwrap();
        drop(watcher); // Should not panic
    }

    #[test]
    fn test_watch_missing_directory_fails() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("missing");
        let result = FileWatcher::new(vec![missing], vec!["mp3".into()]);
        assert!(matches!(result, Err(WatchError::Watch(_))));
    }

    #[test]
    fn test_watcher_detects_new_file() {
        let dir = tempdir().unwrap();
        let (watcher, rx) =
            FileWatcher::new(vec![dir.path().to_path_buf()], vec!["mp3".into()]).unwrap();

        let file_path = dir.path().join("new_song.mp3");
        let mut file = File::create(&file_path).unwrap();
        file.write_all(b"fake mp3 content").unwrap();
        file.sync_all().unwrap();

        let event = rx.recv_timeout(Duration::from_secs(2));
        drop(watcher);

        // Some platforms deliver the event late or as a modify; only check
        // the shape when a create arrives in time.
        if let Ok(WatchEvent::Created(path)) = event {
            assert_eq!(path.file_name().unwrap(), "new_song.mp3");
        }
    }
}
