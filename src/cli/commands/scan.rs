//! Library scanning, listing and file watching commands.

use std::io::Write;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::info;

use crate::db::{Filter, Sort};
use crate::library::Library;
use crate::model::Track;
use crate::scanner::ScanState;

/// Scan every configured library path, printing progress until done.
pub fn cmd_scan(rt: &Runtime, library: &Library, full: bool) -> anyhow::Result<()> {
    let roots = library.config().library().paths;
    if roots.is_empty() {
        eprintln!("No library paths configured. Use `scan --add <dir>` to add one.");
        return Ok(());
    }
    for root in &roots {
        println!("Scanning directory: {}", root.display());
    }

    rt.block_on(async {
        let handle = library.start_scan(full)?;
        while !handle.is_finished() {
            let snap = library.scan_progress();
            print!("\r[{:>3}%] {}", snap.progress, snap.status_text);
            std::io::stdout().flush()?;
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        handle.await?;
        anyhow::Ok(())
    })?;

    let snap = library.scan_progress();
    println!("\r[{:>3}%] {}", snap.progress, snap.status_text);
    let summary = &snap.results_summary;
    if full {
        println!("Purged {} existing rows.", summary.purged);
    }
    if summary.fallbacks > 0 {
        println!("{} files named from their file name.", summary.fallbacks);
    }
    for message in &summary.error_messages {
        eprintln!("  error: {message}");
    }
    if snap.state != ScanState::Completed {
        anyhow::bail!("scan {}", snap.state);
    }
    Ok(())
}

/// Options for `list`.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub page: u32,
    pub page_size: u32,
    pub sort: Option<String>,
    pub desc: bool,
    pub artist: Option<String>,
    pub favorites: bool,
    pub shuffle: bool,
    pub seed: Option<i64>,
}

impl ListOptions {
    fn filter(&self) -> Filter {
        let mut filter = Filter::new();
        if let Some(artist) = &self.artist {
            filter = filter.like("artist", format!("%{artist}%"));
        }
        if self.favorites {
            filter = filter.eq("favorite", true);
        }
        filter
    }

    fn sort(&self) -> Option<Sort> {
        self.sort.as_ref().map(|column| {
            if self.desc {
                Sort::desc(column.as_str())
            } else {
                Sort::asc(column.as_str())
            }
        })
    }
}

/// Print one page of tracks.
pub fn cmd_list(rt: &Runtime, library: &Library, options: &ListOptions) -> anyhow::Result<()> {
    let filter = options.filter();
    let (page, seed) = rt.block_on(async {
        if options.shuffle {
            let (page, seed) = library
                .shuffle_tracks(&filter, options.page, options.page_size, options.seed)
                .await?;
            anyhow::Ok((page, Some(seed)))
        } else {
            let sort = options.sort();
            let page = library
                .list_tracks(&filter, sort.as_ref(), options.page, options.page_size)
                .await?;
            anyhow::Ok((page, None))
        }
    })?;

    for track in &page.data {
        println!("{}", format_track(track));
    }
    let p = &page.pagination;
    println!("Page {} of {} ({} tracks)", p.page, p.pages, p.total);
    if let Some(seed) = seed {
        println!("Shuffle seed: {seed}");
    }
    Ok(())
}

fn format_track(track: &Track) -> String {
    let star = if track.favorite { "*" } else { " " };
    let album = track.album.as_deref().unwrap_or("-");
    format!(
        "{star}{:>6}  {} - {} [{}] {}:{:02}",
        track.id,
        track.artist,
        track.title,
        album,
        track.duration / 60,
        track.duration % 60
    )
}

/// Watch the library paths until Ctrl+C, applying changes as they arrive.
pub fn cmd_watch(rt: &Runtime, library: &Library) -> anyhow::Result<()> {
    let roots = library.config().library().paths;
    if roots.is_empty() {
        eprintln!("No library paths configured. Use `scan --add <dir>` to add one.");
        return Ok(());
    }

    let Some(handle) = library.start_watching(rt.handle().clone())? else {
        eprintln!("Watching is turned off. Set `watch_for_changes = true` under [library] in the config.");
        return Ok(());
    };
    for root in &roots {
        println!("Watching for changes in: {}", root.display());
    }
    println!("Press Ctrl+C to stop.\n");
    info!(target: "scanner::watch", roots = roots.len(), "File watcher started");

    rt.block_on(tokio::signal::ctrl_c())?;

    // The worker drives its futures on this runtime, so join it off-runtime.
    let stats = handle.stop();
    info!(target: "scanner::watch", "File watcher stopped");
    println!(
        "Processed: {} indexed, {} removed, {} errors",
        stats.indexed, stats.removed, stats.errors
    );
    Ok(())
}
