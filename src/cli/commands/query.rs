//! Browsing, favorites and online search commands.

use tokio::runtime::Runtime;

use crate::db::{Filter, Sort};
use crate::enrichment::{EmptyReason, OnlineCandidate, SearchOutcome, SearchQuery};
use crate::library::Library;

/// Search online providers and print ranked candidates.
#[allow(clippy::too_many_arguments)]
pub fn cmd_search(
    rt: &Runtime,
    library: &Library,
    title: &str,
    artist: &str,
    plugin: Option<&str>,
    duration: Option<u32>,
    year: Option<i32>,
    lyrics: bool,
) -> anyhow::Result<()> {
    if lyrics {
        let found = rt.block_on(library.search_lyrics(title, artist, plugin))?;
        match found.and_then(|c| c.lyrics.clone().map(|l| (c, l))) {
            Some((candidate, text)) => {
                println!("{} - {} ({})\n", candidate.artist, candidate.title, candidate.source);
                println!("{text}");
            }
            None => println!("No lyrics found."),
        }
        return Ok(());
    }

    let query = SearchQuery {
        title: title.to_string(),
        artist: artist.to_string(),
        duration,
        year,
    };
    match rt.block_on(library.search_online(&query, plugin))? {
        SearchOutcome::Found(candidates) => {
            for (rank, candidate) in candidates.iter().enumerate() {
                println!("{:>2}. {}", rank + 1, format_candidate(candidate));
            }
        }
        SearchOutcome::Empty(reason) => println!("{}", describe_empty(reason)),
    }
    Ok(())
}

fn format_candidate(candidate: &OnlineCandidate) -> String {
    let mut line = format!(
        "[{:.2}] {} - {}",
        candidate.score, candidate.artist, candidate.title
    );
    if let Some(album) = &candidate.album {
        line.push_str(&format!(" [{album}]"));
    }
    if let Some(year) = candidate.year {
        line.push_str(&format!(" ({year})"));
    }
    line.push_str(&format!(" via {}", candidate.source));
    if candidate.lyrics.is_some() {
        line.push_str(" +lyrics");
    }
    line
}

fn describe_empty(reason: EmptyReason) -> &'static str {
    match reason {
        EmptyReason::NoProviders => "No online providers are enabled.",
        EmptyReason::AllProvidersFailed => "Every provider failed or timed out.",
        EmptyReason::NoMatches => "No matches found.",
    }
}

/// Print the registered providers.
pub fn cmd_plugins(library: &Library) {
    let plugins = library.list_plugins();
    if plugins.is_empty() {
        println!("No providers enabled.");
    }
    for plugin in plugins {
        println!("{:<12} {:<8} {}", plugin.name, plugin.version, plugin.description);
    }
}

/// Set or clear a track's favorite flag.
pub fn cmd_favorite(rt: &Runtime, library: &Library, id: i64, favorite: bool) -> anyhow::Result<()> {
    rt.block_on(library.upsert_favorite(id, favorite))?;
    let state = if favorite { "added to" } else { "removed from" };
    println!("Track {id} {state} favorites.");
    Ok(())
}

/// Repair artist and album counts.
pub fn cmd_recount(rt: &Runtime, library: &Library) -> anyhow::Result<()> {
    let summary = rt.block_on(library.recount())?;
    println!(
        "Recount complete: {} artists and {} albums corrected.",
        summary.artists, summary.albums
    );
    Ok(())
}

pub fn cmd_artists(rt: &Runtime, library: &Library, page: u32, page_size: u32) -> anyhow::Result<()> {
    let artists = rt.block_on(library.list_artists(
        &Filter::new(),
        Some(&Sort::asc("name")),
        page,
        page_size,
    ))?;
    for artist in &artists.data {
        println!(
            "{:>6}  {} ({} tracks, {} albums)",
            artist.id, artist.name, artist.track_count, artist.album_count
        );
    }
    let p = &artists.pagination;
    println!("Page {} of {} ({} artists)", p.page, p.pages, p.total);
    Ok(())
}

pub fn cmd_albums(rt: &Runtime, library: &Library, page: u32, page_size: u32) -> anyhow::Result<()> {
    let albums = rt.block_on(library.list_albums(
        &Filter::new(),
        Some(&Sort::asc("title")),
        page,
        page_size,
    ))?;
    for album in &albums.data {
        let year = album.year.map(|y| format!(" ({y})")).unwrap_or_default();
        println!(
            "{:>6}  {} - {}{} ({} tracks)",
            album.id, album.primary_artist, album.title, year, album.track_count
        );
    }
    let p = &albums.pagination;
    println!("Page {} of {} ({} albums)", p.page, p.pages, p.total);
    Ok(())
}
