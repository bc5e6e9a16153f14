//! CLI command definitions and dispatch.
//!
//! Each group of subcommands is implemented in its own submodule:
//! - `scan`: Library scanning, listing and file watching
//! - `query`: Entity browsing, favorites and online search

mod query;
mod scan;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::runtime::Runtime;

pub use query::{cmd_albums, cmd_artists, cmd_favorite, cmd_plugins, cmd_recount, cmd_search};
pub use scan::{ListOptions, cmd_list, cmd_scan, cmd_watch};

use crate::config;
use crate::library::Library;

/// Tune Ledger CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Scan the configured library paths
    Scan {
        /// Delete existing rows under each root before indexing
        #[arg(long)]
        full: bool,
        /// Add a directory to the library paths before scanning
        #[arg(long)]
        add: Option<PathBuf>,
    },
    /// List tracks in the library
    List {
        /// Page number, starting at 1
        #[arg(long, default_value = "1")]
        page: u32,
        /// Tracks per page
        #[arg(long, default_value = "50")]
        page_size: u32,
        /// Column to sort by (title, artist, album, year, duration, ...)
        #[arg(long)]
        sort: Option<String>,
        /// Sort descending
        #[arg(long)]
        desc: bool,
        /// Only tracks whose artist field contains this text
        #[arg(long)]
        artist: Option<String>,
        /// Only favorite tracks
        #[arg(long)]
        favorites: bool,
        /// Random order; pass the printed seed back to continue paging
        #[arg(long)]
        shuffle: bool,
        /// Seed for --shuffle
        #[arg(long, requires = "shuffle")]
        seed: Option<i64>,
    },
    /// Search online providers for a recording
    Search {
        /// Track title
        title: String,
        /// Artist name
        artist: String,
        /// Only query this provider
        #[arg(long)]
        plugin: Option<String>,
        /// Reference duration in seconds
        #[arg(long)]
        duration: Option<u32>,
        /// Reference release year
        #[arg(long)]
        year: Option<i32>,
        /// Show the best lyrics match instead of candidates
        #[arg(long)]
        lyrics: bool,
    },
    /// List registered online providers
    Plugins,
    /// Mark a track as favorite
    Favorite {
        /// Track id
        id: i64,
        /// Clear the favorite flag instead
        #[arg(long)]
        off: bool,
    },
    /// Watch the library paths and apply changes until Ctrl+C
    Watch,
    /// Recompute artist and album counts
    Recount,
    /// List artists
    Artists {
        #[arg(long, default_value = "1")]
        page: u32,
        #[arg(long, default_value = "50")]
        page_size: u32,
    },
    /// List albums
    Albums {
        #[arg(long, default_value = "1")]
        page: u32,
        #[arg(long, default_value = "50")]
        page_size: u32,
    },
}

/// Run the specified CLI command.
///
/// Returns `Ok(true)` if a command was run, `Ok(false)` if no command was
/// specified.
pub fn run_command(cli: &Cli) -> anyhow::Result<bool> {
    let Some(command) = &cli.command else {
        return Ok(false);
    };

    let rt = Runtime::new()?;

    if let Commands::Scan { add: Some(dir), .. } = command {
        add_library_path(dir)?;
    }

    let library = open_library(&rt)?;

    match command {
        Commands::Scan { full, .. } => cmd_scan(&rt, &library, *full)?,
        Commands::List {
            page,
            page_size,
            sort,
            desc,
            artist,
            favorites,
            shuffle,
            seed,
        } => {
            let options = ListOptions {
                page: *page,
                page_size: *page_size,
                sort: sort.clone(),
                desc: *desc,
                artist: artist.clone(),
                favorites: *favorites,
                shuffle: *shuffle,
                seed: *seed,
            };
            cmd_list(&rt, &library, &options)?
        }
        Commands::Search {
            title,
            artist,
            plugin,
            duration,
            year,
            lyrics,
        } => cmd_search(
            &rt,
            &library,
            title,
            artist,
            plugin.as_deref(),
            *duration,
            *year,
            *lyrics,
        )?,
        Commands::Plugins => cmd_plugins(&library),
        Commands::Favorite { id, off } => cmd_favorite(&rt, &library, *id, !*off)?,
        Commands::Watch => cmd_watch(&rt, &library)?,
        Commands::Recount => cmd_recount(&rt, &library)?,
        Commands::Artists { page, page_size } => cmd_artists(&rt, &library, *page, *page_size)?,
        Commands::Albums { page, page_size } => cmd_albums(&rt, &library, *page, *page_size)?,
    }
    Ok(true)
}

// ============================================================================
// Shared helper functions
// ============================================================================

/// Open the library described by the user's config file.
fn open_library(rt: &Runtime) -> anyhow::Result<Library> {
    let config = config::load();
    let library = rt.block_on(Library::open(config, config::config_path()))?;
    Ok(library)
}

/// Persist an extra library root in the config file.
fn add_library_path(dir: &std::path::Path) -> anyhow::Result<()> {
    let dir = dir.canonicalize()?;
    let mut config = config::load();
    if !config.library.paths.contains(&dir) {
        config.library.paths.push(dir.clone());
        config::save(&config)?;
        println!("Added library path: {}", dir.display());
    }
    Ok(())
}
