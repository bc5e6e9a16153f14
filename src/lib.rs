//! Tune Ledger - a personal music library indexer.
//!
//! Scans local folders, reads audio tags into a SQLite catalogue of tracks,
//! artists and albums, keeps it in sync with the filesystem, and searches
//! online providers for metadata and lyrics. [`library::Library`] is the
//! operation surface; the [`cli`] module drives it from the command line.

pub mod cli;
pub mod config;
pub mod db;
pub mod enrichment;
pub mod error;
pub mod index;
pub mod library;
pub mod metadata;
pub mod model;
pub mod scanner;
#[cfg(test)]
pub mod test_utils;
pub mod text;

pub use error::{Error, Result};
pub use library::Library;
