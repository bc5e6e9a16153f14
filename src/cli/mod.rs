//! Command-line interface for tune-ledger.
//!
//! This module provides CLI commands for scanning, browsing, watching and
//! searching online metadata for the library.

mod commands;

pub use commands::{Cli, Commands, run_command};
