//! LRCLIB integration
//!
//! Searches the LRCLIB lyrics database. Records carry plain and synced
//! lyrics, which makes LRCLIB the default authoritative provider.
//!
//! API docs: https://lrclib.net/docs

pub mod dto;
mod adapter;
mod client;

pub use adapter::to_candidate;
pub use client::LrclibClient;
