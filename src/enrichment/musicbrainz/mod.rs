//! MusicBrainz API integration
//!
//! Searches recordings by title and artist. Candidates carry the release
//! they appear on and a Cover Art Archive URL for that release.
//!
//! API docs: https://musicbrainz.org/doc/MusicBrainz_API

pub mod dto;
mod adapter;
mod client;

pub use adapter::to_candidate;
pub use client::MusicBrainzClient;
