//! iTunes Search integration
//!
//! Searches the iTunes store catalogue for songs. Useful for album, year
//! and high resolution artwork.
//!
//! API docs: https://performance-partners.apple.com/search-api

pub mod dto;
mod adapter;
mod client;

pub use adapter::to_candidate;
pub use client::ItunesClient;
