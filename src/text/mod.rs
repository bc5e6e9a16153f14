//! Text normalization and similarity scoring.
//!
//! Everything in here is a pure function over strings. The scanner uses the
//! normalizers to clean tag data before it reaches the entity index, and the
//! enrichment service uses the scorer to rank online candidates.
//!
//! - [`normalize`]: title/artist cleanup, artist splitting, canonical keys
//! - [`score`]: string similarity and the weighted composite score

pub mod normalize;
pub mod score;

pub use normalize::{canonical_key, normalize_artist, normalize_title, split_artists};
pub use score::{MatchFields, composite_score, similarity};
