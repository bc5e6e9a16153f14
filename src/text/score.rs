//! Similarity and confidence scoring.
//!
//! [`similarity`] compares two strings on a 0..=1 scale; [`composite_score`]
//! combines title, artist, duration and year closeness into the confidence
//! used to rank online candidates.

use super::normalize::{normalize_artist, normalize_title};

/// Weight of title similarity in the composite score.
pub const TITLE_WEIGHT: f64 = 0.4;
/// Weight of artist similarity in the composite score.
pub const ARTIST_WEIGHT: f64 = 0.3;
/// Multiplier applied to candidates from the most authoritative provider.
pub const AUTHORITATIVE_BOOST: f64 = 1.1;
/// Score when one string contains the other.
const CONTAINMENT_SCORE: f64 = 0.8;

/// Duration buckets: (max absolute difference in seconds, score).
const DURATION_BUCKETS: [(u32, f64); 4] = [(2, 0.2), (5, 0.15), (10, 0.1), (20, 0.05)];
/// Year buckets: (max absolute difference in years, score).
const YEAR_BUCKETS: [(u32, f64); 3] = [(1, 0.1), (2, 0.07), (5, 0.03)];

/// The fields compared when scoring a candidate against a reference.
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchFields<'a> {
    pub title: &'a str,
    pub artist: &'a str,
    /// Duration in seconds
    pub duration: Option<u32>,
    pub year: Option<i32>,
}

/// Case-insensitive similarity in `[0, 1]`.
///
/// - `1.0` for an exact (case-insensitive) match
/// - `0.0` if either side is empty
/// - `0.8` if either string contains the other
/// - otherwise `1 - levenshtein / max_len`, counted in characters
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();

    if a == b {
        return if a.is_empty() { 0.0 } else { 1.0 };
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a.contains(&b) || b.contains(&a) {
        return CONTAINMENT_SCORE;
    }

    let max_len = a.chars().count().max(b.chars().count());
    1.0 - strsim::levenshtein(&a, &b) as f64 / max_len as f64
}

/// Score contribution for how close two durations are.
pub fn duration_term(candidate: Option<u32>, reference: Option<u32>) -> f64 {
    let (Some(a), Some(b)) = (candidate, reference) else {
        return 0.0;
    };
    let diff = a.abs_diff(b);
    DURATION_BUCKETS
        .iter()
        .find(|(max, _)| diff <= *max)
        .map_or(0.0, |(_, score)| *score)
}

/// Score contribution for how close two release years are.
pub fn year_term(candidate: Option<i32>, reference: Option<i32>) -> f64 {
    let (Some(a), Some(b)) = (candidate, reference) else {
        return 0.0;
    };
    let diff = a.abs_diff(b);
    YEAR_BUCKETS
        .iter()
        .find(|(max, _)| diff <= *max)
        .map_or(0.0, |(_, score)| *score)
}

/// Weighted confidence that `candidate` describes the same recording as
/// `reference`, rounded to two decimals.
///
/// `0.4 * title + 0.3 * artist + duration term + year term`, times 1.1 when
/// the candidate comes from the most authoritative provider. The result is
/// not clamped, so an authoritative near-perfect match can exceed 1.0.
pub fn composite_score(
    candidate: &MatchFields<'_>,
    reference: &MatchFields<'_>,
    authoritative: bool,
) -> f64 {
    let title_sim = similarity(
        &normalize_title(candidate.title),
        &normalize_title(reference.title),
    );
    let artist_sim = similarity(
        &normalize_artist(candidate.artist),
        &normalize_artist(reference.artist),
    );

    let mut score = TITLE_WEIGHT * title_sim
        + ARTIST_WEIGHT * artist_sim
        + duration_term(candidate.duration, reference.duration)
        + year_term(candidate.year, reference.year);

    if authoritative {
        score *= AUTHORITATIVE_BOOST;
    }

    (score * 100.0).round() / 100.0
}
