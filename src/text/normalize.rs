//! Title and artist normalization.
//!
//! Tag data in the wild is noisy: titles carry track numbers, file
//! extensions, "(Live)" markers and "Artist - " prefixes, and artist fields
//! hold several names joined by whatever separator the tagger liked. These
//! functions strip that noise so the entity index and the scorer compare
//! like with like.
//!
//! The display form and the identity form are deliberately separate:
//! [`normalize_title`] / [`normalize_artist`] produce strings fit for display,
//! while [`canonical_key`] produces a lossy key used only for grouping.

use once_cell::sync::Lazy;
use regex::Regex;

// ============================================================================
// Patterns
// ============================================================================

/// Audio file extensions that leak into titles derived from filenames.
static FILE_EXTENSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\.(?:mp3|flac|ogg|oga|opus|wav|m4a|aac|wma|ape|aiff?|alac|dsf)$").unwrap()
});

/// "01 - ", "03. ", "Track 5 - ", "12_" followed by a non-digit.
static TRACK_NUMBER_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:track\s*)?\d{1,3}\s*[-–—._)]\s*(\D)").unwrap()
});

/// "[01] Title"
static TRACK_NUMBER_BRACKET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[\d{1,3}\]\s*").unwrap());

/// Zero-padded number without a separator: "07 Hotel California".
static TRACK_NUMBER_SPACE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0\d\s+(\S)").unwrap());

/// Closed bracket pairs, ASCII and full-width.
static BRACKETED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s*(?:\([^)]*\)|\[[^\]]*\]|\{[^}]*\}|（[^）]*）|【[^】]*】)\s*").unwrap()
});

/// An opening bracket that never closes, through end of string.
static UNCLOSED_BRACKET: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*[(\[（【][^)\]）】]*$").unwrap());

/// Decorative tokens that trail a title, with any separator before them.
static DECORATIVE_SUFFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)[\s\-–—_:|/~]*\b(?:live|remix(?:ed)?|ost|official|lyrics?|lyric\s+video|mv|m/v|music\s+video|video|audio|hd|hq|4k|remaster(?:ed)?|explicit|clean|radio\s+edit|extended\s+mix|instrumental|karaoke|version|ver\.?)\s*$",
    )
    .unwrap()
});

/// " - 2011 Remaster", " - Live at Wembley", " - Radio Edit": a dashed
/// version tail, which would otherwise read as the title of an
/// "Artist - Title" pair. A bare year is left alone ("Artist - 1979").
static VERSION_TAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\s+[-–—]\s+(?:(?:19|20)\d{2}\s+\S|live\s+(?:at|from|in|on)\b|remaster(?:ed)?\b|remix(?:ed)?\b|(?:radio|single|album|extended|club)\s+(?:edit|mix|version)\b|(?:acoustic|demo|mono|stereo|instrumental)(?:\s+(?:version|mix|take))?\s*$).*$",
    )
    .unwrap()
});

/// "Artist - Title" with a spaced dash.
static ARTIST_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^-–—]+?\s+[-–—]\s+").unwrap());

/// A "feat."-style clause through end of string.
static FEAT_CLAUSE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s*[(\[]?\s*\b(?:feat\.?|ft\.?|featuring)(?:\s|$).*$").unwrap()
});

/// An "&" or comma joined clause through end of string.
static JOIN_CLAUSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*[&＆,，、].*$").unwrap());

static MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Artist separators, applied in order. Each pass splits every candidate
/// produced by the previous passes, so the final order follows the string.
static ARTIST_SEPARATORS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"/",
        r"／",
        r",",
        r"，",
        r"、",
        r";",
        r"；",
        r"&",
        r"＆",
        r"(?i)[\s(\[]+(?:feat\.?|ft\.?|featuring)\s+",
        r"(?i)\s+vs\.?\s+",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Characters trimmed from the ends of a cleaned title.
fn is_edge_noise(c: char) -> bool {
    c.is_whitespace() || matches!(c, '-' | '–' | '—' | '_' | ':' | '|' | '~' | '/')
}

fn collapse_whitespace(s: &str) -> String {
    MULTI_SPACE.replace_all(s, " ").trim().to_string()
}

// ============================================================================
// Public API
// ============================================================================

/// Clean a raw title for display and matching.
///
/// Strips, in order: file extension, leading track number, bracketed content,
/// a dashed version tail (" - 2011 Remaster"), trailing decorative tokens
/// ("Live", "Remix", "Official Video", ...) and a leading "Artist - " prefix.
/// A step that would empty the title is skipped.
///
/// ```
/// use tune_ledger::text::normalize_title;
/// assert_eq!(normalize_title("Hotel California (Live)"), "Hotel California");
/// assert_eq!(normalize_title("03 - Eagles - Take It Easy.mp3"), "Take It Easy");
/// ```
pub fn normalize_title(raw: &str) -> String {
    let mut title = raw.trim().to_string();

    title = FILE_EXTENSION.replace(&title, "").into_owned();
    title = TRACK_NUMBER_BRACKET.replace(&title, "").into_owned();
    title = TRACK_NUMBER_PREFIX.replace(&title, "$1").into_owned();
    title = TRACK_NUMBER_SPACE_PREFIX.replace(&title, "$1").into_owned();

    let unbracketed = BRACKETED.replace_all(&title, " ");
    let unbracketed = UNCLOSED_BRACKET.replace(&unbracketed, "");
    if !unbracketed.trim().is_empty() {
        title = unbracketed.into_owned();
    }

    title = VERSION_TAIL.replace(&title, "").into_owned();

    loop {
        let stripped = DECORATIVE_SUFFIX.replace(&title, "");
        if stripped == title || stripped.trim_matches(is_edge_noise).is_empty() {
            break;
        }
        title = stripped.into_owned();
    }

    let without_prefix = ARTIST_PREFIX.replace(&title, "");
    if !without_prefix.trim_matches(is_edge_noise).is_empty() {
        title = without_prefix.into_owned();
    }

    collapse_whitespace(title.trim_matches(is_edge_noise))
}

/// Reduce a raw artist field to its lead artist.
///
/// Drops a trailing "feat."/"ft."/"&"/","-introduced clause and bracketed
/// content. Never returns an empty string for non-blank input.
///
/// ```
/// use tune_ledger::text::normalize_artist;
/// assert_eq!(normalize_artist("Tom feat. Jerry"), "Tom");
/// ```
pub fn normalize_artist(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_feat = FEAT_CLAUSE.replace(trimmed, "");
    let without_join = JOIN_CLAUSE.replace(&without_feat, "");
    let without_brackets = BRACKETED.replace_all(&without_join, " ");

    let cleaned = collapse_whitespace(&without_brackets);
    if cleaned.is_empty() {
        collapse_whitespace(trimmed)
    } else {
        cleaned
    }
}

/// Split a multi-artist field into individual names.
///
/// Names are trimmed, empties dropped, and exact duplicates removed while
/// keeping first-seen order. Names that differ only in case or spacing are
/// kept apart here; they merge later at the [`canonical_key`] stage.
///
/// ```
/// use tune_ledger::text::split_artists;
/// assert_eq!(split_artists("A/B&C"), vec!["A", "B", "C"]);
/// ```
pub fn split_artists(raw: &str) -> Vec<String> {
    let mut parts = vec![raw.to_string()];

    for separator in ARTIST_SEPARATORS.iter() {
        parts = parts
            .iter()
            .flat_map(|part| separator.split(part).map(str::to_string).collect::<Vec<_>>())
            .collect();
    }

    let mut names: Vec<String> = Vec::with_capacity(parts.len());
    for part in parts {
        let name = collapse_whitespace(
            part.trim_matches(|c: char| c.is_whitespace() || "()[]（）".contains(c)),
        );
        if !name.is_empty() && !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

/// Identity key for grouping names: lower-case alphanumerics only.
///
/// Unicode-aware, so CJK ideographs, kana and hangul survive. Used for
/// identity only, never for display. Punctuation-only names fall back to
/// their trimmed lower-case form so they still get a stable key.
///
/// ```
/// use tune_ledger::text::canonical_key;
/// assert_eq!(canonical_key("The  Beatles!"), "thebeatles");
/// assert_eq!(canonical_key("周杰倫"), "周杰倫");
/// ```
pub fn canonical_key(name: &str) -> String {
    let key: String = name
        .chars()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_alphanumeric())
        .collect();

    if key.is_empty() {
        name.trim().to_lowercase()
    } else {
        key
    }
}
