//! Track title normalization and segmentation.
//!
//! Raw track titles from upstream providers carry file extensions, track
//! and set prefixes, segue notation and annotations. `normalize_title`
//! reduces a raw title to an ordered list of cleaned segments, each tagged
//! with the kind of content it appears to be.

use super::slug::slugify;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// What a normalized segment appears to contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Song,
    Banter,
    Tuning,
    Crowd,
    Soundcheck,
    Intro,
    Jam,
    Unknown,
}

impl SegmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentKind::Song => "song",
            SegmentKind::Banter => "banter",
            SegmentKind::Tuning => "tuning",
            SegmentKind::Crowd => "crowd",
            SegmentKind::Soundcheck => "soundcheck",
            SegmentKind::Intro => "intro",
            SegmentKind::Jam => "jam",
            SegmentKind::Unknown => "unknown",
        }
    }
}

/// One song-candidate extracted from a raw track title.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSegment {
    /// The raw title this segment was extracted from.
    pub original_title: String,
    /// The cleaned segment text.
    pub name: String,
    /// Zero-based position within the segue chain.
    pub position: usize,
    /// Whether this segment segues directly into the next one.
    pub segued_into_next: bool,
    /// Detected content kind.
    pub kind: SegmentKind,
    /// Slug derived from the cleaned name.
    pub slug: String,
}

const AUDIO_EXTENSIONS: &[&str] = &[
    ".mp3", ".flac", ".shn", ".ogg", ".wav", ".m4a", ".aiff", ".aif", ".ape", ".wma",
];

lazy_static! {
    // "Set II: ", "Set 2 - ", "Encore: ", "E: "
    static ref SET_PREFIX_RE: Regex =
        Regex::new(r"(?i)^\s*(?:set\s+[ivx\d]+|encore|e)\s*[:\-]\s*").unwrap();
    // "d2t03 ", "D1T12."
    static ref DISC_TRACK_PREFIX_RE: Regex =
        Regex::new(r"(?i)^\s*d\d{1,2}t\d{1,3}[\s._\-]+").unwrap();
    // "01 ", "05. ", "12 - "
    static ref NUMERIC_PREFIX_RE: Regex = Regex::new(r"^\s*\d{1,3}[\s._\-]+").unwrap();
    // "->" must come before ">" in the alternation
    static ref SEGUE_SPLIT_RE: Regex = Regex::new(r"\s*(?:->|→|>>|>)\s*").unwrap();
    // "(jam)", "[tease]", "(reprise) (cut)" at the end of a segment
    static ref TRAILING_ANNOTATION_RE: Regex =
        Regex::new(r"(?:\s*[(\[][^)\]]*[)\]])+\s*$").unwrap();
}

// Non-song vocabulary, in priority order: the first category whose keyword
// appears in the lower-cased segment wins.
const BANTER_KEYWORDS: &[&str] = &["banter", "stage talk", "crowd talk"];
const TUNING_KEYWORDS: &[&str] = &["tuning", "tune-up", "tuneup"];
const CROWD_KEYWORDS: &[&str] = &["crowd", "applause", "audience", "cheering"];
const SOUNDCHECK_KEYWORDS: &[&str] = &["soundcheck", "sound check"];
const INTRO_KEYWORDS: &[&str] = &["intro", "introduction", "opening announcement"];
const JAM_KEYWORDS: &[&str] = &["jam", "drums", "space", "improv"];
const NON_SONG_KEYWORDS: &[&str] = &["interview", "announcement", "setbreak", "set break", "filler"];

/// Normalize a raw track title into ordered, cleaned segments.
///
/// Steps, in order: strip a trailing audio file extension, strip a leading
/// set/track index prefix, split on segue markers, strip trailing bracketed
/// annotations per segment, collapse whitespace, classify each segment.
/// Empty titles produce an empty list.
///
/// Re-normalizing a segment's `name` yields the same string.
pub fn normalize_title(raw_title: &str) -> Vec<NormalizedSegment> {
    let mut title = strip_extension(raw_title.trim()).to_string();
    title = SET_PREFIX_RE.replace(&title, "").into_owned();
    title = DISC_TRACK_PREFIX_RE.replace(&title, "").into_owned();
    title = NUMERIC_PREFIX_RE.replace(&title, "").into_owned();

    let cleaned: Vec<String> = SEGUE_SPLIT_RE
        .split(&title)
        .map(clean_segment)
        .filter(|name| !name.is_empty())
        .collect();

    let count = cleaned.len();
    cleaned
        .into_iter()
        .enumerate()
        .map(|(position, name)| {
            let kind = classify_segment(&name);
            let slug = slugify(&name);
            NormalizedSegment {
                original_title: raw_title.to_string(),
                name,
                position,
                segued_into_next: position + 1 < count,
                kind,
                slug,
            }
        })
        .collect()
}

fn strip_extension(title: &str) -> &str {
    let lower = title.to_lowercase();
    for ext in AUDIO_EXTENSIONS {
        if lower.ends_with(ext) {
            return &title[..title.len() - ext.len()];
        }
    }
    title
}

fn clean_segment(segment: &str) -> String {
    let stripped = TRAILING_ANNOTATION_RE.replace(segment, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn classify_segment(name: &str) -> SegmentKind {
    let lower = name.to_lowercase();
    let categories: &[(&[&str], SegmentKind)] = &[
        (BANTER_KEYWORDS, SegmentKind::Banter),
        (TUNING_KEYWORDS, SegmentKind::Tuning),
        (CROWD_KEYWORDS, SegmentKind::Crowd),
        (SOUNDCHECK_KEYWORDS, SegmentKind::Soundcheck),
        (INTRO_KEYWORDS, SegmentKind::Intro),
        (JAM_KEYWORDS, SegmentKind::Jam),
        (NON_SONG_KEYWORDS, SegmentKind::Unknown),
    ];

    for (keywords, kind) in categories {
        if keywords.iter().any(|kw| lower.contains(kw)) {
            return *kind;
        }
    }
    SegmentKind::Song
}
