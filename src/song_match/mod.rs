//! Track-to-song matching for one artist's batch.
//!
//! Each normalized title segment runs through an ordered cascade of
//! matching layers: exact slug/name lookup, fuzzy edit-distance scoring,
//! then (when allowed) the semantic model over a bounded candidate list.
//! The cascade is an explicit list so each layer is testable on its own.

use crate::archive_store::Song;
use crate::normalize::{normalize_title, NormalizedSegment, SegmentKind};
use crate::semantic::ClassificationCache;
use crate::similarity::similarity;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Confidence assigned to an exact slug or name hit.
pub const SLUG_MATCH_CONFIDENCE: f64 = 0.95;
/// Minimum similarity for the fuzzy layer to accept its best candidate.
pub const FUZZY_ACCEPT_THRESHOLD: f64 = 0.75;
/// Fuzzy confidence is the similarity scaled down by this factor.
pub const FUZZY_CONFIDENCE_SCALE: f64 = 0.8;
/// Minimum model confidence for the model layer to accept an answer.
pub const MODEL_ACCEPT_CONFIDENCE: f64 = 0.6;
/// Maximum candidate song names presented to the model.
pub const MODEL_CANDIDATE_LIMIT: usize = 200;

/// How a track-song pairing was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMethod {
    Slug,
    Fuzzy,
    Llm,
    None,
}

impl MatchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMethod::Slug => "slug",
            MatchMethod::Fuzzy => "fuzzy",
            MatchMethod::Llm => "llm",
            MatchMethod::None => "none",
        }
    }
}

/// One (segment, canonical song) candidate pairing.
#[derive(Debug, Clone)]
pub struct TrackMatch {
    pub segment_name: String,
    pub position: usize,
    pub song_id: Option<i64>,
    pub song_name: Option<String>,
    pub confidence: f64,
    pub method: MatchMethod,
}

impl TrackMatch {
    fn resolved(segment: &NormalizedSegment, song: &Song, confidence: f64, method: MatchMethod) -> Self {
        Self {
            segment_name: segment.name.clone(),
            position: segment.position,
            song_id: Some(song.id),
            song_name: Some(song.name.clone()),
            confidence,
            method,
        }
    }

    fn unresolved(segment: &NormalizedSegment) -> Self {
        Self {
            segment_name: segment.name.clone(),
            position: segment.position,
            song_id: None,
            song_name: None,
            confidence: 0.0,
            method: MatchMethod::None,
        }
    }
}

/// The full decision for one track: its detected kind plus per-segment matches.
#[derive(Debug, Clone)]
pub struct TrackDecision {
    pub track_kind: SegmentKind,
    pub matches: Vec<TrackMatch>,
}

impl TrackDecision {
    /// The highest-confidence resolved match; ties broken by encounter order.
    pub fn primary(&self) -> Option<&TrackMatch> {
        let mut best: Option<&TrackMatch> = None;
        for candidate in self.matches.iter().filter(|m| m.song_id.is_some()) {
            match best {
                Some(current) if candidate.confidence <= current.confidence => {}
                _ => best = Some(candidate),
            }
        }
        best
    }
}

/// One artist's canonical songs, indexed for exact lookup.
///
/// Song order is preserved from the repository so fuzzy ties resolve to the
/// first-seen candidate.
pub struct SongIndex {
    songs: Vec<Song>,
    by_slug: HashMap<String, usize>,
    by_name: HashMap<String, usize>,
}

impl SongIndex {
    pub fn new(songs: Vec<Song>) -> Self {
        let mut by_slug = HashMap::new();
        let mut by_name = HashMap::new();
        for (idx, song) in songs.iter().enumerate() {
            by_slug.entry(song.slug.clone()).or_insert(idx);
            by_name.entry(song.name.to_lowercase()).or_insert(idx);
        }
        Self {
            songs,
            by_slug,
            by_name,
        }
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    fn lookup_exact(&self, segment: &NormalizedSegment) -> Option<&Song> {
        self.by_slug
            .get(&segment.slug)
            .or_else(|| self.by_name.get(&segment.name.to_lowercase()))
            .map(|&idx| &self.songs[idx])
    }

    fn lookup_name_ci(&self, name: &str) -> Option<&Song> {
        self.by_name.get(&name.to_lowercase()).map(|&idx| &self.songs[idx])
    }

    fn iter(&self) -> impl Iterator<Item = &Song> {
        self.songs.iter()
    }

    /// Up to `limit` song names, alphabetical, for the model candidate list.
    fn candidate_names(&self, limit: usize) -> Vec<&str> {
        let mut names: Vec<&str> = self.songs.iter().map(|s| s.name.as_str()).collect();
        names.sort_by_key(|name| name.to_lowercase());
        names.truncate(limit);
        names
    }
}

/// Matching layers in cascade order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchLayer {
    Slug,
    Fuzzy,
    Model,
}

const MATCH_LAYERS: [MatchLayer; 3] = [MatchLayer::Slug, MatchLayer::Fuzzy, MatchLayer::Model];

const SONG_MATCH_SYSTEM_PROMPT: &str = r#"You match a live-concert track segment title to one song from an artist's repertoire.

The user message contains the segment title and the candidate song list. Answer with a
JSON object: {"song_name": "...", "confidence": 0.0-1.0}. The song_name must be copied
verbatim from the candidate list. If no candidate is plausibly the same song, answer
{"song_name": null, "confidence": 0.0}. Abbreviations, nicknames and misspellings of a
candidate count as matches; a different song with a similar title does not."#;

#[derive(Debug, Deserialize)]
struct ModelSongResponse {
    song_name: Option<String>,
    confidence: f64,
}

/// Three-layer matcher mapping normalized track segments to canonical songs.
pub struct TrackSongMatcher {
    cache: Arc<ClassificationCache>,
}

impl TrackSongMatcher {
    pub fn new(cache: Arc<ClassificationCache>) -> Self {
        Self { cache }
    }

    /// Decide the kind and song matches for one raw track title.
    ///
    /// A track whose first segment is not a song gets its kind recorded and
    /// no matching; otherwise every song-typed segment runs the cascade.
    pub async fn decide(
        &self,
        raw_title: &str,
        index: &SongIndex,
        allow_escalation: bool,
        cancel: &CancellationToken,
    ) -> TrackDecision {
        let segments = normalize_title(raw_title);

        let Some(first) = segments.first() else {
            return TrackDecision {
                track_kind: SegmentKind::Unknown,
                matches: Vec::new(),
            };
        };

        if first.kind != SegmentKind::Song {
            return TrackDecision {
                track_kind: first.kind,
                matches: Vec::new(),
            };
        }

        let mut matches = Vec::new();
        for segment in segments.iter().filter(|s| s.kind == SegmentKind::Song) {
            matches.push(
                self.match_segment(segment, index, allow_escalation, cancel)
                    .await,
            );
        }

        TrackDecision {
            track_kind: SegmentKind::Song,
            matches,
        }
    }

    async fn match_segment(
        &self,
        segment: &NormalizedSegment,
        index: &SongIndex,
        allow_escalation: bool,
        cancel: &CancellationToken,
    ) -> TrackMatch {
        for layer in MATCH_LAYERS {
            let result = match layer {
                MatchLayer::Slug => slug_layer(segment, index),
                MatchLayer::Fuzzy => fuzzy_layer(segment, index),
                MatchLayer::Model if allow_escalation => {
                    self.model_layer(segment, index, cancel).await
                }
                MatchLayer::Model => None,
            };
            if let Some(matched) = result {
                return matched;
            }
        }

        // Terminal outcome: the segment is settled as unmatched, not retried.
        TrackMatch::unresolved(segment)
    }

    async fn model_layer(
        &self,
        segment: &NormalizedSegment,
        index: &SongIndex,
        cancel: &CancellationToken,
    ) -> Option<TrackMatch> {
        let candidates = index.candidate_names(MODEL_CANDIDATE_LIMIT);
        if candidates.is_empty() {
            return None;
        }

        let user_content = format!(
            "Segment: \"{}\"\n\nCandidates:\n{}",
            segment.name,
            candidates.join("\n")
        );

        let response: ModelSongResponse = self
            .cache
            .classify(SONG_MATCH_SYSTEM_PROMPT, &user_content, "song-match", cancel)
            .await?;

        let answer = response.song_name?;
        if response.confidence < MODEL_ACCEPT_CONFIDENCE {
            debug!(segment = %segment.name, answer = %answer, "model answer below confidence gate");
            return None;
        }
        // Only accept names that appear verbatim in the candidate list.
        if !candidates
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(&answer))
        {
            debug!(segment = %segment.name, answer = %answer, "model answer not in candidate list");
            return None;
        }

        let song = index.lookup_name_ci(&answer)?;
        Some(TrackMatch::resolved(
            segment,
            song,
            response.confidence.clamp(0.0, 1.0),
            MatchMethod::Llm,
        ))
    }
}

fn slug_layer(segment: &NormalizedSegment, index: &SongIndex) -> Option<TrackMatch> {
    index
        .lookup_exact(segment)
        .map(|song| TrackMatch::resolved(segment, song, SLUG_MATCH_CONFIDENCE, MatchMethod::Slug))
}

fn fuzzy_layer(segment: &NormalizedSegment, index: &SongIndex) -> Option<TrackMatch> {
    let needle = segment.name.to_lowercase();
    let mut best: Option<(&Song, f64)> = None;

    for song in index.iter() {
        let score = similarity(&needle, &song.name.to_lowercase());
        // Strictly-greater keeps the first-seen candidate on ties.
        if best.map(|(_, s)| score > s).unwrap_or(true) {
            best = Some((song, score));
        }
    }

    let (song, score) = best?;
    if score < FUZZY_ACCEPT_THRESHOLD {
        return None;
    }

    Some(TrackMatch::resolved(
        segment,
        song,
        score * FUZZY_CONFIDENCE_SCALE,
        MatchMethod::Fuzzy,
    ))
}
