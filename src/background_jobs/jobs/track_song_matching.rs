//! Track-to-song matching job.
//!
//! Processes every artist with unmatched tracks. Tracks run concurrently
//! through the matcher (segments within a track stay sequential); a track's
//! denormalized fields and junction rows are written only once all of its
//! segments have resolved, so the primary-match rule always sees a
//! consistent set.

use crate::background_jobs::{BackgroundJob, JobContext, JobError};
use crate::semantic::ClassificationCache;
use crate::song_match::{MatchMethod, SongIndex, TrackSongMatcher};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, error, info};

pub struct TrackSongMatchingJob {
    matcher: TrackSongMatcher,
}

impl TrackSongMatchingJob {
    pub fn new(cache: Arc<ClassificationCache>) -> Self {
        Self {
            matcher: TrackSongMatcher::new(cache),
        }
    }
}

#[async_trait]
impl BackgroundJob for TrackSongMatchingJob {
    fn id(&self) -> &'static str {
        "track_song_matching"
    }

    fn name(&self) -> &'static str {
        "Track Song Matching"
    }

    fn description(&self) -> &'static str {
        "Match unprocessed track titles to canonical songs per artist"
    }

    async fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        let artist_ids = ctx.song_store.artists_with_unmatched_tracks().map_err(|e| {
            JobError::ExecutionFailed(format!("Failed to list artists with unmatched tracks: {}", e))
        })?;

        info!("Matching tracks for {} artists", artist_ids.len());

        for artist_id in artist_ids {
            if ctx.is_cancelled() {
                return Err(JobError::Cancelled);
            }
            self.match_artist(ctx, artist_id).await?;
        }

        Ok(())
    }
}

impl TrackSongMatchingJob {
    async fn match_artist(&self, ctx: &JobContext, artist_id: i64) -> Result<(), JobError> {
        let songs = ctx.song_store.songs_for_artist(artist_id).map_err(|e| {
            JobError::ExecutionFailed(format!("Failed to load songs for artist {}: {}", artist_id, e))
        })?;
        let index = SongIndex::new(songs);

        let tracks = ctx
            .song_store
            .unmatched_tracks_for_artist(artist_id, ctx.settings.batch_size)
            .map_err(|e| {
                JobError::ExecutionFailed(format!(
                    "Failed to load tracks for artist {}: {}",
                    artist_id, e
                ))
            })?;

        info!(
            artist_id,
            tracks = tracks.len(),
            songs = index.len(),
            "Matching artist tracks"
        );

        let mut matched = 0u32;
        let mut unmatched = 0u32;
        let mut non_song = 0u32;
        let mut errors = 0u32;

        let mut decisions = stream::iter(tracks)
            .map(|track| {
                let matcher = &self.matcher;
                let index = &index;
                let cancel = &ctx.cancellation_token;
                let allow_escalation = ctx.settings.allow_escalation;
                async move {
                    let decision = matcher
                        .decide(&track.title, index, allow_escalation, cancel)
                        .await;
                    (track, decision)
                }
            })
            .buffer_unordered(ctx.settings.worker_pool_size.max(1));

        while let Some((track, decision)) = decisions.next().await {
            if ctx.is_cancelled() {
                return Err(JobError::Cancelled);
            }

            // All segment matches are resolved before anything is written.
            let (primary_song_id, confidence, method) = match decision.primary() {
                Some(primary) => (primary.song_id, primary.confidence, primary.method),
                None => (None, 0.0, MatchMethod::None),
            };

            if let Err(e) = ctx.song_store.persist_track_match(
                track.id,
                decision.track_kind.as_str(),
                primary_song_id,
                confidence,
                method.as_str(),
            ) {
                error!(
                    artist_id,
                    track_id = track.id,
                    title = %track.title,
                    error = %e,
                    "Failed to persist track match"
                );
                errors += 1;
                continue;
            }

            for segment_match in decision.matches.iter() {
                let Some(song_id) = segment_match.song_id else {
                    continue;
                };
                if let Err(e) = ctx.song_store.upsert_track_song_link(
                    track.id,
                    song_id,
                    segment_match.confidence,
                    segment_match.method.as_str(),
                    segment_match.position,
                ) {
                    error!(
                        artist_id,
                        track_id = track.id,
                        song_id,
                        error = %e,
                        "Failed to upsert track-song link"
                    );
                    errors += 1;
                }
            }

            if !decision.matches.is_empty() {
                if primary_song_id.is_some() {
                    matched += 1;
                } else {
                    unmatched += 1;
                }
            } else {
                non_song += 1;
                debug!(
                    track_id = track.id,
                    kind = decision.track_kind.as_str(),
                    "Track typed as non-song"
                );
            }
        }

        info!(
            artist_id, matched, unmatched, non_song, errors,
            "Artist track matching complete"
        );

        Ok(())
    }
}
