//! Repository contracts the engine depends on.
//!
//! The batch jobs talk to storage exclusively through these traits so tests
//! can substitute in-memory fakes and the SQL layer stays replaceable.

use super::models::{ArtistVenue, CanonicalVenue, NewCanonicalVenue, Song, SourceRecord, TrackRecord};
use crate::recording_type::ClassificationResult;
use anyhow::Result;

/// Song repository: canonical song lookup plus track match persistence.
pub trait SongStore: Send + Sync {
    /// Artists that still have tracks without a recorded match outcome.
    fn artists_with_unmatched_tracks(&self) -> Result<Vec<i64>>;

    /// Full canonical song list for one artist, in stable insertion order.
    fn songs_for_artist(&self, artist_id: i64) -> Result<Vec<Song>>;

    /// Tracks for one artist that have no recorded match outcome yet.
    /// A track persisted with an explicit "none" outcome is not returned.
    fn unmatched_tracks_for_artist(&self, artist_id: i64, limit: usize)
        -> Result<Vec<TrackRecord>>;

    /// Record a track's denormalized type and primary-match fields.
    fn persist_track_match(
        &self,
        track_id: i64,
        track_kind: &str,
        primary_song_id: Option<i64>,
        confidence: f64,
        method: &str,
    ) -> Result<()>;

    /// Upsert one (track, song) junction row; idempotent on the pair,
    /// overwriting confidence/method/position on conflict.
    fn upsert_track_song_link(
        &self,
        track_id: i64,
        song_id: i64,
        confidence: f64,
        method: &str,
        position: usize,
    ) -> Result<()>;
}

/// Venue repository: unlinked venue enumeration plus canonical CRUD.
pub trait VenueStore: Send + Sync {
    /// Up to `limit` artist-scoped venues lacking a canonical link.
    fn unlinked_venues(&self, limit: usize) -> Result<Vec<ArtistVenue>>;

    /// The full current set of canonical venues.
    fn all_canonical_venues(&self) -> Result<Vec<CanonicalVenue>>;

    /// Create a new canonical venue and return it with its assigned id.
    fn create_canonical_venue(&self, venue: NewCanonicalVenue) -> Result<CanonicalVenue>;

    /// Link an artist-scoped venue to a canonical venue.
    fn link_venue_to_canonical(&self, venue_id: i64, canonical_id: i64) -> Result<()>;
}

/// Source repository: unclassified source enumeration plus result persistence.
pub trait SourceStore: Send + Sync {
    /// Up to `limit` sources without a recorded recording-type outcome.
    /// A source persisted as `unknown` is settled and not returned again.
    fn unclassified_sources(&self, limit: usize) -> Result<Vec<SourceRecord>>;

    /// Record a source's classification outcome.
    fn persist_source_classification(
        &self,
        source_id: i64,
        result: &ClassificationResult,
    ) -> Result<()>;
}
