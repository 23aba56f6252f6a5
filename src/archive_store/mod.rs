//! SQLite-backed persistence for the reconciliation engine.
//!
//! The wider relational catalog (shows, crawl state, popularity) lives with
//! the API server; this module implements only the collaborator contracts
//! the engine needs: the song repository, the venue repository, and the
//! keyed cache store fronting the semantic model.

mod models;
mod schema;
mod sqlite_cache_store;
mod sqlite_store;
mod trait_def;

pub use models::{
    ArtistVenue, CanonicalVenue, NewCanonicalVenue, NewSource, Song, SourceRecord, TrackRecord,
};
pub use sqlite_cache_store::SqliteCacheStore;
pub use sqlite_store::SqliteArchiveStore;
pub use trait_def::{SongStore, SourceStore, VenueStore};
