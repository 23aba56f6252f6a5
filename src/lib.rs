//! Tapedeck Reconciler Library
//!
//! Reconciles messy third-party live-recording metadata into canonical
//! entities: which song a track is, what kind of recording a source is,
//! and which physical venue an artist-scoped venue record refers to.

pub mod archive_store;
pub mod background_jobs;
pub mod config;
pub mod normalize;
pub mod recording_type;
pub mod semantic;
pub mod similarity;
pub mod song_match;
pub mod venue_match;

// Re-export commonly used types for convenience
pub use archive_store::{SongStore, SourceStore, SqliteArchiveStore, VenueStore};
pub use recording_type::{ClassificationResult, RecordingType, RecordingTypeClassifier};
pub use semantic::{ClassificationCache, OpenAiModel, SemanticModel};
pub use song_match::{SongIndex, TrackSongMatcher};
pub use venue_match::VenueCanonicalizer;
