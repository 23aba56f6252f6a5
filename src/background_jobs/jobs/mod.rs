//! Specific reconciliation job implementations.

pub mod recording_type_classification;
pub mod track_song_matching;
pub mod venue_canonicalization;

pub use recording_type_classification::RecordingTypeClassificationJob;
pub use track_song_matching::TrackSongMatchingJob;
pub use venue_canonicalization::VenueCanonicalizationJob;
