//! Row types for the archive database.

use crate::recording_type::SourceMetadata;

/// A canonical song in an artist's repertoire.
#[derive(Debug, Clone, PartialEq)]
pub struct Song {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

/// One recorded track awaiting song matching.
#[derive(Debug, Clone)]
pub struct TrackRecord {
    pub id: i64,
    pub artist_id: i64,
    pub title: String,
}

/// Raw provider metadata for one recording source.
#[derive(Debug, Clone)]
pub struct SourceRecord {
    pub id: i64,
    pub artist_id: i64,
    pub identifier: String,
    pub title: String,
    pub source: String,
    pub lineage: String,
    pub taper_notes: String,
    pub description: String,
}

impl SourceRecord {
    pub fn metadata(&self) -> SourceMetadata {
        SourceMetadata {
            identifier: self.identifier.clone(),
            title: self.title.clone(),
            source: self.source.clone(),
            lineage: self.lineage.clone(),
            taper_notes: self.taper_notes.clone(),
            description: self.description.clone(),
        }
    }
}

/// Fields for inserting a new source record.
#[derive(Debug, Clone, Default)]
pub struct NewSource {
    pub identifier: String,
    pub title: String,
    pub source: String,
    pub lineage: String,
    pub taper_notes: String,
    pub description: String,
}

/// An artist-scoped venue record awaiting canonicalization.
#[derive(Debug, Clone)]
pub struct ArtistVenue {
    pub id: i64,
    pub artist_id: i64,
    pub name: String,
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// An artist-independent physical venue.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalVenue {
    pub id: i64,
    pub name: String,
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub slug: String,
    pub past_names: Vec<String>,
}

/// Fields for creating a new canonical venue.
#[derive(Debug, Clone)]
pub struct NewCanonicalVenue {
    pub name: String,
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub slug: String,
    pub past_names: Vec<String>,
}
