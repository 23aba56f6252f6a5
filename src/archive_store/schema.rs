//! Archive database schema.

/// Tables the reconciliation engine reads and writes. Crawlers populate
/// `songs`, `tracks`, `sources` and `artist_venues`; the engine fills in
/// the classification columns and the canonical venue table.
pub const ARCHIVE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS songs (
    id INTEGER PRIMARY KEY,
    artist_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    slug TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_songs_artist ON songs(artist_id);

CREATE TABLE IF NOT EXISTS tracks (
    id INTEGER PRIMARY KEY,
    artist_id INTEGER NOT NULL,
    title TEXT NOT NULL,
    track_kind TEXT,
    primary_song_id INTEGER,
    match_confidence REAL,
    match_method TEXT
);
CREATE INDEX IF NOT EXISTS idx_tracks_artist_unmatched ON tracks(artist_id, match_method);

CREATE TABLE IF NOT EXISTS track_songs (
    track_id INTEGER NOT NULL,
    song_id INTEGER NOT NULL,
    confidence REAL NOT NULL,
    method TEXT NOT NULL,
    position INTEGER NOT NULL,
    PRIMARY KEY (track_id, song_id)
);

CREATE TABLE IF NOT EXISTS sources (
    id INTEGER PRIMARY KEY,
    artist_id INTEGER NOT NULL,
    identifier TEXT NOT NULL,
    title TEXT NOT NULL DEFAULT '',
    source_text TEXT NOT NULL DEFAULT '',
    lineage TEXT NOT NULL DEFAULT '',
    taper_notes TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    recording_type TEXT,
    type_confidence REAL,
    type_method TEXT,
    type_reasoning TEXT
);
CREATE INDEX IF NOT EXISTS idx_sources_unclassified ON sources(recording_type);

CREATE TABLE IF NOT EXISTS artist_venues (
    id INTEGER PRIMARY KEY,
    artist_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    location TEXT NOT NULL DEFAULT '',
    latitude REAL,
    longitude REAL,
    canonical_venue_id INTEGER
);
CREATE INDEX IF NOT EXISTS idx_artist_venues_unlinked ON artist_venues(canonical_venue_id);

CREATE TABLE IF NOT EXISTS canonical_venues (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    location TEXT NOT NULL DEFAULT '',
    latitude REAL,
    longitude REAL,
    slug TEXT NOT NULL,
    past_names TEXT NOT NULL DEFAULT '[]'
);
CREATE INDEX IF NOT EXISTS idx_canonical_venues_slug ON canonical_venues(slug);
";
