use super::models::{
    ArtistVenue, CanonicalVenue, NewCanonicalVenue, NewSource, Song, SourceRecord, TrackRecord,
};
use super::schema::ARCHIVE_SCHEMA;
use super::trait_def::{SongStore, SourceStore, VenueStore};
use crate::normalize::slugify;
use crate::recording_type::ClassificationResult;
use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

/// SQLite implementation of the song, venue and source repositories.
pub struct SqliteArchiveStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteArchiveStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path = db_path.as_ref();
        let is_new_db = !path.exists();

        let conn = Connection::open(path).context("Failed to open archive database")?;
        conn.execute("PRAGMA foreign_keys = ON;", [])?;
        conn.execute_batch(ARCHIVE_SCHEMA)
            .context("Failed to create archive schema")?;

        if is_new_db {
            info!("Created new archive database at {:?}", path);
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn row_to_canonical(row: &rusqlite::Row) -> rusqlite::Result<CanonicalVenue> {
        let past_names_json: String = row.get("past_names")?;
        Ok(CanonicalVenue {
            id: row.get("id")?,
            name: row.get("name")?,
            location: row.get("location")?,
            latitude: row.get("latitude")?,
            longitude: row.get("longitude")?,
            slug: row.get("slug")?,
            past_names: serde_json::from_str(&past_names_json).unwrap_or_default(),
        })
    }

    // =========================================================================
    // Ingestion-side inserts (used by crawler import and tests)
    // =========================================================================

    pub fn insert_song(&self, artist_id: i64, name: &str) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO songs (artist_id, name, slug) VALUES (?1, ?2, ?3)",
            params![artist_id, name, slugify(name)],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn insert_track(&self, artist_id: i64, title: &str) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO tracks (artist_id, title) VALUES (?1, ?2)",
            params![artist_id, title],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn insert_source(&self, artist_id: i64, source: &NewSource) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO sources
                (artist_id, identifier, title, source_text, lineage, taper_notes, description)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                artist_id,
                source.identifier,
                source.title,
                source.source,
                source.lineage,
                source.taper_notes,
                source.description,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn insert_artist_venue(
        &self,
        artist_id: i64,
        name: &str,
        location: &str,
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO artist_venues (artist_id, name, location, latitude, longitude)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![artist_id, name, location, latitude, longitude],
        )?;
        Ok(conn.last_insert_rowid())
    }

    // =========================================================================
    // Read-back helpers (used by operators and tests)
    // =========================================================================

    /// The persisted (kind, primary song, confidence, method) for a track,
    /// or None if the track has no recorded outcome yet.
    pub fn track_match_state(
        &self,
        track_id: i64,
    ) -> Result<Option<(String, Option<i64>, f64, String)>> {
        let conn = self.conn.lock().unwrap();
        let state = conn
            .query_row(
                "SELECT track_kind, primary_song_id, match_confidence, match_method
                 FROM tracks WHERE id = ?1 AND match_method IS NOT NULL",
                params![track_id],
                |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                        row.get(1)?,
                        row.get::<_, Option<f64>>(2)?.unwrap_or(0.0),
                        row.get(3)?,
                    ))
                },
            )
            .optional()?;
        Ok(state)
    }

    /// Junction rows for a track, ordered by segment position.
    pub fn track_song_links(&self, track_id: i64) -> Result<Vec<(i64, f64, String, usize)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT song_id, confidence, method, position FROM track_songs
             WHERE track_id = ?1 ORDER BY position",
        )?;
        let rows = stmt
            .query_map(params![track_id], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get::<_, i64>(3)? as usize,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// The persisted (type, confidence, method) for a source, if classified.
    pub fn source_classification(
        &self,
        source_id: i64,
    ) -> Result<Option<(String, f64, String)>> {
        let conn = self.conn.lock().unwrap();
        let state = conn
            .query_row(
                "SELECT recording_type, type_confidence, type_method
                 FROM sources WHERE id = ?1 AND recording_type IS NOT NULL",
                params![source_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;
        Ok(state)
    }

    /// The canonical venue an artist venue is linked to, if any.
    pub fn venue_link(&self, venue_id: i64) -> Result<Option<i64>> {
        let conn = self.conn.lock().unwrap();
        let link = conn
            .query_row(
                "SELECT canonical_venue_id FROM artist_venues WHERE id = ?1",
                params![venue_id],
                |row| row.get::<_, Option<i64>>(0),
            )
            .optional()?;
        Ok(link.flatten())
    }
}

impl SongStore for SqliteArchiveStore {
    fn artists_with_unmatched_tracks(&self) -> Result<Vec<i64>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT artist_id FROM tracks WHERE match_method IS NULL ORDER BY artist_id",
        )?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }

    fn songs_for_artist(&self, artist_id: i64) -> Result<Vec<Song>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT id, name, slug FROM songs WHERE artist_id = ?1 ORDER BY id")?;
        let songs = stmt
            .query_map(params![artist_id], |row| {
                Ok(Song {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    slug: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(songs)
    }

    fn unmatched_tracks_for_artist(
        &self,
        artist_id: i64,
        limit: usize,
    ) -> Result<Vec<TrackRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, artist_id, title FROM tracks
             WHERE artist_id = ?1 AND match_method IS NULL ORDER BY id LIMIT ?2",
        )?;
        let tracks = stmt
            .query_map(params![artist_id, limit as i64], |row| {
                Ok(TrackRecord {
                    id: row.get(0)?,
                    artist_id: row.get(1)?,
                    title: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tracks)
    }

    fn persist_track_match(
        &self,
        track_id: i64,
        track_kind: &str,
        primary_song_id: Option<i64>,
        confidence: f64,
        method: &str,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE tracks SET track_kind = ?2, primary_song_id = ?3,
                 match_confidence = ?4, match_method = ?5
             WHERE id = ?1",
            params![track_id, track_kind, primary_song_id, confidence, method],
        )?;
        if updated == 0 {
            bail!("persist_track_match for unknown track id {}", track_id);
        }
        Ok(())
    }

    fn upsert_track_song_link(
        &self,
        track_id: i64,
        song_id: i64,
        confidence: f64,
        method: &str,
        position: usize,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO track_songs (track_id, song_id, confidence, method, position)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(track_id, song_id) DO UPDATE SET
                 confidence = excluded.confidence,
                 method = excluded.method,
                 position = excluded.position",
            params![track_id, song_id, confidence, method, position as i64],
        )?;
        Ok(())
    }
}

impl SourceStore for SqliteArchiveStore {
    fn unclassified_sources(&self, limit: usize) -> Result<Vec<SourceRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, artist_id, identifier, title, source_text, lineage, taper_notes, description
             FROM sources WHERE recording_type IS NULL ORDER BY id LIMIT ?1",
        )?;
        let sources = stmt
            .query_map(params![limit as i64], |row| {
                Ok(SourceRecord {
                    id: row.get(0)?,
                    artist_id: row.get(1)?,
                    identifier: row.get(2)?,
                    title: row.get(3)?,
                    source: row.get(4)?,
                    lineage: row.get(5)?,
                    taper_notes: row.get(6)?,
                    description: row.get(7)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sources)
    }

    fn persist_source_classification(
        &self,
        source_id: i64,
        result: &ClassificationResult,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE sources SET recording_type = ?2, type_confidence = ?3,
                 type_method = ?4, type_reasoning = ?5
             WHERE id = ?1",
            params![
                source_id,
                result.recording_type.as_str(),
                result.confidence,
                result.method.as_str(),
                result.reasoning,
            ],
        )?;
        if updated == 0 {
            bail!(
                "persist_source_classification for unknown source id {}",
                source_id
            );
        }
        Ok(())
    }
}

impl VenueStore for SqliteArchiveStore {
    fn unlinked_venues(&self, limit: usize) -> Result<Vec<ArtistVenue>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, artist_id, name, location, latitude, longitude
             FROM artist_venues WHERE canonical_venue_id IS NULL ORDER BY id LIMIT ?1",
        )?;
        let venues = stmt
            .query_map(params![limit as i64], |row| {
                Ok(ArtistVenue {
                    id: row.get(0)?,
                    artist_id: row.get(1)?,
                    name: row.get(2)?,
                    location: row.get(3)?,
                    latitude: row.get(4)?,
                    longitude: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(venues)
    }

    fn all_canonical_venues(&self) -> Result<Vec<CanonicalVenue>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, name, location, latitude, longitude, slug, past_names
             FROM canonical_venues ORDER BY id",
        )?;
        let venues = stmt
            .query_map([], Self::row_to_canonical)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(venues)
    }

    fn create_canonical_venue(&self, venue: NewCanonicalVenue) -> Result<CanonicalVenue> {
        let conn = self.conn.lock().unwrap();
        let past_names_json = serde_json::to_string(&venue.past_names)?;
        conn.execute(
            "INSERT INTO canonical_venues (name, location, latitude, longitude, slug, past_names)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                venue.name,
                venue.location,
                venue.latitude,
                venue.longitude,
                venue.slug,
                past_names_json,
            ],
        )?;
        Ok(CanonicalVenue {
            id: conn.last_insert_rowid(),
            name: venue.name,
            location: venue.location,
            latitude: venue.latitude,
            longitude: venue.longitude,
            slug: venue.slug,
            past_names: venue.past_names,
        })
    }

    fn link_venue_to_canonical(&self, venue_id: i64, canonical_id: i64) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE artist_venues SET canonical_venue_id = ?2 WHERE id = ?1",
            params![venue_id, canonical_id],
        )?;
        if updated == 0 {
            bail!("link_venue_to_canonical for unknown venue id {}", venue_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording_type::{ClassificationMethod, RecordingType};
    use tempfile::TempDir;

    fn make_store() -> (TempDir, SqliteArchiveStore) {
        let dir = TempDir::new().unwrap();
        let store = SqliteArchiveStore::new(dir.path().join("archive.db")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_song_roundtrip() {
        let (_dir, store) = make_store();
        store.insert_song(1, "Scarlet Begonias").unwrap();
        store.insert_song(1, "Fire on the Mountain").unwrap();
        store.insert_song(2, "Tweezer").unwrap();

        let songs = store.songs_for_artist(1).unwrap();
        assert_eq!(songs.len(), 2);
        assert_eq!(songs[0].name, "Scarlet Begonias");
        assert_eq!(songs[0].slug, "scarlet-begonias");
    }

    #[test]
    fn test_unmatched_tracks_and_settled_negatives() {
        let (_dir, store) = make_store();
        let track_id = store.insert_track(1, "Mystery Jam").unwrap();
        assert_eq!(store.artists_with_unmatched_tracks().unwrap(), vec![1]);
        assert_eq!(store.unmatched_tracks_for_artist(1, 10).unwrap().len(), 1);

        // A settled negative is not re-selected on the next run.
        store
            .persist_track_match(track_id, "song", None, 0.0, "none")
            .unwrap();
        assert!(store.artists_with_unmatched_tracks().unwrap().is_empty());
        assert!(store.unmatched_tracks_for_artist(1, 10).unwrap().is_empty());

        let (kind, song_id, confidence, method) =
            store.track_match_state(track_id).unwrap().unwrap();
        assert_eq!(kind, "song");
        assert_eq!(song_id, None);
        assert_eq!(confidence, 0.0);
        assert_eq!(method, "none");
    }

    #[test]
    fn test_track_song_link_upsert_is_idempotent() {
        let (_dir, store) = make_store();
        let song_id = store.insert_song(1, "Ripple").unwrap();
        let track_id = store.insert_track(1, "Ripple").unwrap();

        store
            .upsert_track_song_link(track_id, song_id, 0.76, "fuzzy", 0)
            .unwrap();
        store
            .upsert_track_song_link(track_id, song_id, 0.95, "slug", 0)
            .unwrap();

        let links = store.track_song_links(track_id).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0], (song_id, 0.95, "slug".to_string(), 0));
    }

    #[test]
    fn test_persist_track_match_unknown_track_fails() {
        let (_dir, store) = make_store();
        let result = store.persist_track_match(999, "song", None, 0.0, "none");
        assert!(result.is_err());
    }

    #[test]
    fn test_source_classification_roundtrip() {
        let (_dir, store) = make_store();
        let source_id = store
            .insert_source(
                1,
                &NewSource {
                    identifier: "gd1977-05-08.sbd.miller".to_string(),
                    source: "SBD> MR> DAT".to_string(),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(store.unclassified_sources(10).unwrap().len(), 1);

        let result = ClassificationResult {
            recording_type: RecordingType::Soundboard,
            confidence: 0.9,
            method: ClassificationMethod::Rule,
            reasoning: None,
        };
        store
            .persist_source_classification(source_id, &result)
            .unwrap();

        assert!(store.unclassified_sources(10).unwrap().is_empty());
        let (kind, confidence, method) =
            store.source_classification(source_id).unwrap().unwrap();
        assert_eq!(kind, "soundboard");
        assert_eq!(confidence, 0.9);
        assert_eq!(method, "rule");
    }

    #[test]
    fn test_venue_roundtrip_and_linking() {
        let (_dir, store) = make_store();
        let venue_id = store
            .insert_artist_venue(1, "Red Rocks Amphitheatre", "Morrison, CO", None, None)
            .unwrap();

        assert_eq!(store.unlinked_venues(10).unwrap().len(), 1);
        assert!(store.all_canonical_venues().unwrap().is_empty());

        let canonical = store
            .create_canonical_venue(NewCanonicalVenue {
                name: "Red Rocks Amphitheatre".to_string(),
                location: "Morrison, CO".to_string(),
                latitude: Some(39.6654),
                longitude: Some(-105.2057),
                slug: "red-rocks-amphitheatre".to_string(),
                past_names: vec!["Red Rocks Park".to_string()],
            })
            .unwrap();

        store.link_venue_to_canonical(venue_id, canonical.id).unwrap();

        assert!(store.unlinked_venues(10).unwrap().is_empty());
        assert_eq!(store.venue_link(venue_id).unwrap(), Some(canonical.id));

        let reloaded = store.all_canonical_venues().unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded[0].past_names, vec!["Red Rocks Park".to_string()]);
    }
}
