//! End-to-end reconciliation tests: jobs running against a real SQLite
//! archive with a stubbed semantic model.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tapedeck_reconciler::archive_store::{NewSource, SqliteArchiveStore};
use tapedeck_reconciler::background_jobs::jobs::{
    RecordingTypeClassificationJob, TrackSongMatchingJob, VenueCanonicalizationJob,
};
use tapedeck_reconciler::background_jobs::{BackgroundJob, JobContext, JobError};
use tapedeck_reconciler::config::ReconcileSettings;
use tapedeck_reconciler::semantic::{
    ClassificationCache, CompletionOptions, ModelError, SemanticModel,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Semantic model stub returning a fixed JSON payload and counting calls.
struct ScriptedModel {
    response: Option<String>,
    calls: AtomicUsize,
}

impl ScriptedModel {
    fn returning(content: &str) -> Self {
        Self {
            response: Some(content.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    fn unavailable() -> Self {
        Self {
            response: None,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SemanticModel for ScriptedModel {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        _system_prompt: &str,
        _user_content: &str,
        _options: &CompletionOptions,
    ) -> Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.response {
            Some(content) => Ok(content.clone()),
            None => Err(ModelError::Connection("model offline".to_string())),
        }
    }
}

struct Harness {
    _dir: TempDir,
    store: Arc<SqliteArchiveStore>,
    cache: Arc<ClassificationCache>,
    model: Arc<ScriptedModel>,
}

fn harness(model: ScriptedModel) -> Harness {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(SqliteArchiveStore::new(dir.path().join("archive.db")).unwrap());
    let model = Arc::new(model);
    let cache_store = Arc::new(
        tapedeck_reconciler::archive_store::SqliteCacheStore::new(dir.path().join("cache.db"))
            .unwrap(),
    );
    let cache = Arc::new(ClassificationCache::new(model.clone(), cache_store));
    Harness {
        _dir: dir,
        store,
        cache,
        model,
    }
}

fn context(harness: &Harness, allow_escalation: bool) -> JobContext {
    JobContext::new(
        CancellationToken::new(),
        harness.store.clone(),
        harness.store.clone(),
        harness.store.clone(),
        ReconcileSettings {
            allow_escalation,
            batch_size: 500,
            worker_pool_size: 4,
        },
    )
}

#[tokio::test]
async fn test_track_matching_end_to_end() {
    let h = harness(ScriptedModel::unavailable());
    let scarlet = h.store.insert_song(1, "Scarlet Begonias").unwrap();
    let fire = h.store.insert_song(1, "Fire on the Mountain").unwrap();
    h.store.insert_song(1, "Ripple").unwrap();
    let terrapin = h.store.insert_song(1, "Terrapin Station").unwrap();

    let medley = h
        .store
        .insert_track(1, "01 Scarlet Begonias > Fire on the Mountain.mp3")
        .unwrap();
    let typo = h.store.insert_track(1, "Terrapin Staton").unwrap();
    let banter = h.store.insert_track(1, "Banter").unwrap();
    let unmatched = h.store.insert_track(1, "Chalk Dust Torture").unwrap();

    let job = TrackSongMatchingJob::new(h.cache.clone());
    job.execute(&context(&h, false)).await.unwrap();

    // Medley: two slug matches, primary is the first-encountered one.
    let (kind, primary, confidence, method) = h.store.track_match_state(medley).unwrap().unwrap();
    assert_eq!(kind, "song");
    assert_eq!(primary, Some(scarlet));
    assert_eq!(confidence, 0.95);
    assert_eq!(method, "slug");
    let links = h.store.track_song_links(medley).unwrap();
    assert_eq!(links.len(), 2);
    assert_eq!(links[0].0, scarlet);
    assert_eq!(links[1].0, fire);
    assert_eq!(links[1].3, 1);

    // Misspelled title resolves through the fuzzy layer.
    let (_, primary, _, method) = h.store.track_match_state(typo).unwrap().unwrap();
    assert_eq!(primary, Some(terrapin));
    assert_eq!(method, "fuzzy");

    // Banter track: kind recorded, no song matching attempted.
    let (kind, primary, _, method) = h.store.track_match_state(banter).unwrap().unwrap();
    assert_eq!(kind, "banter");
    assert_eq!(primary, None);
    assert_eq!(method, "none");
    assert!(h.store.track_song_links(banter).unwrap().is_empty());

    // No layer matched: explicit terminal outcome.
    let (kind, primary, confidence, method) =
        h.store.track_match_state(unmatched).unwrap().unwrap();
    assert_eq!(kind, "song");
    assert_eq!(primary, None);
    assert_eq!(confidence, 0.0);
    assert_eq!(method, "none");

    // Every outcome is settled; a re-run finds nothing to do and no model
    // call was ever made with escalation off.
    job.execute(&context(&h, false)).await.unwrap();
    assert_eq!(h.model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_recording_type_rules_end_to_end() {
    let h = harness(ScriptedModel::unavailable());
    let board = h
        .store
        .insert_source(
            1,
            &NewSource {
                identifier: "gd1977-05-08.1111".to_string(),
                source: "direct board feed, DAT master".to_string(),
                ..Default::default()
            },
        )
        .unwrap();
    let near_board = h
        .store
        .insert_source(
            1,
            &NewSource {
                identifier: "gd1977-05-08.2222".to_string(),
                taper_notes: "recorded 3 rows from the soundboard".to_string(),
                ..Default::default()
            },
        )
        .unwrap();
    let mystery = h
        .store
        .insert_source(
            1,
            &NewSource {
                identifier: "gd1977-05-08.3333".to_string(),
                description: "a tape of unclear origin".to_string(),
                ..Default::default()
            },
        )
        .unwrap();

    let job = RecordingTypeClassificationJob::new(h.cache.clone());
    job.execute(&context(&h, false)).await.unwrap();

    let (kind, confidence, method) = h.store.source_classification(board).unwrap().unwrap();
    assert_eq!(kind, "soundboard");
    assert!(confidence >= 0.9);
    assert_eq!(method, "rule");

    // The documented false positive: near-the-board is not a board feed.
    let (kind, _, _) = h.store.source_classification(near_board).unwrap().unwrap();
    assert_eq!(kind, "audience");

    // Settled as unknown rather than left unprocessed.
    let (kind, confidence, _) = h.store.source_classification(mystery).unwrap().unwrap();
    assert_eq!(kind, "unknown");
    assert_eq!(confidence, 0.3);

    job.execute(&context(&h, false)).await.unwrap();
    assert_eq!(h.model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_recording_type_escalation_end_to_end() {
    let h = harness(ScriptedModel::returning(
        r#"{"type":"audience","confidence":0.85,"reasoning":"mic placement phrasing"}"#,
    ));
    let ambiguous = h
        .store
        .insert_source(
            1,
            &NewSource {
                identifier: "ph1997-11-22.4444".to_string(),
                description: "taped from the rail with hidden gear".to_string(),
                ..Default::default()
            },
        )
        .unwrap();

    let job = RecordingTypeClassificationJob::new(h.cache.clone());
    job.execute(&context(&h, true)).await.unwrap();

    let (kind, confidence, method) = h.store.source_classification(ambiguous).unwrap().unwrap();
    assert_eq!(kind, "audience");
    assert_eq!(confidence, 0.85);
    assert_eq!(method, "llm");
    assert_eq!(h.model.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_venue_canonicalization_end_to_end() {
    let h = harness(ScriptedModel::unavailable());
    // Same name, two distant cities: must become two canonicals.
    let fox_atlanta = h
        .store
        .insert_artist_venue(1, "Fox Theatre", "Atlanta, GA", None, None)
        .unwrap();
    let fox_oakland = h
        .store
        .insert_artist_venue(2, "Fox Theatre", "Oakland, CA", None, None)
        .unwrap();
    // Same venue, state spelled out vs abbreviated.
    let ryman_abbrev = h
        .store
        .insert_artist_venue(1, "Ryman Auditorium", "Nashville, TN", None, None)
        .unwrap();
    let ryman_full = h
        .store
        .insert_artist_venue(2, "Ryman Auditorium", "Nashville, Tennessee", None, None)
        .unwrap();
    // Spelling variants ~100 m apart, resolved by coordinates.
    let red_rocks_a = h
        .store
        .insert_artist_venue(
            1,
            "Red Rocks Amphitheatre",
            "Morrison, CO",
            Some(39.6654),
            Some(-105.2057),
        )
        .unwrap();
    let red_rocks_b = h
        .store
        .insert_artist_venue(
            2,
            "Red Rocks Amphitheater",
            "Morrison, Colorado",
            Some(39.6663),
            Some(-105.2057),
        )
        .unwrap();

    VenueCanonicalizationJob
        .execute(&context(&h, false))
        .await
        .unwrap();

    let link = |id| h.store.venue_link(id).unwrap().unwrap();

    assert_ne!(link(fox_atlanta), link(fox_oakland));
    assert_eq!(link(ryman_abbrev), link(ryman_full));
    assert_eq!(link(red_rocks_a), link(red_rocks_b));

    // Closed world: every venue linked, four distinct physical venues.
    use tapedeck_reconciler::archive_store::VenueStore;
    assert!(h.store.unlinked_venues(10).unwrap().is_empty());
    assert_eq!(h.store.all_canonical_venues().unwrap().len(), 4);

    // Idempotent: a second run changes nothing.
    VenueCanonicalizationJob
        .execute(&context(&h, false))
        .await
        .unwrap();
    assert_eq!(h.store.all_canonical_venues().unwrap().len(), 4);
}

#[tokio::test]
async fn test_cancellation_stops_batch_before_persisting() {
    let h = harness(ScriptedModel::unavailable());
    h.store.insert_song(1, "Ripple").unwrap();
    h.store.insert_track(1, "Ripple").unwrap();

    let cancelled = CancellationToken::new();
    cancelled.cancel();
    let ctx = JobContext::new(
        cancelled,
        h.store.clone(),
        h.store.clone(),
        h.store.clone(),
        ReconcileSettings {
            allow_escalation: false,
            batch_size: 500,
            worker_pool_size: 4,
        },
    );

    let job = TrackSongMatchingJob::new(h.cache.clone());
    let result = job.execute(&ctx).await;
    assert!(matches!(result, Err(JobError::Cancelled)));

    // The track is still pending for the next run.
    use tapedeck_reconciler::archive_store::SongStore;
    assert_eq!(h.store.artists_with_unmatched_tracks().unwrap(), vec![1]);
}
