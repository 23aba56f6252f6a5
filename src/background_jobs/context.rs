use crate::archive_store::{SongStore, SourceStore, VenueStore};
use crate::config::ReconcileSettings;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Context provided to jobs during execution.
///
/// Carries the repository handles, the batch settings (escalation flag,
/// batch size, worker pool size) and a cancellation token for graceful
/// shutdown handling.
#[derive(Clone)]
pub struct JobContext {
    /// Token to check for cancellation/shutdown requests.
    pub cancellation_token: CancellationToken,

    /// Song repository for track matching.
    pub song_store: Arc<dyn SongStore>,

    /// Venue repository for canonicalization.
    pub venue_store: Arc<dyn VenueStore>,

    /// Source repository for recording-type classification.
    pub source_store: Arc<dyn SourceStore>,

    /// Cross-cutting batch settings, fixed for the whole invocation.
    pub settings: ReconcileSettings,
}

impl JobContext {
    pub fn new(
        cancellation_token: CancellationToken,
        song_store: Arc<dyn SongStore>,
        venue_store: Arc<dyn VenueStore>,
        source_store: Arc<dyn SourceStore>,
        settings: ReconcileSettings,
    ) -> Self {
        Self {
            cancellation_token,
            song_store,
            venue_store,
            source_store,
            settings,
        }
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}
