//! Venue canonicalization: grouping artist-scoped venue records into
//! artist-independent canonical venues.
//!
//! Three deterministic layers run in order per venue: shared-slug with
//! location agreement, geographic proximity, then weighted fuzzy
//! name-plus-location scoring. A venue no layer claims becomes a new
//! canonical venue, so every processed venue ends up linked.

mod index;

pub use index::CanonicalVenueIndex;

use crate::archive_store::{ArtistVenue, NewCanonicalVenue, VenueStore};
use crate::normalize::{normalize_location, slugify};
use crate::similarity::{haversine_km, similarity};
use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Location agreement required when a single canonical shares the slug.
pub const SLUG_SINGLE_LOCATION_THRESHOLD: f64 = 0.65;
/// Location agreement required when several canonicals share the slug.
pub const SLUG_MULTI_LOCATION_THRESHOLD: f64 = 0.80;
/// Radius for geographic matching.
pub const GEO_RADIUS_KM: f64 = 5.0;
/// Slug similarity required alongside geographic proximity.
pub const GEO_SLUG_SIMILARITY_THRESHOLD: f64 = 0.7;
/// Name similarity gate for the weighted fuzzy layer.
pub const FUZZY_NAME_THRESHOLD: f64 = 0.80;
/// Location similarity gate for the weighted fuzzy layer.
pub const FUZZY_LOCATION_THRESHOLD: f64 = 0.50;
const FUZZY_NAME_WEIGHT: f64 = 0.6;
const FUZZY_LOCATION_WEIGHT: f64 = 0.4;
/// Blank or unknown locations get partial credit rather than zero.
const UNKNOWN_LOCATION_CREDIT: f64 = 0.3;
/// Large backfills log running counts at this cadence.
const PROGRESS_LOG_INTERVAL: usize = 500;

/// Which layer claimed a venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VenueMatchLayer {
    SlugLocation,
    GeoProximity,
    FuzzyNameLocation,
}

/// Resolution for one artist-scoped venue against the canonical index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VenueResolution {
    Existing {
        index: usize,
        layer: VenueMatchLayer,
    },
    CreateNew,
}

/// Similarity between two location strings after normalization.
///
/// Compared component-wise over the comma-split parts (city against city,
/// state against state), averaged over the longer side so a missing
/// component costs rather than being ignored. Blank sides score the
/// partial unknown credit.
pub fn location_similarity(a: &str, b: &str) -> f64 {
    let a_norm = normalize_location(a);
    let b_norm = normalize_location(b);
    if a_norm.is_empty() || b_norm.is_empty() {
        return UNKNOWN_LOCATION_CREDIT;
    }

    let a_parts: Vec<&str> = a_norm.split(", ").collect();
    let b_parts: Vec<&str> = b_norm.split(", ").collect();
    let len = a_parts.len().max(b_parts.len());

    let mut total = 0.0;
    for i in 0..len {
        if let (Some(x), Some(y)) = (a_parts.get(i), b_parts.get(i)) {
            total += similarity(x, y);
        }
    }
    total / len as f64
}

/// Resolve one venue against the current canonical index, first layer wins.
pub fn resolve(venue: &ArtistVenue, index: &CanonicalVenueIndex) -> VenueResolution {
    let slug = slugify(&venue.name);

    if let Some(resolution) = slug_location_layer(venue, &slug, index) {
        return resolution;
    }
    if let Some(resolution) = geo_proximity_layer(venue, &slug, index) {
        return resolution;
    }
    if let Some(resolution) = fuzzy_layer(venue, index) {
        return resolution;
    }

    VenueResolution::CreateNew
}

fn slug_location_layer(
    venue: &ArtistVenue,
    slug: &str,
    index: &CanonicalVenueIndex,
) -> Option<VenueResolution> {
    let candidates = index.same_slug(slug);

    if candidates.len() == 1 {
        let idx = candidates[0];
        // Slug collision alone is strong evidence, so the location bar is looser.
        if location_similarity(&venue.location, &index.get(idx).location)
            >= SLUG_SINGLE_LOCATION_THRESHOLD
        {
            return Some(VenueResolution::Existing {
                index: idx,
                layer: VenueMatchLayer::SlugLocation,
            });
        }
        return None;
    }

    if candidates.len() > 1 {
        // Same name, different city: demand stronger location agreement.
        for &idx in candidates {
            if location_similarity(&venue.location, &index.get(idx).location)
                >= SLUG_MULTI_LOCATION_THRESHOLD
            {
                return Some(VenueResolution::Existing {
                    index: idx,
                    layer: VenueMatchLayer::SlugLocation,
                });
            }
        }
        // Locations disagree in text; let coordinates settle it.
        if let (Some(lat), Some(lon)) = (venue.latitude, venue.longitude) {
            for &idx in candidates {
                let canonical = index.get(idx);
                if let (Some(clat), Some(clon)) = (canonical.latitude, canonical.longitude) {
                    if haversine_km(lat, lon, clat, clon) <= GEO_RADIUS_KM {
                        return Some(VenueResolution::Existing {
                            index: idx,
                            layer: VenueMatchLayer::SlugLocation,
                        });
                    }
                }
            }
        }
    }

    None
}

fn geo_proximity_layer(
    venue: &ArtistVenue,
    slug: &str,
    index: &CanonicalVenueIndex,
) -> Option<VenueResolution> {
    let (lat, lon) = match (venue.latitude, venue.longitude) {
        (Some(lat), Some(lon)) => (lat, lon),
        _ => return None,
    };

    for (idx, canonical) in index.iter() {
        let (clat, clon) = match (canonical.latitude, canonical.longitude) {
            (Some(clat), Some(clon)) => (clat, clon),
            _ => continue,
        };
        if haversine_km(lat, lon, clat, clon) <= GEO_RADIUS_KM
            && similarity(slug, &canonical.slug) >= GEO_SLUG_SIMILARITY_THRESHOLD
        {
            return Some(VenueResolution::Existing {
                index: idx,
                layer: VenueMatchLayer::GeoProximity,
            });
        }
    }

    None
}

fn fuzzy_layer(venue: &ArtistVenue, index: &CanonicalVenueIndex) -> Option<VenueResolution> {
    let venue_name = venue.name.to_lowercase();
    let mut best: Option<(usize, f64, f64, f64)> = None;

    for (idx, canonical) in index.iter() {
        let name_sim = similarity(&venue_name, &canonical.name.to_lowercase());
        let loc_sim = location_similarity(&venue.location, &canonical.location);
        let score = FUZZY_NAME_WEIGHT * name_sim + FUZZY_LOCATION_WEIGHT * loc_sim;

        if best.map(|(_, s, _, _)| score > s).unwrap_or(true) {
            best = Some((idx, score, name_sim, loc_sim));
        }
    }

    let (idx, _, name_sim, loc_sim) = best?;
    if name_sim >= FUZZY_NAME_THRESHOLD && loc_sim >= FUZZY_LOCATION_THRESHOLD {
        return Some(VenueResolution::Existing {
            index: idx,
            layer: VenueMatchLayer::FuzzyNameLocation,
        });
    }

    None
}

/// Running counts for one canonicalization batch.
#[derive(Debug, Default, Clone, Copy)]
pub struct VenueBatchSummary {
    pub processed: usize,
    pub slug_matches: usize,
    pub geo_matches: usize,
    pub fuzzy_matches: usize,
    pub created: usize,
    pub errors: usize,
}

/// Batch driver for venue canonicalization.
pub struct VenueCanonicalizer;

impl VenueCanonicalizer {
    /// Canonicalize up to `limit` unlinked venues.
    ///
    /// Linking never fails a venue: the worst case creates a fresh
    /// canonical. Per-venue persistence errors are logged and counted,
    /// never fatal. Stops early when `cancel` fires; venues persisted so
    /// far stay persisted.
    pub fn canonicalize_batch(
        store: &dyn VenueStore,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<VenueBatchSummary> {
        let canonicals = store.all_canonical_venues()?;
        let mut index = CanonicalVenueIndex::new(canonicals);
        let venues = store.unlinked_venues(limit)?;

        info!(
            unlinked = venues.len(),
            canonical = index.len(),
            "Starting venue canonicalization batch"
        );

        let mut summary = VenueBatchSummary::default();

        for venue in &venues {
            if cancel.is_cancelled() {
                info!("Venue canonicalization cancelled mid-batch");
                break;
            }

            match resolve(venue, &index) {
                VenueResolution::Existing { index: idx, layer } => {
                    let canonical_id = index.get(idx).id;
                    if let Err(e) = store.link_venue_to_canonical(venue.id, canonical_id) {
                        error!(venue_id = venue.id, error = %e, "Failed to link venue");
                        summary.errors += 1;
                    } else {
                        debug!(
                            venue = %venue.name,
                            canonical_id,
                            layer = ?layer,
                            "Linked venue to existing canonical"
                        );
                        match layer {
                            VenueMatchLayer::SlugLocation => summary.slug_matches += 1,
                            VenueMatchLayer::GeoProximity => summary.geo_matches += 1,
                            VenueMatchLayer::FuzzyNameLocation => summary.fuzzy_matches += 1,
                        }
                    }
                }
                VenueResolution::CreateNew => {
                    let new_canonical = NewCanonicalVenue {
                        name: venue.name.clone(),
                        location: venue.location.clone(),
                        latitude: venue.latitude,
                        longitude: venue.longitude,
                        slug: slugify(&venue.name),
                        past_names: Vec::new(),
                    };
                    match store.create_canonical_venue(new_canonical) {
                        Ok(created) => {
                            if let Err(e) = store.link_venue_to_canonical(venue.id, created.id) {
                                error!(venue_id = venue.id, error = %e, "Failed to link venue");
                                summary.errors += 1;
                            } else {
                                summary.created += 1;
                            }
                            // Later venues in this batch can match the new canonical.
                            index.insert(created);
                        }
                        Err(e) => {
                            error!(venue_id = venue.id, error = %e, "Failed to create canonical venue");
                            summary.errors += 1;
                        }
                    }
                }
            }

            summary.processed += 1;
            if summary.processed % PROGRESS_LOG_INTERVAL == 0 {
                info!(
                    processed = summary.processed,
                    slug = summary.slug_matches,
                    geo = summary.geo_matches,
                    fuzzy = summary.fuzzy_matches,
                    created = summary.created,
                    "Venue canonicalization progress"
                );
            }
        }

        info!(
            processed = summary.processed,
            slug = summary.slug_matches,
            geo = summary.geo_matches,
            fuzzy = summary.fuzzy_matches,
            created = summary.created,
            errors = summary.errors,
            "Venue canonicalization batch complete"
        );

        Ok(summary)
    }
}
