//! Mutable in-memory index over canonical venues.
//!
//! One instance is built per batch invocation and grows as new canonical
//! venues are created, so later venues in the same batch can match against
//! canonicals created moments earlier. Single-writer: the batch loop owns it.

use crate::archive_store::CanonicalVenue;
use std::collections::HashMap;

pub struct CanonicalVenueIndex {
    venues: Vec<CanonicalVenue>,
    by_slug: HashMap<String, Vec<usize>>,
}

impl CanonicalVenueIndex {
    pub fn new(venues: Vec<CanonicalVenue>) -> Self {
        let mut by_slug: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, venue) in venues.iter().enumerate() {
            by_slug.entry(venue.slug.clone()).or_default().push(idx);
        }
        Self { venues, by_slug }
    }

    /// Append a newly created canonical venue.
    pub fn insert(&mut self, venue: CanonicalVenue) {
        let idx = self.venues.len();
        self.by_slug.entry(venue.slug.clone()).or_default().push(idx);
        self.venues.push(venue);
    }

    /// Indices of canonical venues sharing a slug.
    pub fn same_slug(&self, slug: &str) -> &[usize] {
        self.by_slug.get(slug).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get(&self, idx: usize) -> &CanonicalVenue {
        &self.venues[idx]
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &CanonicalVenue)> {
        self.venues.iter().enumerate()
    }

    pub fn len(&self) -> usize {
        self.venues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.venues.is_empty()
    }
}
