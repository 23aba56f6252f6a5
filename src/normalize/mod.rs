//! Text normalization for messy upstream metadata.
//!
//! Track titles arrive with file extensions, disc/track prefixes, segue
//! notation and bracketed annotations; venue locations arrive with every
//! imaginable formatting of city/state strings. This module turns both
//! into comparable canonical forms.

mod location;
mod slug;
mod title;

pub use location::normalize_location;
pub use slug::slugify;
pub use title::{normalize_title, NormalizedSegment, SegmentKind};
