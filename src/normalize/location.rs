//! Venue location string normalization.
//!
//! Upstream providers disagree on how a city/state pair is written
//! ("Morrison, Colorado" vs "Morrison, CO"). Normalizing both sides before
//! fuzzy comparison keeps the venue matcher from splitting on formatting.

/// Full U.S. state names mapped to their two-letter postal codes.
const STATE_ABBREVIATIONS: &[(&str, &str)] = &[
    ("alabama", "al"),
    ("alaska", "ak"),
    ("arizona", "az"),
    ("arkansas", "ar"),
    ("california", "ca"),
    ("colorado", "co"),
    ("connecticut", "ct"),
    ("delaware", "de"),
    ("florida", "fl"),
    ("georgia", "ga"),
    ("hawaii", "hi"),
    ("idaho", "id"),
    ("illinois", "il"),
    ("indiana", "in"),
    ("iowa", "ia"),
    ("kansas", "ks"),
    ("kentucky", "ky"),
    ("louisiana", "la"),
    ("maine", "me"),
    ("maryland", "md"),
    ("massachusetts", "ma"),
    ("michigan", "mi"),
    ("minnesota", "mn"),
    ("mississippi", "ms"),
    ("missouri", "mo"),
    ("montana", "mt"),
    ("nebraska", "ne"),
    ("nevada", "nv"),
    ("new hampshire", "nh"),
    ("new jersey", "nj"),
    ("new mexico", "nm"),
    ("new york", "ny"),
    ("north carolina", "nc"),
    ("north dakota", "nd"),
    ("ohio", "oh"),
    ("oklahoma", "ok"),
    ("oregon", "or"),
    ("pennsylvania", "pa"),
    ("rhode island", "ri"),
    ("south carolina", "sc"),
    ("south dakota", "sd"),
    ("tennessee", "tn"),
    ("texas", "tx"),
    ("utah", "ut"),
    ("vermont", "vt"),
    ("virginia", "va"),
    ("washington", "wa"),
    ("west virginia", "wv"),
    ("wisconsin", "wi"),
    ("wyoming", "wy"),
    ("district of columbia", "dc"),
];

/// Normalize a location string for comparison.
///
/// Lower-cases, splits on commas, trims each part, maps full U.S. state
/// names to two-letter codes, and rejoins with `", "`.
pub fn normalize_location(raw: &str) -> String {
    raw.to_lowercase()
        .split(',')
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .map(|part| {
            STATE_ABBREVIATIONS
                .iter()
                .find(|(full, _)| *full == part)
                .map(|(_, abbrev)| *abbrev)
                .unwrap_or(part)
        })
        .collect::<Vec<_>>()
        .join(", ")
}
