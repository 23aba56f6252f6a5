//! Deterministic rule layer for recording-type classification.
//!
//! Rules are evaluated over the lower-cased concatenation of every metadata
//! field, in a fixed precedence: the first rule that fires wins.

use super::{ClassificationMethod, ClassificationResult, RecordingType, SourceMetadata};

const WEBCAST_KEYWORDS: &[&str] = &[
    "webcast",
    "livestream",
    "live stream",
    "couch tour",
    "internet stream",
];

const PRE_FM_KEYWORDS: &[&str] = &["pre-fm", "pre fm", "prefm"];

const FM_KEYWORDS: &[&str] = &[
    "fm broadcast",
    "fm rebroadcast",
    "fm radio",
    "radio broadcast",
    "off the air",
    "off-air",
];

const ULTRA_MATRIX_KEYWORDS: &[&str] = &["ultramatrix", "ultra matrix", "ultra-matrix"];

const BLEND_PHRASES: &[&str] = &[
    "sbd/aud",
    "sbd + aud",
    "sbd and aud",
    "soundboard and audience",
    "blend of sbd",
    "board/audience mix",
];

const DIRECT_FEED_PHRASES: &[&str] = &[
    "board feed",
    "soundboard feed",
    "console recording",
    "console feed",
    "board patch",
    "console patch",
    "direct feed",
    "direct from the board",
];

const SBD_KEYWORDS: &[&str] = &["soundboard", "sbd"];

// Microphone placement phrasing: near the board is still an audience tape.
const BOARD_PROXIMITY_PHRASES: &[&str] = &[
    "rows from the",
    "feet from the",
    "near the board",
    "near the soundboard",
    "behind the board",
    "behind the soundboard",
    "close to the board",
    "at the board rail",
];

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| text.contains(kw))
}

fn rule_result(recording_type: RecordingType, confidence: f64) -> ClassificationResult {
    ClassificationResult {
        recording_type,
        confidence,
        method: ClassificationMethod::Rule,
        reasoning: None,
    }
}

/// Classify a source from keyword rules alone.
///
/// Precedence, first hit wins: webcast, pre-FM, FM, matrix, ultra-matrix,
/// soundboard, board-proximity, then `unknown` at 0.3 so callers escalate.
pub fn classify_by_rules(meta: &SourceMetadata) -> ClassificationResult {
    let text = meta.combined_text().to_lowercase();
    let identifier = meta.identifier.to_lowercase();

    if contains_any(&text, WEBCAST_KEYWORDS) {
        return rule_result(RecordingType::Webcast, 0.9);
    }

    if contains_any(&text, PRE_FM_KEYWORDS) {
        return rule_result(RecordingType::PreFm, 0.9);
    }

    if contains_any(&text, FM_KEYWORDS) {
        return rule_result(RecordingType::Fm, 0.85);
    }

    // Plain "matrix" or SBD+AUD blend phrasing, but not both at once:
    // sources saying both tend to be multi-source mixes, handled below.
    let has_matrix_keyword = text.contains("matrix") && !contains_any(&text, ULTRA_MATRIX_KEYWORDS);
    let has_blend_phrase = contains_any(&text, BLEND_PHRASES);
    if has_matrix_keyword ^ has_blend_phrase {
        return rule_result(RecordingType::Matrix, 0.85);
    }

    if contains_any(&text, ULTRA_MATRIX_KEYWORDS) {
        return rule_result(RecordingType::UltraMatrix, 0.9);
    }

    let near_board = contains_any(&text, BOARD_PROXIMITY_PHRASES);

    if contains_any(&text, DIRECT_FEED_PHRASES) {
        return rule_result(RecordingType::Soundboard, 0.95);
    }

    if contains_any(&text, SBD_KEYWORDS) {
        if near_board {
            // "3 rows from the soundboard" is an audience tape; score it low
            // so escalation is favored.
            return rule_result(RecordingType::Audience, 0.5);
        }
        let confidence = if contains_any(&identifier, SBD_KEYWORDS) {
            0.9
        } else {
            0.8
        };
        return rule_result(RecordingType::Soundboard, confidence);
    }

    if near_board {
        return rule_result(RecordingType::Audience, 0.5);
    }

    rule_result(RecordingType::Unknown, 0.3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording_type::ESCALATION_THRESHOLD as ESCALATION_MIN;

    fn meta(source: &str) -> SourceMetadata {
        SourceMetadata {
            identifier: "gd1989-07-07.98765".to_string(),
            source: source.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_webcast_outranks_everything() {
        let result = classify_by_rules(&meta("official webcast, soundboard mix"));
        assert_eq!(result.recording_type, RecordingType::Webcast);
        assert_eq!(result.method, ClassificationMethod::Rule);
    }

    #[test]
    fn test_pre_fm_before_fm() {
        let result = classify_by_rules(&meta("pre-FM master reel for the radio broadcast"));
        assert_eq!(result.recording_type, RecordingType::PreFm);
    }

    #[test]
    fn test_fm_broadcast() {
        let result = classify_by_rules(&meta("FM broadcast captured on Nakamichi deck"));
        assert_eq!(result.recording_type, RecordingType::Fm);
        assert!(result.confidence >= ESCALATION_MIN);
    }

    #[test]
    fn test_matrix_keyword() {
        let result = classify_by_rules(&meta("matrix mix by Hicks"));
        assert_eq!(result.recording_type, RecordingType::Matrix);
    }

    #[test]
    fn test_blend_phrase_without_matrix_keyword() {
        let result = classify_by_rules(&meta("blend of sbd and schoeps mics"));
        assert_eq!(result.recording_type, RecordingType::Matrix);
    }

    #[test]
    fn test_matrix_keyword_plus_blend_phrase_is_not_matrix() {
        // Both signals at once reads as a multi-source mix, not a plain matrix.
        let result = classify_by_rules(&meta("matrix: sbd/aud multi-source project"));
        assert_ne!(result.recording_type, RecordingType::Matrix);
    }

    #[test]
    fn test_ultra_matrix() {
        let result = classify_by_rules(&meta("UltraMatrix from four audience sources"));
        assert_eq!(result.recording_type, RecordingType::UltraMatrix);
    }

    #[test]
    fn test_direct_feed_high_confidence() {
        let result = classify_by_rules(&meta("direct board feed, DAT master"));
        assert_eq!(result.recording_type, RecordingType::Soundboard);
        assert!(result.confidence >= 0.9);
        assert_eq!(result.method, ClassificationMethod::Rule);
    }

    #[test]
    fn test_bare_sbd_keyword() {
        let mut source = meta("SBD> MR> DAT> CD");
        source.identifier = "gd1989-07-07.11111".to_string();
        let result = classify_by_rules(&source);
        assert_eq!(result.recording_type, RecordingType::Soundboard);
        assert_eq!(result.confidence, 0.8);
    }

    #[test]
    fn test_sbd_in_identifier_boosts_confidence() {
        let mut source = meta("SBD> MR> DAT> CD");
        source.identifier = "gd1989-07-07.sbd.miller.11111".to_string();
        let result = classify_by_rules(&source);
        assert_eq!(result.recording_type, RecordingType::Soundboard);
        assert_eq!(result.confidence, 0.9);
    }

    #[test]
    fn test_near_the_soundboard_is_not_soundboard() {
        let result = classify_by_rules(&meta("recorded 3 rows from the soundboard"));
        assert_ne!(result.recording_type, RecordingType::Soundboard);
        assert_eq!(result.recording_type, RecordingType::Audience);
        // Deliberately below the escalation gate.
        assert!(result.confidence < ESCALATION_MIN);
    }

    #[test]
    fn test_behind_the_board_without_sbd_keyword() {
        let result = classify_by_rules(&meta("mics set up behind the board, ORTF"));
        assert_eq!(result.recording_type, RecordingType::Audience);
        assert_eq!(result.confidence, 0.5);
    }

    #[test]
    fn test_no_signal_defaults_to_unknown() {
        let result = classify_by_rules(&meta("a nice tape"));
        assert_eq!(result.recording_type, RecordingType::Unknown);
        assert_eq!(result.confidence, 0.3);
    }

    #[test]
    fn test_rules_read_all_metadata_fields() {
        let source = SourceMetadata {
            identifier: "ph2003-02-28.55555".to_string(),
            taper_notes: "console patch via monitor desk".to_string(),
            ..Default::default()
        };
        let result = classify_by_rules(&source);
        assert_eq!(result.recording_type, RecordingType::Soundboard);
        assert_eq!(result.confidence, 0.95);
    }
}
