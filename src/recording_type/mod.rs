//! Recording-technique classification for one source.
//!
//! A rule layer over the source's free-text metadata handles the clear
//! cases; anything below the confidence gate escalates to the semantic
//! model (when the caller allows it), with the rule result kept as the
//! fallback for any model failure.

mod rules;

pub use rules::classify_by_rules;

use crate::semantic::ClassificationCache;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Rule results at or above this confidence are returned without escalation.
pub const ESCALATION_THRESHOLD: f64 = 0.7;

/// Technical provenance of a live recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingType {
    Soundboard,
    Audience,
    Matrix,
    UltraMatrix,
    PreFm,
    Fm,
    Webcast,
    Unknown,
}

impl RecordingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordingType::Soundboard => "soundboard",
            RecordingType::Audience => "audience",
            RecordingType::Matrix => "matrix",
            RecordingType::UltraMatrix => "ultra_matrix",
            RecordingType::PreFm => "pre_fm",
            RecordingType::Fm => "fm",
            RecordingType::Webcast => "webcast",
            RecordingType::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "soundboard" | "sbd" => Some(RecordingType::Soundboard),
            "audience" | "aud" => Some(RecordingType::Audience),
            "matrix" => Some(RecordingType::Matrix),
            "ultra_matrix" | "ultramatrix" => Some(RecordingType::UltraMatrix),
            "pre_fm" | "pre-fm" | "prefm" => Some(RecordingType::PreFm),
            "fm" => Some(RecordingType::Fm),
            "webcast" => Some(RecordingType::Webcast),
            "unknown" => Some(RecordingType::Unknown),
            _ => None,
        }
    }
}

/// How a classification score was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationMethod {
    Rule,
    Llm,
}

impl ClassificationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassificationMethod::Rule => "rule",
            ClassificationMethod::Llm => "llm",
        }
    }
}

/// Immutable classification outcome for one source.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub recording_type: RecordingType,
    pub confidence: f64,
    pub method: ClassificationMethod,
    pub reasoning: Option<String>,
}

/// The free-text metadata bundle a provider exposes for one source.
#[derive(Debug, Clone, Default)]
pub struct SourceMetadata {
    pub identifier: String,
    pub title: String,
    pub source: String,
    pub lineage: String,
    pub taper_notes: String,
    pub description: String,
}

impl SourceMetadata {
    /// All fields concatenated for rule evaluation and model input.
    pub fn combined_text(&self) -> String {
        [
            self.identifier.as_str(),
            self.title.as_str(),
            self.source.as_str(),
            self.lineage.as_str(),
            self.taper_notes.as_str(),
            self.description.as_str(),
        ]
        .iter()
        .filter(|field| !field.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("\n")
    }
}

const RECORDING_TYPE_SYSTEM_PROMPT: &str = r#"You classify the recording technique of live-concert recordings from their archival metadata.

Answer with a JSON object: {"type": "...", "confidence": 0.0-1.0, "reasoning": "..."}.

The type must be exactly one of:
- "soundboard": recorded from a direct feed off the mixing console (board feed, console patch, SBD).
- "audience": recorded with microphones in the audience.
- "matrix": a blend of a soundboard feed and audience microphones.
- "ultra_matrix": a multi-source matrix mixed from several audience/soundboard recordings.
- "pre_fm": the master feed prepared for radio, captured before FM transmission.
- "fm": recorded off the air from an FM radio broadcast.
- "webcast": captured from an internet stream or webcast.
- "unknown": the metadata does not support any of the above.

Be careful with microphone placement phrasing: "recorded three rows from the soundboard",
"taped near the board" or "behind the console" describe where audience microphones stood,
NOT a board feed. Those are "audience" recordings. Only a direct electrical connection to
the board ("board feed", "console patch", "SBD>DAT lineage") is "soundboard"."#;

/// Maximum metadata text sent to the model; provider descriptions can run long.
const MAX_MODEL_INPUT_CHARS: usize = 4000;

#[derive(Debug, Deserialize)]
struct ModelTypeResponse {
    #[serde(rename = "type")]
    recording_type: String,
    confidence: f64,
    reasoning: Option<String>,
}

/// Two-layer recording-type classifier: rules first, model on low confidence.
pub struct RecordingTypeClassifier {
    cache: Arc<ClassificationCache>,
}

impl RecordingTypeClassifier {
    pub fn new(cache: Arc<ClassificationCache>) -> Self {
        Self { cache }
    }

    /// Classify one source's recording technique.
    ///
    /// Never fails: when escalation is disallowed, unavailable, or the model
    /// answer is unusable, the rule-layer result is returned instead.
    pub async fn classify(
        &self,
        meta: &SourceMetadata,
        allow_escalation: bool,
        cancel: &CancellationToken,
    ) -> ClassificationResult {
        let rule_result = classify_by_rules(meta);

        if rule_result.confidence >= ESCALATION_THRESHOLD || !allow_escalation {
            return rule_result;
        }

        let mut user_content = meta.combined_text();
        if user_content.len() > MAX_MODEL_INPUT_CHARS {
            let mut end = MAX_MODEL_INPUT_CHARS;
            while !user_content.is_char_boundary(end) {
                end -= 1;
            }
            user_content.truncate(end);
        }

        let response: Option<ModelTypeResponse> = self
            .cache
            .classify(
                RECORDING_TYPE_SYSTEM_PROMPT,
                &user_content,
                "recording-type",
                cancel,
            )
            .await;

        match response {
            Some(parsed) => match RecordingType::parse(&parsed.recording_type) {
                Some(recording_type) => {
                    debug!(
                        identifier = %meta.identifier,
                        recording_type = recording_type.as_str(),
                        "model classified recording type"
                    );
                    ClassificationResult {
                        recording_type,
                        confidence: parsed.confidence.clamp(0.0, 1.0),
                        method: ClassificationMethod::Llm,
                        reasoning: parsed.reasoning,
                    }
                }
                None => {
                    warn!(
                        identifier = %meta.identifier,
                        answer = %parsed.recording_type,
                        "model returned unrecognized recording type, keeping rule result"
                    );
                    rule_result
                }
            },
            None => rule_result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::testing::{MemoryCacheStore, StubModel};

    fn meta_with_source(source: &str) -> SourceMetadata {
        SourceMetadata {
            identifier: "gd1977-05-08.12345".to_string(),
            source: source.to_string(),
            ..Default::default()
        }
    }

    fn classifier_with(model: Arc<StubModel>) -> RecordingTypeClassifier {
        let cache = ClassificationCache::new(model, Arc::new(MemoryCacheStore::default()));
        RecordingTypeClassifier::new(Arc::new(cache))
    }

    #[tokio::test]
    async fn test_confident_rule_skips_model() {
        let model = Arc::new(StubModel::returning(
            r#"{"type":"audience","confidence":0.9}"#,
        ));
        let classifier = classifier_with(model.clone());

        let result = classifier
            .classify(
                &meta_with_source("direct board feed, DAT master"),
                true,
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(result.recording_type, RecordingType::Soundboard);
        assert_eq!(result.method, ClassificationMethod::Rule);
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_low_confidence_escalates_when_allowed() {
        let model = Arc::new(StubModel::returning(
            r#"{"type":"audience","confidence":0.85,"reasoning":"mic placement wording"}"#,
        ));
        let classifier = classifier_with(model.clone());

        let result = classifier
            .classify(
                &meta_with_source("recorded with mystery gear"),
                true,
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(result.recording_type, RecordingType::Audience);
        assert_eq!(result.confidence, 0.85);
        assert_eq!(result.method, ClassificationMethod::Llm);
        assert_eq!(model.call_count(), 1);
    }

    #[tokio::test]
    async fn test_escalation_disallowed_returns_rule_result() {
        let model = Arc::new(StubModel::returning(
            r#"{"type":"audience","confidence":0.85}"#,
        ));
        let classifier = classifier_with(model.clone());

        let result = classifier
            .classify(
                &meta_with_source("recorded with mystery gear"),
                false,
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(result.recording_type, RecordingType::Unknown);
        assert_eq!(result.method, ClassificationMethod::Rule);
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn test_model_failure_falls_back_to_rule_result() {
        let classifier = classifier_with(Arc::new(StubModel::failing()));

        let result = classifier
            .classify(
                &meta_with_source("recorded with mystery gear"),
                true,
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(result.recording_type, RecordingType::Unknown);
        assert_eq!(result.confidence, 0.3);
        assert_eq!(result.method, ClassificationMethod::Rule);
    }

    #[tokio::test]
    async fn test_unrecognized_model_type_falls_back_to_rule_result() {
        let classifier = classifier_with(Arc::new(StubModel::returning(
            r#"{"type":"hologram","confidence":0.99}"#,
        )));

        let result = classifier
            .classify(
                &meta_with_source("recorded with mystery gear"),
                true,
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(result.recording_type, RecordingType::Unknown);
        assert_eq!(result.method, ClassificationMethod::Rule);
    }

    #[tokio::test]
    async fn test_model_confidence_clamped() {
        let classifier = classifier_with(Arc::new(StubModel::returning(
            r#"{"type":"fm","confidence":1.7}"#,
        )));

        let result = classifier
            .classify(
                &meta_with_source("recorded with mystery gear"),
                true,
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(result.recording_type, RecordingType::Fm);
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_recording_type_parse_roundtrip() {
        for kind in [
            RecordingType::Soundboard,
            RecordingType::Audience,
            RecordingType::Matrix,
            RecordingType::UltraMatrix,
            RecordingType::PreFm,
            RecordingType::Fm,
            RecordingType::Webcast,
            RecordingType::Unknown,
        ] {
            assert_eq!(RecordingType::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(RecordingType::parse("SBD"), Some(RecordingType::Soundboard));
        assert_eq!(RecordingType::parse("hologram"), None);
    }

    #[test]
    fn test_combined_text_skips_empty_fields() {
        let meta = meta_with_source("SBD");
        let text = meta.combined_text();
        assert_eq!(text, "gd1977-05-08.12345\nSBD");
    }
}
