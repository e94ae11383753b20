//! Detection and validation result types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::behavior::{Behavior, Modality};

/// A detected behavior span, in absolute seconds on the source video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub behavior: Behavior,
    pub modality: Modality,
    pub start_sec: f64,
    pub end_sec: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
}

impl Detection {
    /// The merge key: spans of differing behavior or modality never merge.
    pub fn key(&self) -> (Behavior, Modality) {
        (self.behavior, self.modality)
    }

    pub fn duration(&self) -> f64 {
        (self.end_sec - self.start_sec).max(0.0)
    }
}

/// Model verdict for one merged span, bounds clip-relative to the
/// margin-expanded validation clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub correct: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_sec: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_sec: Option<f64>,
}

/// A detection that passed (or skipped) validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedDetection {
    #[serde(flatten)]
    pub detection: Detection,
    /// True when the validator was skipped and the pre-validation bounds
    /// were carried forward unrefined.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
}

/// The `behaviors_final.json` artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub generated_at: DateTime<Utc>,
    pub dominant_category: Option<Behavior>,
    pub total_behaviors: usize,
    pub behaviors: Vec<Detection>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_serializes_camel_case() {
        let d = Detection {
            behavior: Behavior::BodyRocking,
            modality: Modality::Visual,
            start_sec: 10.0,
            end_sec: 15.5,
            notes: String::new(),
        };
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["behavior"], "body-rocking");
        assert_eq!(json["modality"], "visual");
        assert_eq!(json["startSec"], 10.0);
        assert_eq!(json["endSec"], 15.5);
        // Empty notes are omitted from artifacts.
        assert!(json.get("notes").is_none());
    }

    #[test]
    fn validated_detection_flattens_and_hides_default_skipped() {
        let v = ValidatedDetection {
            detection: Detection {
                behavior: Behavior::Crying,
                modality: Modality::Audio,
                start_sec: 1.0,
                end_sec: 2.0,
                notes: "brief".to_string(),
            },
            skipped: false,
        };
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["behavior"], "crying");
        assert!(json.get("skipped").is_none());

        let skipped = ValidatedDetection { skipped: true, ..v };
        let json = serde_json::to_value(&skipped).unwrap();
        assert_eq!(json["skipped"], true);
    }

    #[test]
    fn validation_result_tolerates_missing_bounds() {
        let r: ValidationResult = serde_json::from_str(r#"{"correct": true}"#).unwrap();
        assert!(r.correct);
        assert!(r.start_sec.is_none());
        assert!(r.end_sec.is_none());
    }
}
