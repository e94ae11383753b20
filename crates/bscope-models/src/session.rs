//! Session records persisted in the bucket.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::behavior::Behavior;

/// Session lifecycle state, stored with its human-facing label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SessionStatus {
    #[default]
    #[serde(rename = "Awaiting")]
    Awaiting,
    #[serde(rename = "Processing")]
    Processing,
    #[serde(rename = "Pending review")]
    PendingReview,
    #[serde(rename = "Reviewed")]
    Reviewed,
    #[serde(rename = "Failed")]
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Awaiting => "Awaiting",
            SessionStatus::Processing => "Processing",
            SessionStatus::PendingReview => "Pending review",
            SessionStatus::Reviewed => "Reviewed",
            SessionStatus::Failed => "Failed",
        }
    }

    /// Terminal states after which a redelivered event must not reprocess.
    /// `Reviewed` is included: re-deriving artifacts would destroy manual
    /// review state.
    pub fn is_terminal_success(&self) -> bool {
        matches!(self, SessionStatus::PendingReview | SessionStatus::Reviewed)
    }
}

/// Worker block written on successful processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerInfo {
    pub model: String,
    pub duration_sec: f64,
    pub merged_behavior_count: usize,
}

/// A session record, keyed in the bucket by `(icdKey, uploadEpoch)`.
///
/// Fields not owned by the worker (manual annotations, review notes) are
/// round-tripped through `extra` so a read-modify-write never drops them.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub storage_path: String,
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_review_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub processing_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_json_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_video_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dominant_category: Option<Behavior>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub behavior_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker: Option<WorkerInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_source_video_path: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SessionRecord {
    /// Whether this record already carries a full artifact set. Together
    /// with a terminal status this gates idempotent re-entry.
    pub fn has_artifacts(&self) -> bool {
        self.analysis_json_path.is_some() && self.processed_video_path.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_human_labels() {
        let json = serde_json::to_string(&SessionStatus::PendingReview).unwrap();
        assert_eq!(json, "\"Pending review\"");
        let back: SessionStatus = serde_json::from_str("\"Awaiting\"").unwrap();
        assert_eq!(back, SessionStatus::Awaiting);
    }

    #[test]
    fn unknown_fields_survive_read_modify_write() {
        let raw = r#"{
            "storagePath": "child-videos/icd-abc/1234-a.mp4",
            "status": "Awaiting",
            "reviewNotes": "therapist comment",
            "manualAnnotations": [{"t": 3}]
        }"#;
        let mut record: SessionRecord = serde_json::from_str(raw).unwrap();
        record.status = SessionStatus::Processing;
        record.processing_started_at = Some(Utc::now());

        let out = serde_json::to_value(&record).unwrap();
        assert_eq!(out["status"], "Processing");
        assert_eq!(out["reviewNotes"], "therapist comment");
        assert_eq!(out["manualAnnotations"][0]["t"], 3);
    }

    #[test]
    fn terminal_success_gates_reprocessing() {
        assert!(SessionStatus::PendingReview.is_terminal_success());
        assert!(SessionStatus::Reviewed.is_terminal_success());
        assert!(!SessionStatus::Processing.is_terminal_success());
        assert!(!SessionStatus::Failed.is_terminal_success());
        assert!(!SessionStatus::Awaiting.is_terminal_success());
    }

    #[test]
    fn has_artifacts_requires_both_paths() {
        let mut r = SessionRecord::default();
        assert!(!r.has_artifacts());
        r.analysis_json_path = Some("analysis/a/1/behaviors_final.json".into());
        assert!(!r.has_artifacts());
        r.processed_video_path = Some("analysis/a/1/video_with_behaviors.mp4".into());
        assert!(r.has_artifacts());
    }
}
