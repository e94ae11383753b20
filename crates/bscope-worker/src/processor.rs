//! Job processor.
//!
//! Resolves a storage event to its session record, runs the analyzer,
//! publishes the artifact set, and owns the session state machine for the
//! duration of the job.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info};

use bscope_models::paths::{
    BEHAVIORS_FINAL_JSON, BEHAVIORS_RAW_JSON, BEHAVIORS_VALIDATED_JSON, PROCESSED_VIDEO_MP4,
};
use bscope_models::{Behavior, SessionRecord, SessionStatus, StorageEvent, WorkerInfo};
use bscope_storage::store::ObjectStoreJson;
use bscope_storage::{ObjectStore, UploadOptions};

use crate::analyzer::Analyzer;
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::inference::InferenceBackend;
use crate::logging::JobLogger;
use crate::rate_limit::RateGate;

/// Result of handling one storage event.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum ProcessOutcome {
    /// The event produced a full artifact set and a `Pending review` session.
    Processed {
        icd_key: String,
        upload_epoch: i64,
        merged_behavior_count: usize,
        dominant_category: Option<Behavior>,
    },
    /// The event was intentionally not processed.
    Ignored { reason: &'static str },
}

impl ProcessOutcome {
    fn ignored(reason: &'static str) -> Self {
        Self::Ignored { reason }
    }
}

/// Processes finalize events end to end.
pub struct JobProcessor {
    store: Arc<dyn ObjectStore>,
    backend: Arc<dyn InferenceBackend>,
    config: Arc<WorkerConfig>,
    gate: Arc<RateGate>,
}

impl JobProcessor {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        backend: Arc<dyn InferenceBackend>,
        config: WorkerConfig,
    ) -> Self {
        let gate = Arc::new(RateGate::new(config.rate_limit_pause));
        Self {
            store,
            backend,
            config: Arc::new(config),
            gate,
        }
    }

    /// Handle one storage event.
    ///
    /// Non-finalize events and paths outside the videos prefix are
    /// acknowledged as ignored. A missing session record is an error so the
    /// push subscription retries. Everything after the `Processing`
    /// transition fails the session on error before re-raising.
    pub async fn handle(&self, event: &StorageEvent) -> WorkerResult<ProcessOutcome> {
        if !event.is_finalize() {
            info!("Ignoring non-finalize event for {}", event.object_name);
            return Ok(ProcessOutcome::ignored("not_finalize"));
        }
        if !self.config.layout.is_source_video(&event.object_name) {
            info!("Ignoring out-of-scope object {}", event.object_name);
            return Ok(ProcessOutcome::ignored("out_of_scope"));
        }

        let (icd_key, epoch_hint) = self
            .config
            .layout
            .parse_source_video(&event.object_name)
            .ok_or_else(|| {
                WorkerError::job_failed(format!(
                    "Unparseable source video path: {}",
                    event.object_name
                ))
            })?;

        let (session_key, epoch, mut record) =
            self.resolve_session(&icd_key, epoch_hint, &event.object_name).await?;

        if record.status.is_terminal_success() && record.has_artifacts() {
            info!(
                "Session {} already processed ({}), skipping",
                session_key,
                record.status.as_str()
            );
            return Ok(ProcessOutcome::ignored("already_processed"));
        }

        let logger = JobLogger::new(&icd_key, Some(epoch), "video_analysis");
        logger.log_start(&format!("Processing {}", event.object_name));

        record.status = SessionStatus::Processing;
        record.processing_started_at = Some(Utc::now());
        record.processing_error = None;

        let result = async {
            self.store.write_json(&session_key, &record).await?;
            self.run_job(event, &icd_key, epoch, &session_key, &logger)
                .await
        }
        .await;

        match result {
            Ok(outcome) => {
                logger.log_completion("Artifacts published, session pending review");
                Ok(outcome)
            }
            Err(e) => {
                logger.log_error(&e.to_string());
                self.mark_failed(&session_key, &record, &e).await;
                Err(e)
            }
        }
    }

    /// Resolve the session record: direct key first, then a prefix scan
    /// matching on `storagePath`.
    async fn resolve_session(
        &self,
        icd_key: &str,
        epoch_hint: Option<i64>,
        object_name: &str,
    ) -> WorkerResult<(String, i64, SessionRecord)> {
        if let Some(epoch) = epoch_hint {
            let key = self.config.layout.session_key(icd_key, epoch);
            match self.store.read_json::<SessionRecord>(&key).await {
                Ok(record) => return Ok((key, epoch, record)),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.into()),
            }
        }

        let prefix = self.config.layout.session_prefix(icd_key);
        for key in self.store.list(&prefix).await? {
            if !key.ends_with(".json") {
                continue;
            }
            let Some(epoch) = session_epoch_from_key(&key) else {
                continue;
            };
            match self.store.read_json::<SessionRecord>(&key).await {
                Ok(record) if record.storage_path == object_name => {
                    return Ok((key, epoch, record));
                }
                Ok(_) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.into()),
            }
        }

        Err(WorkerError::SessionNotFound(format!(
            "{} (epoch {:?})",
            object_name, epoch_hint
        )))
    }

    /// Scratch dir, download, analyze, publish, commit.
    async fn run_job(
        &self,
        event: &StorageEvent,
        icd_key: &str,
        epoch: i64,
        session_key: &str,
        logger: &JobLogger,
    ) -> WorkerResult<ProcessOutcome> {
        tokio::fs::create_dir_all(&self.config.work_dir).await?;
        // Dropped unconditionally on job exit, success or not.
        let scratch = tempfile::Builder::new()
            .prefix("bscope-job-")
            .tempdir_in(&self.config.work_dir)?;

        let source = scratch.path().join("source.mp4");
        self.store
            .download_to_file(&event.object_name, &source)
            .await?;

        let analyzer = Analyzer::new(
            Arc::clone(&self.backend),
            Arc::clone(&self.config),
            Arc::clone(&self.gate),
        );
        let output = analyzer.analyze(&source, scratch.path(), logger).await?;

        let layout = &self.config.layout;
        let json = UploadOptions::no_store("application/json");
        let video = UploadOptions::no_store("video/mp4");

        let raw_key = layout.artifact_key(icd_key, epoch, BEHAVIORS_RAW_JSON);
        let validated_key = layout.artifact_key(icd_key, epoch, BEHAVIORS_VALIDATED_JSON);
        let final_key = layout.artifact_key(icd_key, epoch, BEHAVIORS_FINAL_JSON);
        let video_key = layout.artifact_key(icd_key, epoch, PROCESSED_VIDEO_MP4);

        self.store
            .upload_from_file(&output.raw_json, &raw_key, &json)
            .await?;
        self.store
            .upload_from_file(&output.validated_json, &validated_key, &json)
            .await?;
        self.store
            .upload_from_file(&output.final_json, &final_key, &json)
            .await?;
        self.store
            .upload_from_file(&output.processed_video, &video_key, &video)
            .await?;
        logger.log_progress("Uploaded artifact set");

        // Re-read right before the commit write so concurrent edits to
        // fields the worker does not own survive.
        let mut fresh: SessionRecord = self.store.read_json(session_key).await?;
        fresh.status = SessionStatus::PendingReview;
        fresh.pending_review_at = Some(Utc::now());
        fresh.processing_error = None;
        fresh.dominant_category = output.dominant_category;
        fresh.behavior_summary = output.behavior_summary.clone();
        fresh.analysis_json_path = Some(final_key);
        fresh.processed_video_path = Some(video_key);
        fresh.linked_source_video_path = Some(event.object_name.clone());
        fresh.worker = Some(WorkerInfo {
            model: self.config.model.clone(),
            duration_sec: output.duration_sec,
            merged_behavior_count: output.merged_behavior_count,
        });
        self.store.write_json(session_key, &fresh).await?;

        Ok(ProcessOutcome::Processed {
            icd_key: icd_key.to_string(),
            upload_epoch: epoch,
            merged_behavior_count: output.merged_behavior_count,
            dominant_category: output.dominant_category,
        })
    }

    /// Best-effort `Failed` transition; the original error still propagates.
    async fn mark_failed(&self, session_key: &str, last_known: &SessionRecord, cause: &WorkerError) {
        let mut record = match self.store.read_json::<SessionRecord>(session_key).await {
            Ok(fresh) => fresh,
            Err(e) => {
                error!("Could not re-read {} before failing it: {}", session_key, e);
                last_known.clone()
            }
        };
        record.status = SessionStatus::Failed;
        record.failed_at = Some(Utc::now());
        record.processing_error = Some(cause.to_string());

        if let Err(e) = self.store.write_json(session_key, &record).await {
            error!("Could not mark {} as failed: {}", session_key, e);
        }
    }
}

/// The epoch is the file stem of the session object key.
fn session_epoch_from_key(key: &str) -> Option<i64> {
    key.rsplit('/')
        .next()?
        .strip_suffix(".json")?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedBackend;
    use bscope_models::OBJECT_FINALIZE;
    use bscope_storage::MemoryStore;

    fn finalize_event(object_name: &str) -> StorageEvent {
        StorageEvent {
            event_type: OBJECT_FINALIZE.to_string(),
            bucket_name: "platform-bucket".to_string(),
            object_name: object_name.to_string(),
        }
    }

    fn processor_with_store(store: Arc<MemoryStore>) -> JobProcessor {
        let mut config = WorkerConfig::default();
        config.work_dir = std::env::temp_dir()
            .join("bscope-test-work")
            .to_string_lossy()
            .to_string();
        JobProcessor::new(
            store,
            Arc::new(ScriptedBackend::new(|_| Ok("[]".to_string()))),
            config,
        )
    }

    fn awaiting_record(storage_path: &str) -> SessionRecord {
        SessionRecord {
            storage_path: storage_path.to_string(),
            status: SessionStatus::Awaiting,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn non_finalize_events_are_ignored() {
        let store = Arc::new(MemoryStore::new());
        let processor = processor_with_store(Arc::clone(&store));

        let event = StorageEvent {
            event_type: "OBJECT_DELETE".to_string(),
            bucket_name: "b".to_string(),
            object_name: "child-videos/icd-a/1-x.mp4".to_string(),
        };
        let outcome = processor.handle(&event).await.unwrap();
        assert!(matches!(
            outcome,
            ProcessOutcome::Ignored { reason: "not_finalize" }
        ));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn out_of_scope_paths_are_ignored() {
        let store = Arc::new(MemoryStore::new());
        let processor = processor_with_store(Arc::clone(&store));

        let outcome = processor
            .handle(&finalize_event("exports/icd-a/1-x.pdf"))
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            ProcessOutcome::Ignored { reason: "out_of_scope" }
        ));
    }

    #[tokio::test]
    async fn missing_session_is_an_error_and_creates_nothing() {
        let store = Arc::new(MemoryStore::new());
        let processor = processor_with_store(Arc::clone(&store));

        let err = processor
            .handle(&finalize_event("child-videos/icd-abc/1234-file.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::SessionNotFound(_)));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn already_processed_session_is_left_untouched() {
        let store = Arc::new(MemoryStore::new());
        let mut record = awaiting_record("child-videos/icd-abc/1234-file.mp4");
        record.status = SessionStatus::PendingReview;
        record.analysis_json_path = Some("analysis/icd-abc/1234/behaviors_final.json".to_string());
        record.processed_video_path =
            Some("analysis/icd-abc/1234/video_with_behaviors.mp4".to_string());
        record
            .extra
            .insert("reviewNotes".to_string(), serde_json::json!("keep me"));
        store.insert_json("sessions/icd-abc/1234.json", &record);
        let before = store.read_bytes("sessions/icd-abc/1234.json").await.unwrap();

        let processor = processor_with_store(Arc::clone(&store));
        let outcome = processor
            .handle(&finalize_event("child-videos/icd-abc/1234-file.mp4"))
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            ProcessOutcome::Ignored { reason: "already_processed" }
        ));
        let after = store.read_bytes("sessions/icd-abc/1234.json").await.unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn reviewed_session_is_also_terminal() {
        let store = Arc::new(MemoryStore::new());
        let mut record = awaiting_record("child-videos/icd-abc/1234-file.mp4");
        record.status = SessionStatus::Reviewed;
        record.analysis_json_path = Some("a".to_string());
        record.processed_video_path = Some("b".to_string());
        store.insert_json("sessions/icd-abc/1234.json", &record);

        let processor = processor_with_store(Arc::clone(&store));
        let outcome = processor
            .handle(&finalize_event("child-videos/icd-abc/1234-file.mp4"))
            .await
            .unwrap();
        assert!(matches!(outcome, ProcessOutcome::Ignored { .. }));
    }

    #[tokio::test]
    async fn session_found_by_scan_when_filename_has_no_epoch() {
        let store = Arc::new(MemoryStore::new());
        store.insert_json(
            "sessions/icd-abc/1234.json",
            &awaiting_record("child-videos/icd-abc/video.mp4"),
        );

        let processor = processor_with_store(Arc::clone(&store));
        // Source object is missing, so the job fails after the Processing
        // transition; resolution itself must have succeeded via the scan.
        let err = processor
            .handle(&finalize_event("child-videos/icd-abc/video.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::Storage(_)));

        let record: SessionRecord = store
            .read_json("sessions/icd-abc/1234.json")
            .await
            .unwrap();
        assert_eq!(record.status, SessionStatus::Failed);
    }

    #[tokio::test]
    async fn failed_download_fails_the_session_with_the_error_message() {
        let store = Arc::new(MemoryStore::new());
        store.insert_json(
            "sessions/icd-abc/1234.json",
            &awaiting_record("child-videos/icd-abc/1234-file.mp4"),
        );

        let processor = processor_with_store(Arc::clone(&store));
        let err = processor
            .handle(&finalize_event("child-videos/icd-abc/1234-file.mp4"))
            .await
            .unwrap_err();

        let record: SessionRecord = store
            .read_json("sessions/icd-abc/1234.json")
            .await
            .unwrap();
        assert_eq!(record.status, SessionStatus::Failed);
        assert!(record.failed_at.is_some());
        let message = record.processing_error.unwrap();
        assert!(message.contains("child-videos/icd-abc/1234-file.mp4"));
        assert!(err.to_string().contains("child-videos/icd-abc/1234-file.mp4"));
        // No artifacts were recorded.
        assert!(record.analysis_json_path.is_none());
        assert!(record.processed_video_path.is_none());
    }

    #[tokio::test]
    async fn processing_transition_stamps_and_clears_fields() {
        let store = Arc::new(MemoryStore::new());
        let mut record = awaiting_record("child-videos/icd-abc/1234-file.mp4");
        record.processing_error = Some("stale failure".to_string());
        store.insert_json("sessions/icd-abc/1234.json", &record);

        let processor = processor_with_store(Arc::clone(&store));
        // Fails at download; the Processing transition already happened and
        // is then superseded by Failed. The stale error is replaced.
        let _ = processor
            .handle(&finalize_event("child-videos/icd-abc/1234-file.mp4"))
            .await;

        let after: SessionRecord = store
            .read_json("sessions/icd-abc/1234.json")
            .await
            .unwrap();
        assert_eq!(after.status, SessionStatus::Failed);
        assert!(after.processing_started_at.is_some());
        assert_ne!(after.processing_error.as_deref(), Some("stale failure"));
    }

    #[test]
    fn epoch_parses_from_session_keys() {
        assert_eq!(session_epoch_from_key("sessions/icd-a/1234.json"), Some(1234));
        assert_eq!(session_epoch_from_key("sessions/icd-a/notes.json"), None);
        assert_eq!(session_epoch_from_key("sessions/icd-a/1234"), None);
    }
}
