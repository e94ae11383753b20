//! Analyzer orchestrator.
//!
//! Drives one job end to end: overlay burn-in, media upload and readiness,
//! window planning, detection, merge, validation, second merge, artifact
//! files and the subtitle-burned output video. Unit skips never fail the
//! job; upload readiness and the final burn do.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use bscope_media::{burn_subtitles, burn_timestamp_overlay, probe_duration, probe_fps, render_srt};
use bscope_models::paths::{
    BEHAVIORS_FINAL_JSON, BEHAVIORS_RAW_JSON, BEHAVIORS_VALIDATED_JSON, PROCESSED_VIDEO_MP4,
};
use bscope_models::{plan_segments, round3, AnalysisReport, Behavior, Detection};

use crate::config::WorkerConfig;
use crate::detect::{enforce_min_duration, run_detection_stage};
use crate::error::{WorkerError, WorkerResult};
use crate::inference::{InferenceBackend, MediaHandle, MediaState};
use crate::logging::JobLogger;
use crate::merge::merge_detections;
use crate::policy::CallPolicy;
use crate::rate_limit::RateGate;
use crate::validate::run_validation_stage;

/// Everything the job processor needs to publish a finished analysis.
#[derive(Debug)]
pub struct AnalyzerOutput {
    pub raw_json: PathBuf,
    pub validated_json: PathBuf,
    pub final_json: PathBuf,
    pub processed_video: PathBuf,
    pub duration_sec: f64,
    pub merged_behavior_count: usize,
    pub dominant_category: Option<Behavior>,
    pub behavior_summary: Option<String>,
}

/// Orchestrates the analysis pipeline for one downloaded source video.
pub struct Analyzer {
    backend: Arc<dyn InferenceBackend>,
    config: Arc<WorkerConfig>,
    gate: Arc<RateGate>,
}

impl Analyzer {
    pub fn new(
        backend: Arc<dyn InferenceBackend>,
        config: Arc<WorkerConfig>,
        gate: Arc<RateGate>,
    ) -> Self {
        Self {
            backend,
            config,
            gate,
        }
    }

    /// Run the full pipeline, writing artifacts into `work_dir`.
    pub async fn analyze(
        &self,
        source: &Path,
        work_dir: &Path,
        logger: &JobLogger,
    ) -> WorkerResult<AnalyzerOutput> {
        // Overlay failure degrades to analyzing the original video.
        let overlay_path = work_dir.join("analysis_input.mp4");
        let analysis_input = match burn_timestamp_overlay(source, &overlay_path).await {
            Ok(()) => overlay_path,
            Err(e) => {
                logger.log_warning(&format!(
                    "Timestamp overlay failed, analyzing the original video: {}",
                    e
                ));
                source.to_path_buf()
            }
        };

        logger.log_progress("Uploading analysis input to the inference backend");
        let handle = self
            .backend
            .upload_media(&analysis_input, "video/mp4")
            .await?;
        let uri = self.wait_until_active(handle).await?;

        let duration = probe_duration(&analysis_input).await?;
        let fps = match probe_fps(&analysis_input).await {
            Ok(fps) => fps,
            Err(e) => {
                logger.log_warning(&format!("Frame-rate probe failed: {}", e));
                None
            }
        };
        let effective_fps = fps.map(|f| f.min(self.config.max_clip_fps));
        let segments = plan_segments(
            duration,
            self.config.chunk_seconds,
            self.config.chunk_overlap_seconds,
        );
        logger.log_progress(&format!(
            "Planned {} windows over {:.1}s of video",
            segments.len(),
            duration
        ));

        let policy = CallPolicy::new(Arc::clone(&self.gate), &self.config);

        let raw = run_detection_stage(
            Arc::clone(&self.backend),
            policy.clone(),
            Arc::clone(&self.config),
            uri.clone(),
            effective_fps,
            segments,
        )
        .await;
        logger.log_progress(&format!("Detection produced {} raw spans", raw.len()));
        let raw_json = work_dir.join(BEHAVIORS_RAW_JSON);
        write_json_file(&raw_json, &raw).await?;

        let merged = merge_detections(raw, self.config.merge_gap_seconds);

        let validated = run_validation_stage(
            Arc::clone(&self.backend),
            policy,
            Arc::clone(&self.config),
            uri,
            effective_fps,
            duration,
            merged,
        )
        .await;
        let validated_json = work_dir.join(BEHAVIORS_VALIDATED_JSON);
        write_json_file(&validated_json, &validated).await?;

        let final_spans = self.finalize_spans(
            merge_detections(
                validated.iter().map(|v| v.detection.clone()).collect(),
                self.config.merge_gap_seconds,
            ),
            duration,
        );

        let dominant_category = dominant_category(&final_spans);
        let report = AnalysisReport {
            generated_at: Utc::now(),
            dominant_category,
            total_behaviors: final_spans.len(),
            behaviors: final_spans.clone(),
        };
        let final_json = work_dir.join(BEHAVIORS_FINAL_JSON);
        write_json_file(&final_json, &report).await?;

        let srt_path = work_dir.join("behaviors.srt");
        tokio::fs::write(&srt_path, render_srt(&final_spans)).await?;

        // No output video means no artifact set: the burn is fatal.
        let processed_video = work_dir.join(PROCESSED_VIDEO_MP4);
        burn_subtitles(&analysis_input, &processed_video, &srt_path).await?;

        let behavior_summary = behavior_summary(&final_spans);
        logger.log_progress(&format!(
            "Analysis finished with {} merged behaviors",
            final_spans.len()
        ));

        Ok(AnalyzerOutput {
            raw_json,
            validated_json,
            final_json,
            processed_video,
            duration_sec: duration,
            merged_behavior_count: final_spans.len(),
            dominant_category,
            behavior_summary,
        })
    }

    /// Poll the uploaded media every second until it reports ACTIVE,
    /// bounded by the readiness deadline. Returns the media URI.
    async fn wait_until_active(&self, handle: MediaHandle) -> WorkerResult<String> {
        let deadline = tokio::time::Instant::now() + self.config.file_ready_timeout;
        let mut current = handle;
        loop {
            match current.state {
                MediaState::Active => {
                    return current.uri.ok_or_else(|| {
                        WorkerError::media_not_ready(format!(
                            "media {} is ACTIVE but has no URI",
                            current.name
                        ))
                    });
                }
                MediaState::Error => {
                    return Err(WorkerError::media_not_ready(format!(
                        "media {} entered ERROR state",
                        current.name
                    )));
                }
                MediaState::Processing => {
                    if tokio::time::Instant::now() >= deadline {
                        return Err(WorkerError::media_not_ready(format!(
                            "media {} not ACTIVE within {:?}",
                            current.name, self.config.file_ready_timeout
                        )));
                    }
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    current = self.backend.get_media(&current.name).await?;
                }
            }
        }
    }

    /// Clamp spans into `[0, duration]` and round to artifact precision.
    fn finalize_spans(&self, spans: Vec<Detection>, duration: f64) -> Vec<Detection> {
        spans
            .into_iter()
            .map(|mut span| {
                let (start, end) = enforce_min_duration(
                    span.start_sec,
                    span.end_sec,
                    0.0,
                    duration,
                    self.config.min_action_duration_seconds,
                );
                span.start_sec = round3(start);
                span.end_sec = round3(end);
                span
            })
            .collect()
    }
}

async fn write_json_file<T: Serialize>(path: &Path, value: &T) -> WorkerResult<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    tokio::fs::write(path, bytes).await?;
    Ok(())
}

/// The behavior with the highest span count; first occurrence wins ties.
pub fn dominant_category(spans: &[Detection]) -> Option<Behavior> {
    let mut counts: Vec<(Behavior, usize)> = Vec::new();
    for span in spans {
        match counts.iter_mut().find(|(b, _)| *b == span.behavior) {
            Some((_, n)) => *n += 1,
            None => counts.push((span.behavior, 1)),
        }
    }

    let mut best: Option<(Behavior, usize)> = None;
    for (behavior, count) in counts {
        let is_better = best.map(|(_, c)| count > c).unwrap_or(true);
        if is_better {
            best = Some((behavior, count));
        }
    }
    best.map(|(behavior, _)| behavior)
}

/// Per-behavior counts in first-appearance order, e.g.
/// `"body-rocking x3, crying x1"`. `None` for an empty span set.
pub fn behavior_summary(spans: &[Detection]) -> Option<String> {
    if spans.is_empty() {
        return None;
    }
    let mut counts: Vec<(Behavior, usize)> = Vec::new();
    for span in spans {
        match counts.iter_mut().find(|(b, _)| *b == span.behavior) {
            Some((_, n)) => *n += 1,
            None => counts.push((span.behavior, 1)),
        }
    }
    Some(
        counts
            .into_iter()
            .map(|(behavior, count)| format!("{} x{}", behavior, count))
            .collect::<Vec<_>>()
            .join(", "),
    )
}
