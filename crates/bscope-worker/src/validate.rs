//! Validation stage.
//!
//! Each merged span is re-examined against a margin-expanded clip. A
//! confirmed span carries refined bounds mapped back to absolute time; a
//! rejected span is dropped; a skipped validator carries the detector's
//! bounds forward rather than silently discarding the detection.

use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use bscope_models::{round3, Detection, ValidatedDetection, ValidationResult};

use crate::config::WorkerConfig;
use crate::detect::enforce_min_duration;
use crate::inference::{GenerateRequest, InferenceBackend, MediaRef};
use crate::policy::CallPolicy;
use crate::pool::run_indexed;
use crate::prompts::{validation_prompt, validation_schema, STRICT_JSON_REMINDER};

/// Extract a JSON object from response text: strict parse first, then the
/// outermost braced slice.
pub(crate) fn extract_json_object(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&trimmed[start..=end]) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

fn parse_validation(text: &str) -> Option<ValidationResult> {
    extract_json_object(text).and_then(|value| serde_json::from_value(value).ok())
}

/// Apply a confirmed verdict: map clip-relative bounds back to absolute,
/// clamp into the clip, and enforce the minimum duration.
fn refine(
    detection: &Detection,
    verdict: &ValidationResult,
    clip_start: f64,
    clip_end: f64,
    min_duration: f64,
) -> Detection {
    let start = verdict
        .start_sec
        .map(|s| clip_start + s)
        .unwrap_or(detection.start_sec)
        .clamp(clip_start, clip_end);
    let mut end = verdict
        .end_sec
        .map(|e| clip_start + e)
        .unwrap_or(detection.end_sec)
        .clamp(clip_start, clip_end);
    if end < start + 0.01 {
        end = (start + 0.01).min(clip_end);
    }
    let (start, end) = enforce_min_duration(start, end, clip_start, clip_end, min_duration);

    Detection {
        behavior: detection.behavior,
        modality: detection.modality,
        start_sec: round3(start),
        end_sec: round3(end),
        notes: detection.notes.clone(),
    }
}

async fn validate_span(
    backend: Arc<dyn InferenceBackend>,
    policy: CallPolicy,
    config: Arc<WorkerConfig>,
    uri: String,
    fps: Option<f64>,
    duration: f64,
    detection: Detection,
    index: usize,
) -> Option<ValidatedDetection> {
    let label = format!("validate[{}]", index);
    let clip_start = (detection.start_sec - config.validation_margin_seconds).max(0.0);
    let clip_end = (detection.end_sec + config.validation_margin_seconds).min(duration);

    let media = MediaRef {
        uri,
        mime_type: "video/mp4".to_string(),
        start_offset_sec: clip_start,
        end_offset_sec: clip_end,
        fps,
    };
    let request = GenerateRequest {
        media: media.clone(),
        prompt: validation_prompt(&detection, clip_start, clip_end),
        temperature: config.temperature,
        response_schema: validation_schema(),
    };

    let carry_unvalidated = || {
        Some(ValidatedDetection {
            detection: detection.clone(),
            skipped: true,
        })
    };

    let verdict = match policy.call(&label, || backend.generate(&request)).await {
        Ok(text) => match parse_validation(&text) {
            Some(verdict) => Some(verdict),
            None => {
                let retry = GenerateRequest {
                    media,
                    prompt: format!("{}{}", request.prompt, STRICT_JSON_REMINDER),
                    temperature: 0.0,
                    response_schema: validation_schema(),
                };
                match policy.call(&label, || backend.generate(&retry)).await {
                    Ok(text) => parse_validation(&text),
                    Err(skip) => {
                        warn!("{}", skip);
                        return carry_unvalidated();
                    }
                }
            }
        },
        Err(skip) => {
            warn!("{}", skip);
            return carry_unvalidated();
        }
    };

    match verdict {
        None => {
            warn!("{}: unparseable validation payload, carrying span unvalidated", label);
            carry_unvalidated()
        }
        Some(verdict) if !verdict.correct => None,
        Some(verdict) => Some(ValidatedDetection {
            detection: refine(
                &detection,
                &verdict,
                clip_start,
                clip_end,
                config.min_action_duration_seconds,
            ),
            skipped: false,
        }),
    }
}

/// Run validation over all merged spans under the bounded pool.
///
/// Returns the surviving spans in input order: confirmed spans with refined
/// bounds plus skipped spans carried forward unrefined.
pub async fn run_validation_stage(
    backend: Arc<dyn InferenceBackend>,
    policy: CallPolicy,
    config: Arc<WorkerConfig>,
    uri: String,
    fps: Option<f64>,
    duration: f64,
    merged: Vec<Detection>,
) -> Vec<ValidatedDetection> {
    let concurrency = config.concurrency;
    let worker = move |detection: Detection, index: usize| {
        let backend = Arc::clone(&backend);
        let policy = policy.clone();
        let config = Arc::clone(&config);
        let uri = uri.clone();
        validate_span(backend, policy, config, uri, fps, duration, detection, index)
    };

    run_indexed(merged, concurrency, worker)
        .await
        .into_iter()
        .flatten()
        .collect()
}
