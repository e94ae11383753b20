//! Detection stage.
//!
//! Each analysis window is prompted independently; responses are parsed
//! strictly, then leniently, then re-requested once at temperature 0 before
//! the window degrades to an empty result. Parsed spans are normalized to
//! absolute time on the source video.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use bscope_models::{round3, Behavior, Detection, Modality, Segment};

use crate::config::WorkerConfig;
use crate::inference::{GenerateRequest, InferenceBackend, MediaRef};
use crate::policy::CallPolicy;
use crate::pool::run_indexed;
use crate::prompts::{detection_prompt, detection_schema, STRICT_JSON_REMINDER};

/// One span as the model reports it, clip-relative.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDetection {
    behavior: String,
    #[serde(default)]
    modality: Option<String>,
    start_sec: f64,
    end_sec: f64,
    #[serde(default)]
    notes: Option<String>,
}

/// Extract a JSON array from response text: strict parse first, then the
/// outermost bracketed slice.
pub(crate) fn extract_json_array(text: &str) -> Option<Vec<Value>> {
    let trimmed = text.trim();
    if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(trimmed) {
        return Some(items);
    }
    let start = trimmed.find('[')?;
    let end = trimmed.rfind(']')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&trimmed[start..=end]) {
        Ok(Value::Array(items)) => Some(items),
        _ => None,
    }
}

/// Clamp a span into `[lower, upper]` and stretch it to the minimum
/// duration, pulling the start back when the end hits the bound.
pub(crate) fn enforce_min_duration(
    start: f64,
    end: f64,
    lower: f64,
    upper: f64,
    min: f64,
) -> (f64, f64) {
    let start = start.clamp(lower, upper);
    let mut end = end.clamp(lower, upper);
    if end < start {
        end = start;
    }
    if end - start < min {
        let end = (start + min).min(upper);
        let start = (end - min).max(lower);
        return (start, end);
    }
    (start, end)
}

fn normalize_item(value: Value, segment: &Segment, min_duration: f64) -> Option<Detection> {
    let raw: RawDetection = serde_json::from_value(value).ok()?;
    let behavior = Behavior::parse(&raw.behavior)?;
    let modality = match raw.modality.as_deref() {
        Some(given) => Modality::parse(given)?,
        None => behavior.modality(),
    };
    if !raw.start_sec.is_finite() || !raw.end_sec.is_finite() || raw.end_sec < raw.start_sec {
        return None;
    }

    let window = segment.len();
    let start = raw.start_sec.clamp(0.0, window);
    let end = raw.end_sec.clamp(0.0, window);
    let (start, end) = enforce_min_duration(start, end, 0.0, window, min_duration);

    Some(Detection {
        behavior,
        modality,
        start_sec: round3(segment.start_sec + start),
        end_sec: round3(segment.start_sec + end),
        notes: raw.notes.unwrap_or_default().trim().to_string(),
    })
}

/// Normalize one window's parsed payload: closed-vocabulary check, modality
/// inference, absolute-time shift, minimum duration.
pub(crate) fn normalize_detections(
    values: Vec<Value>,
    segment: &Segment,
    min_duration: f64,
) -> Vec<Detection> {
    values
        .into_iter()
        .filter_map(|value| normalize_item(value, segment, min_duration))
        .collect()
}

async fn detect_segment(
    backend: Arc<dyn InferenceBackend>,
    policy: CallPolicy,
    config: Arc<WorkerConfig>,
    uri: String,
    fps: Option<f64>,
    segment: Segment,
    index: usize,
) -> Vec<Detection> {
    let label = format!("detect[{}]", index);
    let media = MediaRef {
        uri,
        mime_type: "video/mp4".to_string(),
        start_offset_sec: segment.start_sec,
        end_offset_sec: segment.end_sec,
        fps,
    };
    let request = GenerateRequest {
        media: media.clone(),
        prompt: detection_prompt(&segment),
        temperature: config.temperature,
        response_schema: detection_schema(),
    };

    let text = match policy.call(&label, || backend.generate(&request)).await {
        Ok(text) => text,
        Err(skip) => {
            warn!("{}", skip);
            return Vec::new();
        }
    };

    let values = match extract_json_array(&text) {
        Some(values) => values,
        None => {
            let retry = GenerateRequest {
                media,
                prompt: format!("{}{}", request.prompt, STRICT_JSON_REMINDER),
                temperature: 0.0,
                response_schema: detection_schema(),
            };
            match policy.call(&label, || backend.generate(&retry)).await {
                Ok(text) => match extract_json_array(&text) {
                    Some(values) => values,
                    None => {
                        warn!("{}: unparseable detection payload, yielding no spans", label);
                        Vec::new()
                    }
                },
                Err(skip) => {
                    warn!("{}", skip);
                    Vec::new()
                }
            }
        }
    };

    normalize_detections(values, &segment, config.min_action_duration_seconds)
}

/// Run detection over all windows under the bounded pool.
///
/// Returns detections flattened in window order; a window whose calls are
/// skipped contributes nothing, never an error.
pub async fn run_detection_stage(
    backend: Arc<dyn InferenceBackend>,
    policy: CallPolicy,
    config: Arc<WorkerConfig>,
    uri: String,
    fps: Option<f64>,
    segments: Vec<Segment>,
) -> Vec<Detection> {
    let concurrency = config.concurrency;
    let worker = move |segment: Segment, index: usize| {
        let backend = Arc::clone(&backend);
        let policy = policy.clone();
        let config = Arc::clone(&config);
        let uri = uri.clone();
        detect_segment(backend, policy, config, uri, fps, segment, index)
    };

    run_indexed(segments, concurrency, worker)
        .await
        .into_iter()
        .flatten()
        .collect()
}
