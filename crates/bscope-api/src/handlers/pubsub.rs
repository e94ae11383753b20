//! Storage-finalize push handler.

use std::collections::HashMap;

use axum::extract::State;
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::{json, Value};

use bscope_models::StorageEvent;
use bscope_worker::ProcessOutcome;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Push-subscription envelope.
#[derive(Debug, Deserialize)]
pub struct PushEnvelope {
    pub message: PushMessage,
}

#[derive(Debug, Default, Deserialize)]
pub struct PushMessage {
    /// Base64-encoded JSON event payload.
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

/// Event payload as encoded in `message.data`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventPayload {
    event_type: Option<String>,
    bucket: Option<String>,
    bucket_id: Option<String>,
    name: Option<String>,
    object_id: Option<String>,
}

/// Decode the envelope into a storage event, falling back to the message
/// attributes for fields the payload omits.
pub fn decode_event(envelope: &PushEnvelope) -> ApiResult<StorageEvent> {
    let payload: EventPayload = envelope
        .message
        .data
        .as_deref()
        .and_then(|data| BASE64.decode(data).ok())
        .and_then(|bytes| serde_json::from_slice(&bytes).ok())
        .unwrap_or_default();

    let attributes = &envelope.message.attributes;
    let attr = |key: &str| attributes.get(key).cloned();

    let event_type = payload
        .event_type
        .or_else(|| attr("eventType"))
        .ok_or_else(|| ApiError::bad_request("envelope carries no event type"))?;
    let bucket_name = payload
        .bucket
        .or(payload.bucket_id)
        .or_else(|| attr("bucketId"))
        .unwrap_or_default();
    let object_name = payload
        .name
        .or(payload.object_id)
        .or_else(|| attr("objectId"))
        .ok_or_else(|| ApiError::bad_request("envelope carries no object name"))?;

    Ok(StorageEvent {
        event_type,
        bucket_name,
        object_name,
    })
}

/// `POST /pubsub/storage-finalize`.
///
/// 200 acknowledges the message (processed or intentionally ignored); any
/// worker error surfaces as 500 so the subscription retries.
pub async fn storage_finalize(
    State(state): State<AppState>,
    Json(envelope): Json<PushEnvelope>,
) -> ApiResult<Json<Value>> {
    let event = decode_event(&envelope)?;

    match state.processor.handle(&event).await? {
        ProcessOutcome::Processed {
            icd_key,
            upload_epoch,
            merged_behavior_count,
            dominant_category,
        } => Ok(Json(json!({
            "ok": true,
            "icdKey": icd_key,
            "uploadEpoch": upload_epoch,
            "mergedBehaviorCount": merged_behavior_count,
            "dominantCategory": dominant_category,
        }))),
        ProcessOutcome::Ignored { reason } => Ok(Json(json!({
            "ignored": true,
            "reason": reason,
        }))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(data: Option<Value>, attributes: &[(&str, &str)]) -> PushEnvelope {
        PushEnvelope {
            message: PushMessage {
                data: data.map(|value| BASE64.encode(value.to_string())),
                attributes: attributes
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            },
        }
    }

    #[test]
    fn decodes_base64_payload() {
        let event = decode_event(&envelope(
            Some(json!({
                "eventType": "OBJECT_FINALIZE",
                "bucket": "platform-bucket",
                "name": "child-videos/icd-a/1-x.mp4"
            })),
            &[],
        ))
        .unwrap();

        assert_eq!(event.event_type, "OBJECT_FINALIZE");
        assert_eq!(event.bucket_name, "platform-bucket");
        assert_eq!(event.object_name, "child-videos/icd-a/1-x.mp4");
    }

    #[test]
    fn missing_payload_fields_fall_back_to_attributes() {
        let event = decode_event(&envelope(
            Some(json!({"name": "child-videos/icd-a/1-x.mp4"})),
            &[("eventType", "OBJECT_FINALIZE"), ("bucketId", "attr-bucket")],
        ))
        .unwrap();

        assert_eq!(event.event_type, "OBJECT_FINALIZE");
        assert_eq!(event.bucket_name, "attr-bucket");
    }

    #[test]
    fn attributes_alone_are_enough() {
        let event = decode_event(&envelope(
            None,
            &[
                ("eventType", "OBJECT_DELETE"),
                ("bucketId", "b"),
                ("objectId", "child-videos/icd-a/1-x.mp4"),
            ],
        ))
        .unwrap();
        assert_eq!(event.event_type, "OBJECT_DELETE");
    }

    #[test]
    fn payload_object_id_variant_is_accepted() {
        let event = decode_event(&envelope(
            Some(json!({
                "eventType": "OBJECT_FINALIZE",
                "bucketId": "b",
                "objectId": "child-videos/icd-a/1-x.mp4"
            })),
            &[],
        ))
        .unwrap();
        assert_eq!(event.object_name, "child-videos/icd-a/1-x.mp4");
    }

    #[test]
    fn garbled_data_still_uses_attributes() {
        let envelope = PushEnvelope {
            message: PushMessage {
                data: Some("not!!base64".to_string()),
                attributes: [
                    ("eventType".to_string(), "OBJECT_FINALIZE".to_string()),
                    ("objectId".to_string(), "child-videos/icd-a/1.mp4".to_string()),
                ]
                .into_iter()
                .collect(),
            },
        };
        let event = decode_event(&envelope).unwrap();
        assert_eq!(event.object_name, "child-videos/icd-a/1.mp4");
    }

    #[test]
    fn unresolvable_envelope_is_a_bad_request() {
        let err = decode_event(&envelope(None, &[])).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
