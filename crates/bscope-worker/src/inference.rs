//! The multimodal inference contract.
//!
//! The analyzer is written against this capability set; the Gemini client
//! implements it and tests script it.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error from the inference backend, carrying enough for the call policy
/// to classify it.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct InferenceError {
    pub status: Option<u16>,
    pub message: String,
    timed_out: bool,
}

impl InferenceError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            timed_out: false,
        }
    }

    pub fn timeout(after: Duration) -> Self {
        Self {
            status: None,
            message: format!("call timed out after {:?}", after),
            timed_out: true,
        }
    }

    /// Throttling: HTTP 429 or the backend's quota wording.
    pub fn is_rate_limit(&self) -> bool {
        if self.status == Some(429) {
            return true;
        }
        let message = self.message.to_lowercase();
        message.contains("resource_exhausted") || message.contains("rate limit")
    }

    /// Worth retrying after a fixed wait: 5xx, capacity wording, timeouts.
    pub fn is_transient(&self) -> bool {
        if self.timed_out {
            return true;
        }
        if matches!(self.status, Some(code) if code >= 500) {
            return true;
        }
        let message = self.message.to_lowercase();
        message.contains("internal")
            || message.contains("unavailable")
            || message.contains("deadline exceeded")
    }
}

/// State of media uploaded to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaState {
    Processing,
    Active,
    Error,
}

/// Handle to uploaded media, re-fetched by name until ACTIVE.
#[derive(Debug, Clone)]
pub struct MediaHandle {
    pub name: String,
    pub uri: Option<String>,
    pub state: MediaState,
}

/// Reference to a window of uploaded media within a generate request.
#[derive(Debug, Clone)]
pub struct MediaRef {
    pub uri: String,
    pub mime_type: String,
    pub start_offset_sec: f64,
    pub end_offset_sec: f64,
    pub fps: Option<f64>,
}

/// One structured generation request.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub media: MediaRef,
    pub prompt: String,
    pub temperature: f64,
    pub response_schema: serde_json::Value,
}

/// Abstract multimodal inference backend.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Upload a local media file; the returned handle may still be
    /// `PROCESSING`.
    async fn upload_media(&self, path: &Path, mime_type: &str)
        -> Result<MediaHandle, InferenceError>;

    /// Re-fetch an uploaded media handle by name.
    async fn get_media(&self, name: &str) -> Result<MediaHandle, InferenceError>;

    /// Run one generation request, returning the response text.
    async fn generate(&self, request: &GenerateRequest) -> Result<String, InferenceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_classification() {
        assert!(InferenceError::new(Some(429), "quota").is_rate_limit());
        assert!(InferenceError::new(None, "RESOURCE_EXHAUSTED: slow down").is_rate_limit());
        assert!(InferenceError::new(None, "model rate limit reached").is_rate_limit());
        assert!(!InferenceError::new(Some(500), "internal").is_rate_limit());
    }

    #[test]
    fn transient_classification() {
        assert!(InferenceError::new(Some(500), "boom").is_transient());
        assert!(InferenceError::new(Some(503), "unavailable").is_transient());
        assert!(InferenceError::new(None, "INTERNAL error").is_transient());
        assert!(InferenceError::new(None, "deadline exceeded").is_transient());
        assert!(InferenceError::timeout(Duration::from_secs(120)).is_transient());
        assert!(!InferenceError::new(Some(400), "invalid argument").is_transient());
    }

    #[test]
    fn media_state_parses_backend_casing() {
        let state: MediaState = serde_json::from_str("\"ACTIVE\"").unwrap();
        assert_eq!(state, MediaState::Active);
    }
}
