//! Gemini client for multimodal video analysis.
//!
//! Talks to the Generative Language API directly over HTTP: file upload,
//! file state polling, and schema-constrained `generateContent` calls
//! against an uploaded video window.

use std::path::Path;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::inference::{
    GenerateRequest, InferenceBackend, InferenceError, MediaHandle, MediaState,
};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini API client.
pub struct GeminiClient {
    api_key: String,
    model: String,
    base_url: String,
    client: Client,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateBody {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    file_data: Option<FileData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    video_metadata: Option<VideoMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileData {
    file_uri: String,
    mime_type: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VideoMetadata {
    start_offset: String,
    end_offset: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fps: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    response_mime_type: String,
    response_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: FileInfo,
}

#[derive(Debug, Deserialize)]
struct FileInfo {
    name: String,
    uri: Option<String>,
    state: Option<MediaState>,
}

impl From<FileInfo> for MediaHandle {
    fn from(info: FileInfo) -> Self {
        MediaHandle {
            name: info.name,
            uri: info.uri,
            state: info.state.unwrap_or(MediaState::Processing),
        }
    }
}

impl GeminiClient {
    /// Create a client for the given model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: Client::new(),
        }
    }

    /// Create from `GEMINI_API_KEY`.
    pub fn from_env(model: impl Into<String>) -> Result<Self, InferenceError> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| InferenceError::new(None, "GEMINI_API_KEY not set"))?;
        Ok(Self::new(api_key, model))
    }

    /// Point at a different API host (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn read_error(response: reqwest::Response) -> InferenceError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        InferenceError::new(Some(status), format!("API returned {}: {}", status, body))
    }

    fn request_error(e: reqwest::Error) -> InferenceError {
        InferenceError::new(e.status().map(|s| s.as_u16()), e.to_string())
    }

    fn offset(seconds: f64) -> String {
        format!("{}s", seconds)
    }
}

#[async_trait]
impl InferenceBackend for GeminiClient {
    async fn upload_media(
        &self,
        path: &Path,
        mime_type: &str,
    ) -> Result<MediaHandle, InferenceError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| InferenceError::new(None, format!("read {}: {}", path.display(), e)))?;

        debug!("Uploading {} ({} bytes) to Gemini", path.display(), bytes.len());

        let url = format!("{}/upload/v1beta/files?key={}", self.base_url, self.api_key);
        let response = self
            .client
            .post(&url)
            .header("X-Goog-Upload-Protocol", "raw")
            .header("Content-Type", mime_type)
            .body(bytes)
            .send()
            .await
            .map_err(Self::request_error)?;

        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }

        let upload: UploadResponse = response.json().await.map_err(Self::request_error)?;
        Ok(upload.file.into())
    }

    async fn get_media(&self, name: &str) -> Result<MediaHandle, InferenceError> {
        let url = format!("{}/v1beta/{}?key={}", self.base_url, name, self.api_key);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(Self::request_error)?;

        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }

        let info: FileInfo = response.json().await.map_err(Self::request_error)?;
        Ok(info.into())
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String, InferenceError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let body = GenerateBody {
            contents: vec![Content {
                parts: vec![
                    Part {
                        file_data: Some(FileData {
                            file_uri: request.media.uri.clone(),
                            mime_type: request.media.mime_type.clone(),
                        }),
                        video_metadata: Some(VideoMetadata {
                            start_offset: Self::offset(request.media.start_offset_sec),
                            end_offset: Self::offset(request.media.end_offset_sec),
                            fps: request.media.fps,
                        }),
                        text: None,
                    },
                    Part {
                        file_data: None,
                        video_metadata: None,
                        text: Some(request.prompt.clone()),
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
                response_mime_type: "application/json".to_string(),
                response_schema: request.response_schema.clone(),
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(Self::request_error)?;

        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }

        let parsed: GenerateResponse = response.json().await.map_err(Self::request_error)?;
        let text: String = parsed
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.is_empty() {
            warn!("Gemini response carried no text content");
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_render_whole_and_fractional_seconds() {
        assert_eq!(GeminiClient::offset(26.0), "26s");
        assert_eq!(GeminiClient::offset(45.5), "45.5s");
        assert_eq!(GeminiClient::offset(0.0), "0s");
    }

    #[test]
    fn generate_body_shape_matches_the_api() {
        let body = GenerateBody {
            contents: vec![Content {
                parts: vec![
                    Part {
                        file_data: Some(FileData {
                            file_uri: "https://files/abc".to_string(),
                            mime_type: "video/mp4".to_string(),
                        }),
                        video_metadata: Some(VideoMetadata {
                            start_offset: "26s".to_string(),
                            end_offset: "56s".to_string(),
                            fps: Some(24.0),
                        }),
                        text: None,
                    },
                    Part {
                        file_data: None,
                        video_metadata: None,
                        text: Some("prompt".to_string()),
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: 0.4,
                response_mime_type: "application/json".to_string(),
                response_schema: serde_json::json!({"type": "ARRAY"}),
            },
        };

        let json = serde_json::to_value(&body).unwrap();
        let media_part = &json["contents"][0]["parts"][0];
        assert_eq!(media_part["fileData"]["fileUri"], "https://files/abc");
        assert_eq!(media_part["videoMetadata"]["startOffset"], "26s");
        assert_eq!(media_part["videoMetadata"]["fps"], 24.0);
        assert!(media_part.get("text").is_none());
        assert_eq!(json["contents"][0]["parts"][1]["text"], "prompt");
        assert_eq!(json["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(json["generationConfig"]["responseSchema"]["type"], "ARRAY");
    }

    #[test]
    fn upload_response_parses_into_a_handle() {
        let raw = r#"{"file": {"name": "files/x1", "uri": "https://files/x1", "state": "PROCESSING"}}"#;
        let upload: UploadResponse = serde_json::from_str(raw).unwrap();
        let handle: MediaHandle = upload.file.into();
        assert_eq!(handle.name, "files/x1");
        assert_eq!(handle.state, MediaState::Processing);
    }
}
