//! Worker error types.

use thiserror::Error;

use crate::inference::InferenceError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Session record not found: {0}")]
    SessionNotFound(String),

    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Analysis failed: {0}")]
    AnalysisFailed(String),

    #[error("Uploaded media not ready: {0}")]
    MediaNotReady(String),

    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),

    #[error("Media error: {0}")]
    Media(#[from] bscope_media::MediaError),

    #[error("Storage error: {0}")]
    Storage(#[from] bscope_storage::StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WorkerError {
    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    pub fn analysis_failed(msg: impl Into<String>) -> Self {
        Self::AnalysisFailed(msg.into())
    }

    pub fn media_not_ready(msg: impl Into<String>) -> Self {
        Self::MediaNotReady(msg.into())
    }
}
