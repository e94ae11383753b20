//! Scripted inference backend for unit tests.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::inference::{
    GenerateRequest, InferenceBackend, InferenceError, MediaHandle, MediaState,
};

type GenerateFn = dyn Fn(&GenerateRequest) -> Result<String, InferenceError> + Send + Sync;

/// Inference backend driven by a closure, with a scriptable media-state
/// sequence for upload polling.
pub(crate) struct ScriptedBackend {
    generate: Box<GenerateFn>,
    media_states: Mutex<VecDeque<MediaState>>,
    pub generate_calls: AtomicUsize,
    pub media_polls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new<F>(generate: F) -> Self
    where
        F: Fn(&GenerateRequest) -> Result<String, InferenceError> + Send + Sync + 'static,
    {
        Self {
            generate: Box::new(generate),
            media_states: Mutex::new(VecDeque::new()),
            generate_calls: AtomicUsize::new(0),
            media_polls: AtomicUsize::new(0),
        }
    }

    /// States returned by successive `get_media` calls; once drained, the
    /// media reports ACTIVE forever.
    pub fn with_media_states(self, states: Vec<MediaState>) -> Self {
        *self.media_states.lock().unwrap() = states.into();
        self
    }

    pub fn generate_call_count(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InferenceBackend for ScriptedBackend {
    async fn upload_media(
        &self,
        _path: &Path,
        _mime_type: &str,
    ) -> Result<MediaHandle, InferenceError> {
        Ok(MediaHandle {
            name: "files/test".to_string(),
            uri: Some("https://files/test".to_string()),
            state: MediaState::Processing,
        })
    }

    async fn get_media(&self, name: &str) -> Result<MediaHandle, InferenceError> {
        self.media_polls.fetch_add(1, Ordering::SeqCst);
        let state = self
            .media_states
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(MediaState::Active);
        Ok(MediaHandle {
            name: name.to_string(),
            uri: Some("https://files/test".to_string()),
            state,
        })
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String, InferenceError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        (self.generate)(request)
    }
}
