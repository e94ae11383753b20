//! Application state.

use std::sync::Arc;

use bscope_storage::StorageClient;
use bscope_worker::{GeminiClient, JobProcessor, WorkerConfig};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub processor: Arc<JobProcessor>,
}

impl AppState {
    /// Create application state from the environment.
    pub fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let worker_config = WorkerConfig::from_env();
        let storage = StorageClient::from_env()?;
        let backend = GeminiClient::from_env(worker_config.model.clone())?;

        let processor = JobProcessor::new(Arc::new(storage), Arc::new(backend), worker_config);

        Ok(Self {
            config,
            processor: Arc::new(processor),
        })
    }

    /// Create state around an existing processor (tests).
    pub fn with_processor(config: ApiConfig, processor: JobProcessor) -> Self {
        Self {
            config,
            processor: Arc::new(processor),
        }
    }
}
