//! Worker configuration.

use std::time::Duration;

use bscope_models::PathLayout;

/// Worker configuration, environment-driven with typed defaults.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Inference model identifier
    pub model: String,
    /// Sampling temperature for primary calls (the strict-JSON retry runs at 0)
    pub temperature: f64,
    /// In-flight inference requests per job
    pub concurrency: usize,
    /// Analysis window length in seconds
    pub chunk_seconds: f64,
    /// Overlap between consecutive windows in seconds
    pub chunk_overlap_seconds: f64,
    /// Frame-rate cap sent with each clip reference
    pub max_clip_fps: f64,
    /// Process-wide pause after a throttling signal
    pub rate_limit_pause: Duration,
    /// Retry budget for transient inference failures, per call
    pub max_transient_retries: u32,
    /// Fixed wait between transient retries
    pub transient_retry_interval: Duration,
    /// Hard wall-time cap per inference call
    pub call_timeout: Duration,
    /// Deadline for the uploaded media to report ACTIVE
    pub file_ready_timeout: Duration,
    /// Maximum gap bridged when coalescing same-key spans
    pub merge_gap_seconds: f64,
    /// Context added around a merged span for validation
    pub validation_margin_seconds: f64,
    /// Minimum emitted span length
    pub min_action_duration_seconds: f64,
    /// Root for per-job scratch directories
    pub work_dir: String,
    /// Bucket path layout
    pub layout: PathLayout,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            temperature: 0.4,
            concurrency: 5,
            chunk_seconds: 30.0,
            chunk_overlap_seconds: 4.0,
            max_clip_fps: 24.0,
            rate_limit_pause: Duration::from_millis(300_000),
            max_transient_retries: 3,
            transient_retry_interval: Duration::from_millis(60_000),
            call_timeout: Duration::from_millis(120_000),
            file_ready_timeout: Duration::from_millis(300_000),
            merge_gap_seconds: 2.5,
            validation_margin_seconds: 3.0,
            min_action_duration_seconds: 0.8,
            work_dir: "/tmp/bscope".to_string(),
            layout: PathLayout::default(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            model: std::env::var("MODEL").unwrap_or(defaults.model),
            temperature: env_parse("TEMPERATURE", defaults.temperature),
            concurrency: env_parse("CONCURRENCY", defaults.concurrency),
            chunk_seconds: env_parse("CHUNK_SECONDS", defaults.chunk_seconds),
            chunk_overlap_seconds: env_parse("CHUNK_OVERLAP_SECONDS", defaults.chunk_overlap_seconds),
            max_clip_fps: env_parse("MAX_CLIP_FPS", defaults.max_clip_fps),
            rate_limit_pause: Duration::from_millis(env_parse(
                "GLOBAL_RATE_LIMIT_PAUSE_MS",
                defaults.rate_limit_pause.as_millis() as u64,
            )),
            max_transient_retries: env_parse("MAX_TRANSIENT_RETRIES", defaults.max_transient_retries),
            transient_retry_interval: Duration::from_millis(env_parse(
                "TRANSIENT_RETRY_INTERVAL_MS",
                defaults.transient_retry_interval.as_millis() as u64,
            )),
            call_timeout: Duration::from_millis(env_parse(
                "CALL_TIMEOUT_MS",
                defaults.call_timeout.as_millis() as u64,
            )),
            file_ready_timeout: Duration::from_millis(env_parse(
                "FILE_READY_TIMEOUT_MS",
                defaults.file_ready_timeout.as_millis() as u64,
            )),
            merge_gap_seconds: env_parse("MERGE_GAP_SECONDS", defaults.merge_gap_seconds),
            validation_margin_seconds: env_parse(
                "VALIDATION_MARGIN_SECONDS",
                defaults.validation_margin_seconds,
            ),
            min_action_duration_seconds: env_parse(
                "MIN_ACTION_DURATION_SECONDS",
                defaults.min_action_duration_seconds,
            ),
            work_dir: std::env::var("WORK_DIR").unwrap_or(defaults.work_dir),
            layout: PathLayout {
                videos_prefix: std::env::var("VIDEOS_PREFIX")
                    .unwrap_or(defaults.layout.videos_prefix),
                sessions_prefix: std::env::var("SESSIONS_PREFIX")
                    .unwrap_or(defaults.layout.sessions_prefix),
                analysis_prefix: std::env::var("ANALYSIS_PREFIX")
                    .unwrap_or(defaults.layout.analysis_prefix),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_platform_contract() {
        let config = WorkerConfig::default();
        assert_eq!(config.model, "gemini-2.5-flash");
        assert_eq!(config.concurrency, 5);
        assert_eq!(config.chunk_seconds, 30.0);
        assert_eq!(config.chunk_overlap_seconds, 4.0);
        assert_eq!(config.rate_limit_pause, Duration::from_secs(300));
        assert_eq!(config.call_timeout, Duration::from_secs(120));
        assert_eq!(config.merge_gap_seconds, 2.5);
        assert_eq!(config.min_action_duration_seconds, 0.8);
    }
}
