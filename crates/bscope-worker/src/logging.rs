//! Structured job logging.
//!
//! Stamps every job-lifecycle line with the session key and operation so a
//! single job can be followed through interleaved worker output.

use tracing::{error, info, warn};

/// Logger bound to one job.
#[derive(Debug, Clone)]
pub struct JobLogger {
    session: String,
    operation: String,
}

impl JobLogger {
    /// Create a logger for a session `(icdKey, uploadEpoch)` and operation.
    pub fn new(icd_key: &str, upload_epoch: Option<i64>, operation: &str) -> Self {
        let session = match upload_epoch {
            Some(epoch) => format!("{}/{}", icd_key, epoch),
            None => icd_key.to_string(),
        };
        Self {
            session,
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(session = %self.session, operation = %self.operation, "Job started: {}", message);
    }

    pub fn log_progress(&self, message: &str) {
        info!(session = %self.session, operation = %self.operation, "Job progress: {}", message);
    }

    pub fn log_warning(&self, message: &str) {
        warn!(session = %self.session, operation = %self.operation, "Job warning: {}", message);
    }

    pub fn log_error(&self, message: &str) {
        error!(session = %self.session, operation = %self.operation, "Job error: {}", message);
    }

    pub fn log_completion(&self, message: &str) {
        info!(session = %self.session, operation = %self.operation, "Job completed: {}", message);
    }

    pub fn session(&self) -> &str {
        &self.session
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_key_includes_epoch_when_known() {
        let logger = JobLogger::new("icd-f84", Some(1712000000), "analysis");
        assert_eq!(logger.session(), "icd-f84/1712000000");

        let bare = JobLogger::new("icd-f84", None, "analysis");
        assert_eq!(bare.session(), "icd-f84");
    }
}
