//! Storage notification events.

use serde::{Deserialize, Serialize};

/// The only event type the worker processes.
pub const OBJECT_FINALIZE: &str = "OBJECT_FINALIZE";

/// A decoded object-change notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageEvent {
    pub event_type: String,
    pub bucket_name: String,
    pub object_name: String,
}

impl StorageEvent {
    pub fn is_finalize(&self) -> bool {
        self.event_type == OBJECT_FINALIZE
    }
}
