//! Shared data models for the behaviorscope backend.
//!
//! This crate provides Serde-serializable types for:
//! - The closed behavior vocabulary and its visual/audio partition
//! - Detections, merged spans and validation results
//! - Analysis segments and the segmentation planner
//! - Session records and their lifecycle states
//! - Storage events and the bucket path layout
//! - Timestamp formatting (display and SRT)

pub mod behavior;
pub mod detection;
pub mod event;
pub mod paths;
pub mod segment;
pub mod session;
pub mod timestamp;

pub use behavior::{Behavior, Modality, BEHAVIOR_DEFINITIONS};
pub use detection::{AnalysisReport, Detection, ValidatedDetection, ValidationResult};
pub use event::{StorageEvent, OBJECT_FINALIZE};
pub use paths::PathLayout;
pub use segment::{plan_segments, Segment};
pub use session::{SessionRecord, SessionStatus, WorkerInfo};
pub use timestamp::{format_seconds, format_srt_seconds, round3};
