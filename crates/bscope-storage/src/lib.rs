//! Blob storage for the behaviorscope platform.
//!
//! This crate provides:
//! - The `ObjectStore` capability set the worker is written against
//! - An S3-compatible client for the platform bucket
//! - An in-memory store used by tests

pub mod client;
pub mod error;
pub mod memory;
pub mod store;

pub use client::{StorageClient, StorageConfig};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
pub use store::{ObjectStore, UploadOptions};
