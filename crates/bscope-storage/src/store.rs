//! The blob capability set the worker is written against.

use std::path::Path;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StorageResult;

/// Options for an object upload.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub content_type: String,
    pub cache_control: String,
}

impl UploadOptions {
    /// Artifacts and records are never cached by intermediaries.
    pub fn no_store(content_type: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            cache_control: "no-store".to_string(),
        }
    }
}

/// Abstract object storage.
///
/// The worker only depends on this capability set; the S3-compatible client
/// and the in-memory test store both implement it.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    async fn download_to_file(&self, key: &str, dest: &Path) -> StorageResult<()>;

    async fn upload_from_file(
        &self,
        src: &Path,
        key: &str,
        options: &UploadOptions,
    ) -> StorageResult<()>;

    async fn read_bytes(&self, key: &str) -> StorageResult<Vec<u8>>;

    async fn write_bytes(
        &self,
        key: &str,
        bytes: Vec<u8>,
        options: &UploadOptions,
    ) -> StorageResult<()>;

    /// List object keys under a prefix.
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>>;
}

/// JSON helpers over the byte-level contract.
#[async_trait]
pub trait ObjectStoreJson: ObjectStore {
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> StorageResult<T> {
        let bytes = self.read_bytes(key).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn write_json<T: Serialize + Sync>(&self, key: &str, value: &T) -> StorageResult<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, bytes, &UploadOptions::no_store("application/json"))
            .await
    }
}

impl<S: ObjectStore + ?Sized> ObjectStoreJson for S {}
