//! Object store capability used by the deploy pipeline
//!
//! The pipeline only needs three operations from a bucket: a complete
//! listing, a single-object upload and a multi-object delete. [`BucketClient`]
//! implements them over the S3 API; tests substitute in-memory stores.
//!
//! [`BucketClient`]: crate::client::BucketClient

use crate::error::Result;
use crate::scanner::LocalEntry;
use async_trait::async_trait;
use serde::Serialize;

/// Largest multi-object delete accepted by S3-compatible providers
pub const DEFAULT_MAX_DELETE_BATCH: usize = 1000;

/// An object as reported by the remote listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteEntry {
    pub key: String,
    /// Provider checksum exactly as listed, possibly quoted
    pub content_hash: String,
}

impl RemoteEntry {
    pub fn new(key: impl Into<String>, content_hash: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            content_hash: content_hash.into(),
        }
    }
}

/// Remote bucket operations.
///
/// Implementations are bound to a single bucket for the lifetime of a run.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List every object in the bucket, following pagination to the end.
    async fn list(&self) -> Result<Vec<RemoteEntry>>;

    /// Upload one local file under its key.
    async fn put(&self, entry: &LocalEntry) -> Result<()>;

    /// Delete a batch of keys in as few requests as the provider allows.
    ///
    /// Returns [`Error::PartialDelete`] listing the keys that failed when the
    /// provider accepted the request but rejected some of its keys.
    ///
    /// [`Error::PartialDelete`]: crate::error::Error::PartialDelete
    async fn delete_batch(&self, keys: &[String]) -> Result<()>;

    /// Maximum number of keys accepted by one `delete_batch` call.
    fn max_delete_batch(&self) -> usize {
        DEFAULT_MAX_DELETE_BATCH
    }
}
