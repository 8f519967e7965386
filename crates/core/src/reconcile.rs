//! Reconciliation of the local tree against the remote listing
//!
//! Every local key ends up either in `to_upload` or in `unchanged`, and every
//! remote key with no local counterpart ends up in `to_delete`. A key present
//! on both sides is unchanged only when the MD5 of the local file equals the
//! provider's stored digest; modification times are never consulted since
//! site generators rewrite every file on each build.

use crate::error::Result;
use crate::hash::file_digest;
use crate::path::{digests_match, is_multipart_digest, normalize_key};
use crate::scanner::LocalEntry;
use crate::store::RemoteEntry;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::Path;
use tracing::{debug, info, warn};

/// Why a file is scheduled for upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadReason {
    /// No object with this key exists remotely
    New,
    /// The remote object's digest differs from the local content
    Changed,
    /// The local file could not be hashed, or the remote digest is not a
    /// content MD5, so the file is uploaded to be safe
    Unverified,
}

impl UploadReason {
    pub fn as_str(&self) -> &str {
        match self {
            UploadReason::New => "new",
            UploadReason::Changed => "changed",
            UploadReason::Unverified => "unverified",
        }
    }
}

impl std::fmt::Display for UploadReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A local file that must be uploaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingUpload {
    pub entry: LocalEntry,
    pub reason: UploadReason,
}

/// A file whose content could not be compared with its remote copy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HashWarning {
    pub key: String,
    pub message: String,
}

/// Classification of every local and remote key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationResult {
    pub to_upload: Vec<PendingUpload>,
    /// Remote keys with no local file, sorted
    pub to_delete: Vec<String>,
    /// Local keys whose remote copy is identical
    pub unchanged: Vec<String>,
    pub warnings: Vec<HashWarning>,
}

impl ReconciliationResult {
    /// Keys scheduled for upload
    pub fn upload_keys(&self) -> impl Iterator<Item = &str> {
        self.to_upload.iter().map(|u| u.entry.key.as_str())
    }

    /// Number of uploads with the given reason
    pub fn count(&self, reason: UploadReason) -> usize {
        self.to_upload.iter().filter(|u| u.reason == reason).count()
    }

    /// Total bytes that would be uploaded
    pub fn upload_bytes(&self) -> u64 {
        self.to_upload.iter().map(|u| u.entry.size).sum()
    }

    /// True when the bucket already matches the local tree
    pub fn is_in_sync(&self) -> bool {
        self.to_upload.is_empty() && self.to_delete.is_empty()
    }
}

/// Reconcile local files against a remote snapshot.
///
/// Files that exist on both sides are hashed concurrently, at most
/// `concurrency` at a time. A file that cannot be read is recorded as a
/// warning and scheduled for upload; it never aborts the reconciliation.
pub async fn reconcile(
    local: Vec<LocalEntry>,
    remote: Vec<RemoteEntry>,
    concurrency: usize,
) -> ReconciliationResult {
    let local: Vec<LocalEntry> = local.into_iter().map(canonical).collect();

    let digests = local_digests(&local, &remote, concurrency, file_digest).await;

    debug!(hashed = digests.len(), "Computed local digests");
    classify(local, remote, digests)
}

/// Hash the local files whose key also exists remotely, with at most
/// `concurrency` hashes in flight.
async fn local_digests<'a, H, Fut>(
    local: &'a [LocalEntry],
    remote: &[RemoteEntry],
    concurrency: usize,
    hasher: H,
) -> HashMap<String, Result<String>>
where
    H: Fn(&'a Path) -> Fut,
    Fut: Future<Output = Result<String>>,
{
    let remote_keys: HashSet<&str> = remote.iter().map(|r| r.key.as_str()).collect();
    stream::iter(
        local
            .iter()
            .filter(|entry| remote_keys.contains(entry.key.as_str())),
    )
    .map(|entry| {
        let digest = hasher(entry.absolute_path.as_path());
        async move { (entry.key.clone(), digest.await) }
    })
    .buffer_unordered(concurrency.max(1))
    .collect()
    .await
}

/// Classify local entries given precomputed digests.
///
/// `digests` holds the local digest for each key that also exists remotely.
/// A missing or failed digest, or a multipart remote ETag, makes the file
/// [`UploadReason::Unverified`].
pub fn classify(
    local: Vec<LocalEntry>,
    remote: Vec<RemoteEntry>,
    mut digests: HashMap<String, Result<String>>,
) -> ReconciliationResult {
    // Later duplicates overwrite earlier ones
    let remote_by_key: HashMap<String, RemoteEntry> =
        remote.into_iter().map(|r| (r.key.clone(), r)).collect();

    let mut result = ReconciliationResult::default();
    let mut local_keys = HashSet::with_capacity(local.len());

    for entry in local.into_iter().map(canonical) {
        local_keys.insert(entry.key.clone());

        let Some(remote_entry) = remote_by_key.get(&entry.key) else {
            debug!(key = %entry.key, "New file");
            result.to_upload.push(PendingUpload {
                entry,
                reason: UploadReason::New,
            });
            continue;
        };

        let problem = match digests.remove(&entry.key) {
            Some(Ok(digest)) if digests_match(&remote_entry.content_hash, &digest) => {
                debug!(key = %entry.key, "Unchanged");
                result.unchanged.push(entry.key);
                continue;
            }
            Some(Ok(_)) if is_multipart_digest(&remote_entry.content_hash) => {
                "multipart ETag cannot be verified".to_string()
            }
            Some(Ok(_)) => {
                debug!(key = %entry.key, "Content changed");
                result.to_upload.push(PendingUpload {
                    entry,
                    reason: UploadReason::Changed,
                });
                continue;
            }
            Some(Err(e)) => e.to_string(),
            None => "digest was not computed".to_string(),
        };

        warn!(key = %entry.key, error = %problem, "Cannot verify file, uploading it");
        result.warnings.push(HashWarning {
            key: entry.key.clone(),
            message: problem,
        });
        result.to_upload.push(PendingUpload {
            entry,
            reason: UploadReason::Unverified,
        });
    }

    result.to_delete = remote_by_key
        .into_keys()
        .filter(|key| !local_keys.contains(key))
        .collect();
    result.to_delete.sort();

    info!(
        upload = result.to_upload.len(),
        unchanged = result.unchanged.len(),
        delete = result.to_delete.len(),
        warnings = result.warnings.len(),
        "Reconciliation complete"
    );
    result
}

fn canonical(mut entry: LocalEntry) -> LocalEntry {
    entry.key = normalize_key(&entry.key);
    entry
}
