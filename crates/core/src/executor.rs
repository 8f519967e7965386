//! Transfer executor: drives uploads and deletes to completion
//!
//! All operations implied by a [`ReconciliationResult`] are turned into a
//! stream that is polled with a fixed number of slots. The summary is owned
//! by the single loop folding that stream, so it only becomes final once
//! every dispatched operation has produced its outcomes.

use crate::error::Error;
use crate::reconcile::ReconciliationResult;
use crate::scanner::LocalEntry;
use crate::store::{ObjectStore, DEFAULT_MAX_DELETE_BATCH};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Default number of transfers in flight
pub const DEFAULT_CONCURRENCY: usize = 6;

/// Kind of remote operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferKind {
    Upload,
    Delete,
}

impl TransferKind {
    pub fn as_str(&self) -> &str {
        match self {
            TransferKind::Upload => "upload",
            TransferKind::Delete => "delete",
        }
    }
}

impl std::fmt::Display for TransferKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferStatus {
    Success,
    Failure,
}

/// Result of transferring a single key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferOutcome {
    pub key: String,
    pub kind: TransferKind,
    pub status: TransferStatus,
    pub error: Option<String>,
}

impl TransferOutcome {
    pub fn success(key: impl Into<String>, kind: TransferKind) -> Self {
        Self {
            key: key.into(),
            kind,
            status: TransferStatus::Success,
            error: None,
        }
    }

    pub fn failure(key: impl Into<String>, kind: TransferKind, error: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind,
            status: TransferStatus::Failure,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == TransferStatus::Success
    }
}

/// A failed transfer kept in the summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferFailure {
    pub key: String,
    pub kind: TransferKind,
    pub error: String,
}

/// Aggregated outcome of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Number of keys dispatched
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub uploaded: usize,
    pub deleted: usize,
    pub failures: Vec<TransferFailure>,
}

impl RunSummary {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// Account for one finished transfer
    pub fn record(&mut self, outcome: TransferOutcome) {
        match (outcome.status, outcome.kind) {
            (TransferStatus::Success, kind) => {
                self.succeeded += 1;
                match kind {
                    TransferKind::Upload => self.uploaded += 1,
                    TransferKind::Delete => self.deleted += 1,
                }
            }
            (TransferStatus::Failure, kind) => {
                self.failed += 1;
                self.failures.push(TransferFailure {
                    key: outcome.key,
                    kind,
                    error: outcome.error.unwrap_or_else(|| "unknown error".to_string()),
                });
            }
        }
    }

    /// Every dispatched transfer has reported
    pub fn is_settled(&self) -> bool {
        self.succeeded + self.failed == self.total
    }

    /// No transfer failed
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{} succeeded", self.succeeded, self.total)?;
        if self.failed > 0 {
            write!(f, ", {} failed", self.failed)?;
        }
        Ok(())
    }
}

/// Executor settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOptions {
    /// Maximum operations in flight (uploads and delete batches combined)
    pub concurrency: usize,
    /// Keys per delete request, capped by the store's own limit
    pub delete_batch_size: usize,
    /// Remove remote objects that have no local counterpart
    pub delete_extras: bool,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            delete_batch_size: DEFAULT_MAX_DELETE_BATCH,
            delete_extras: false,
        }
    }
}

enum Operation<'a> {
    Upload(&'a LocalEntry),
    Delete(&'a [String]),
}

/// Runs the transfers of a reconciliation against an [`ObjectStore`]
#[derive(Debug, Clone, Default)]
pub struct TransferExecutor {
    options: TransferOptions,
}

impl TransferExecutor {
    pub fn new(options: TransferOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &TransferOptions {
        &self.options
    }

    /// Number of keys `plan` dispatches under these options
    pub fn dispatched(&self, plan: &ReconciliationResult) -> usize {
        let deletes = if self.options.delete_extras {
            plan.to_delete.len()
        } else {
            0
        };
        plan.to_upload.len() + deletes
    }

    /// Execute every transfer in `plan` and wait for all of them.
    pub async fn execute<S>(&self, store: &S, plan: &ReconciliationResult) -> RunSummary
    where
        S: ObjectStore + ?Sized,
    {
        self.execute_with(store, plan, |_| {}).await
    }

    /// Like [`execute`](Self::execute), calling `on_outcome` as each key
    /// settles.
    pub async fn execute_with<S, F>(
        &self,
        store: &S,
        plan: &ReconciliationResult,
        mut on_outcome: F,
    ) -> RunSummary
    where
        S: ObjectStore + ?Sized,
        F: FnMut(&TransferOutcome),
    {
        let concurrency = self.options.concurrency.max(1);
        let batch_size = self
            .options
            .delete_batch_size
            .clamp(1, store.max_delete_batch().max(1));

        let mut operations: Vec<Operation<'_>> = plan
            .to_upload
            .iter()
            .map(|upload| Operation::Upload(&upload.entry))
            .collect();
        if self.options.delete_extras {
            operations.extend(plan.to_delete.chunks(batch_size).map(Operation::Delete));
        } else if !plan.to_delete.is_empty() {
            info!(kept = plan.to_delete.len(), "Keeping remote-only objects");
        }

        let mut summary = RunSummary::new(self.dispatched(plan));
        info!(
            total = summary.total,
            operations = operations.len(),
            concurrency,
            "Starting transfers"
        );

        let mut settled = stream::iter(operations)
            .map(|operation| perform(store, operation))
            .buffer_unordered(concurrency);

        while let Some(outcomes) = settled.next().await {
            for outcome in outcomes {
                match &outcome.error {
                    None => debug!(key = %outcome.key, kind = %outcome.kind, "Transfer done"),
                    Some(error) => {
                        warn!(key = %outcome.key, kind = %outcome.kind, error = %error, "Transfer failed")
                    }
                }
                on_outcome(&outcome);
                summary.record(outcome);
            }
        }

        debug_assert!(summary.is_settled());
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            total = summary.total,
            "Transfers settled"
        );
        summary
    }
}

async fn perform<S>(store: &S, operation: Operation<'_>) -> Vec<TransferOutcome>
where
    S: ObjectStore + ?Sized,
{
    match operation {
        Operation::Upload(entry) => {
            let outcome = match store.put(entry).await {
                Ok(()) => TransferOutcome::success(&entry.key, TransferKind::Upload),
                Err(e) => TransferOutcome::failure(&entry.key, TransferKind::Upload, e.to_string()),
            };
            vec![outcome]
        }
        Operation::Delete(keys) => match store.delete_batch(keys).await {
            Ok(()) => keys
                .iter()
                .map(|key| TransferOutcome::success(key, TransferKind::Delete))
                .collect(),
            Err(Error::PartialDelete(failures)) => {
                let mut failed: HashMap<String, String> = failures.into_iter().collect();
                keys.iter()
                    .map(|key| match failed.remove(key) {
                        Some(error) => TransferOutcome::failure(key, TransferKind::Delete, error),
                        None => TransferOutcome::success(key, TransferKind::Delete),
                    })
                    .collect()
            }
            Err(e) => {
                let error = e.to_string();
                keys.iter()
                    .map(|key| TransferOutcome::failure(key, TransferKind::Delete, error.clone()))
                    .collect()
            }
        },
    }
}
