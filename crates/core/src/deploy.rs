//! Deploy pipeline: scan, list, reconcile, transfer

use crate::client::BucketClient;
use crate::config::{validate_config, DeployConfig};
use crate::error::{Error, Result};
use crate::executor::{RunSummary, TransferExecutor, TransferOutcome};
use crate::reconcile::{reconcile, ReconciliationResult};
use crate::scanner::scan;
use crate::store::ObjectStore;
use serde::Serialize;
use tracing::{error, info};

/// What a deploy run did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployReport {
    pub plan: ReconciliationResult,
    pub summary: RunSummary,
    /// Remote-only objects left in place because deletion was disabled
    pub kept: usize,
}

/// One deploy invocation: a validated configuration and the store it
/// publishes to.
pub struct Deployer<S> {
    config: DeployConfig,
    store: S,
}

impl Deployer<BucketClient> {
    /// Validate `config` and build the S3 client for it.
    ///
    /// Fails before any network activity when the configuration is
    /// incomplete.
    pub fn connect(config: DeployConfig) -> Result<Self> {
        validate_config(&config)?;
        let store = BucketClient::new(&config.storage);
        Ok(Self { config, store })
    }
}

impl<S: ObjectStore> Deployer<S> {
    /// Use an already constructed store
    pub fn with_store(config: DeployConfig, store: S) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &DeployConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Compute what a deploy would transfer, without transferring anything.
    ///
    /// Scan and listing failures are fatal: without both snapshots no key
    /// can be classified safely.
    pub async fn plan(&self) -> Result<ReconciliationResult> {
        let root = self.config.public_dir.clone();
        info!(dir = %root.display(), "Scanning publish directory");
        let local = tokio::task::spawn_blocking(move || scan(&root))
            .await
            .map_err(|e| Error::Other(format!("Scan task failed: {e}")))??;

        info!(files = local.len(), "Listing remote objects");
        let remote = self.store.list().await.inspect_err(|e| {
            error!(error = %e, "Cannot list remote objects, aborting");
        })?;

        info!(objects = remote.len(), "Reconciling");
        Ok(reconcile(local, remote, self.config.transfer.concurrency).await)
    }

    /// Perform the transfers of `plan`, reporting each outcome to
    /// `on_outcome`, and return once every one has settled.
    pub async fn execute<F>(&self, plan: &ReconciliationResult, on_outcome: F) -> RunSummary
    where
        F: FnMut(&TransferOutcome),
    {
        let executor = TransferExecutor::new(self.config.transfer.clone());
        executor.execute_with(&self.store, plan, on_outcome).await
    }

    /// Number of keys `plan` would dispatch with this configuration
    pub fn dispatched(&self, plan: &ReconciliationResult) -> usize {
        TransferExecutor::new(self.config.transfer.clone()).dispatched(plan)
    }

    /// Plan and execute a full deploy.
    pub async fn deploy(&self) -> Result<DeployReport> {
        let plan = self.plan().await?;
        let summary = self.execute(&plan, |_| {}).await;

        info!("Deploy finished: {}", summary);
        for failure in &summary.failures {
            error!(key = %failure.key, kind = %failure.kind, error = %failure.error, "Transfer failed");
        }

        Ok(self.report(plan, summary))
    }

    /// Bundle a plan and its executed summary into a report
    pub fn report(&self, plan: ReconciliationResult, summary: RunSummary) -> DeployReport {
        let kept = if self.config.transfer.delete_extras {
            0
        } else {
            plan.to_delete.len()
        };
        DeployReport {
            plan,
            summary,
            kept,
        }
    }
}

/// Deploy the configured publish directory to its bucket.
pub async fn deploy(config: DeployConfig) -> Result<DeployReport> {
    Deployer::connect(config)?.deploy().await
}
