//! sitepush-core - Core library for the sitepush static-site publisher
//!
//! This library reconciles a local directory of generated site files with an
//! S3-compatible bucket: it scans the directory, lists the bucket, compares
//! content digests, then uploads new and changed files and optionally removes
//! objects that no longer exist locally.

pub mod client;
pub mod config;
pub mod deploy;
pub mod error;
pub mod executor;
pub mod hash;
pub mod path;
pub mod reconcile;
pub mod scanner;
pub mod store;

// Re-export commonly used types
pub use client::BucketClient;
pub use config::{
    find_config_file, load_config, parse_config, process_env, resolve_config, validate_config,
};
pub use config::{
    ConfigFile, ConfigOverrides, DeployConfig, DeploySection, LoggingConfig, StorageConfig,
    StorageSection,
};
pub use deploy::{deploy, DeployReport, Deployer};
pub use error::{Error, Result};
pub use executor::{
    RunSummary, TransferExecutor, TransferFailure, TransferKind, TransferOptions,
    TransferOutcome, TransferStatus,
};
pub use reconcile::{classify, reconcile, HashWarning, PendingUpload, ReconciliationResult, UploadReason};
pub use scanner::{scan, scan_iter, LocalEntry};
pub use store::{ObjectStore, RemoteEntry};
