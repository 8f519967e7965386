//! Error types for sitepush-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for sitepush-core
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for sitepush-core
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// One or more required options were not provided anywhere
    #[error("Configuration error: missing required option(s): {}", .0.join(", "))]
    MissingOptions(Vec<&'static str>),

    /// Configuration file not found
    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    /// Invalid configuration format
    #[error("Invalid configuration format: {0}")]
    InvalidConfig(String),

    /// The publish directory could not be enumerated
    #[error("Cannot scan {}: {message}", .path.display())]
    Scan { path: PathBuf, message: String },

    /// The remote listing could not be fetched
    #[error("Remote listing failed{}: {message}", http_status(.status))]
    RemoteList { status: Option<u16>, message: String },

    /// A local file could not be hashed
    #[error("Cannot hash {}: {source}", .path.display())]
    Hash {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A single upload or delete failed
    #[error("Transfer failed: {0}")]
    Transfer(String),

    /// A batch delete succeeded for some keys and failed for others
    #[error("Batch delete failed for {} key(s)", .0.len())]
    PartialDelete(Vec<(String, String)>),

    /// Object storage errors
    #[error("Storage operation failed: {0}")]
    Storage(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the error aborts a whole run (as opposed to a single item).
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Error::Hash { .. } | Error::Transfer(_) | Error::PartialDelete(_)
        )
    }

    /// Whether the error is caused by incomplete or invalid configuration.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Error::Config(_)
                | Error::MissingOptions(_)
                | Error::ConfigNotFound(_)
                | Error::InvalidConfig(_)
        )
    }
}

fn http_status(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

// Request builders with missing required fields
impl From<aws_sdk_s3::error::BuildError> for Error {
    fn from(err: aws_sdk_s3::error::BuildError) -> Self {
        Error::Storage(err.to_string())
    }
}
