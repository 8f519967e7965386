//! Configuration management for sitepush
//!
//! Options are resolved from three layers, the first one providing a value
//! winning: explicit overrides (command-line flags), a TOML config file, and
//! environment variables.

use crate::error::{Error, Result};
use crate::executor::{TransferOptions, DEFAULT_CONCURRENCY};
use crate::store::DEFAULT_MAX_DELETE_BATCH;
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration directory name
const CONFIG_DIR: &str = "sitepush";

/// Configuration file name inside the configuration directory
const CONFIG_FILE: &str = "config.toml";

/// Project-local configuration file name
pub const LOCAL_CONFIG_FILE: &str = "sitepush.toml";

/// Environment variables consulted when an option is not set elsewhere
pub const ENV_SECRET_ID: &str = "SITEPUSH_SECRET_ID";
pub const ENV_SECRET_KEY: &str = "SITEPUSH_SECRET_KEY";
pub const ENV_BUCKET: &str = "SITEPUSH_BUCKET";
pub const ENV_REGION: &str = "SITEPUSH_REGION";
pub const ENV_APP_ID: &str = "SITEPUSH_APP_ID";
pub const ENV_ENDPOINT: &str = "SITEPUSH_ENDPOINT";

/// Legacy COS variable names, consulted after their `SITEPUSH_*` counterparts
pub const ENV_COS_SECRET_ID: &str = "COS_SECRET_ID";
pub const ENV_COS_SECRET_KEY: &str = "COS_SECRET_KEY";
pub const ENV_COS_BUCKET: &str = "COS_BUCKET";
pub const ENV_COS_REGION: &str = "COS_REGION";

/// Config file contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub deploy: DeploySection,
    pub logging: Option<LoggingConfig>,
}

/// `[storage]` section; every field may be left to another layer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Account id appended to the bucket name by providers such as COS
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    /// Custom S3-compatible endpoint URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_style: Option<bool>,
}

/// `[deploy]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeploySection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_extras: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_batch_size: Option<usize>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Values given explicitly by the caller; they take precedence over the
/// config file and the environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub storage: StorageSection,
    pub deploy: DeploySection,
}

/// Fully resolved storage settings
#[derive(Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub credential_id: String,
    pub credential_secret: String,
    pub bucket: String,
    pub region: String,
    pub app_id: Option<String>,
    pub endpoint: Option<String>,
    pub path_style: bool,
}

impl StorageConfig {
    /// Bucket name as addressed on the wire: `<bucket>-<app_id>` when an
    /// app id is configured and not already part of the name.
    pub fn bucket_name(&self) -> String {
        match &self.app_id {
            Some(app_id) if !self.bucket.ends_with(&format!("-{app_id}")) => {
                format!("{}-{}", self.bucket, app_id)
            }
            _ => self.bucket.clone(),
        }
    }
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("credential_id", &self.credential_id)
            .field("credential_secret", &"<redacted>")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("app_id", &self.app_id)
            .field("endpoint", &self.endpoint)
            .field("path_style", &self.path_style)
            .finish()
    }
}

/// Everything one deploy run needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployConfig {
    pub storage: StorageConfig,
    pub public_dir: PathBuf,
    pub transfer: TransferOptions,
}

// Default values
fn default_log_level() -> String {
    "info".to_string()
}

fn default_public_dir() -> PathBuf {
    PathBuf::from("public")
}

/// Get the user configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    let home = home_dir().ok_or_else(|| Error::Config("Cannot determine home directory".to_string()))?;
    Ok(home.join(".config").join(CONFIG_DIR))
}

/// Get the user configuration file path
pub fn get_config_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join(CONFIG_FILE))
}

/// Locate the config file to use.
///
/// An explicit path must exist. Otherwise `./sitepush.toml` is preferred over
/// `~/.config/sitepush/config.toml`; having neither is not an error.
pub fn find_config_file(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(Error::ConfigNotFound(path.to_path_buf()));
        }
        return Ok(Some(path.to_path_buf()));
    }

    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.exists() {
        return Ok(Some(local));
    }

    match get_config_path() {
        Ok(path) if path.exists() => Ok(Some(path)),
        _ => Ok(None),
    }
}

/// Load a configuration file
pub fn load_config(path: &Path) -> Result<ConfigFile> {
    if !path.exists() {
        return Err(Error::ConfigNotFound(path.to_path_buf()));
    }

    let content = fs::read_to_string(path).map_err(|e| {
        Error::InvalidConfig(format!("Failed to read config file {}: {}", path.display(), e))
    })?;

    parse_config(&content)
}

/// Parse configuration file contents
pub fn parse_config(content: &str) -> Result<ConfigFile> {
    toml::from_str(content)
        .map_err(|e| Error::InvalidConfig(format!("Failed to parse config file: {}", e)))
}

/// Read an option from the process environment
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Merge the three layers into a validated [`DeployConfig`].
///
/// Every missing required option is reported at once. Nothing here touches
/// the network.
pub fn resolve_config<E>(overrides: ConfigOverrides, file: Option<ConfigFile>, env: E) -> Result<DeployConfig>
where
    E: Fn(&str) -> Option<String>,
{
    let file = file.unwrap_or_default();
    let storage = overrides.storage;
    let deploy = overrides.deploy;

    let pick = |explicit: Option<String>, from_file: Option<String>, vars: &[&str]| {
        [explicit, from_file]
            .into_iter()
            .flatten()
            .chain(vars.iter().filter_map(|var| env(*var)))
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty())
    };

    let credential_id = pick(
        storage.credential_id,
        file.storage.credential_id,
        &[ENV_SECRET_ID, ENV_COS_SECRET_ID],
    );
    let credential_secret = pick(
        storage.credential_secret,
        file.storage.credential_secret,
        &[ENV_SECRET_KEY, ENV_COS_SECRET_KEY],
    );
    let bucket = pick(storage.bucket, file.storage.bucket, &[ENV_BUCKET, ENV_COS_BUCKET]);
    let region = pick(storage.region, file.storage.region, &[ENV_REGION, ENV_COS_REGION]);
    let app_id = pick(storage.app_id, file.storage.app_id, &[ENV_APP_ID]);
    let endpoint = pick(storage.endpoint, file.storage.endpoint, &[ENV_ENDPOINT]);

    let mut missing = Vec::new();
    if credential_id.is_none() {
        missing.push("credential_id");
    }
    if credential_secret.is_none() {
        missing.push("credential_secret");
    }
    if bucket.is_none() {
        missing.push("bucket");
    }
    if region.is_none() {
        missing.push("region");
    }

    let (Some(credential_id), Some(credential_secret), Some(bucket), Some(region)) =
        (credential_id, credential_secret, bucket, region)
    else {
        return Err(Error::MissingOptions(missing));
    };

    let config = DeployConfig {
        storage: StorageConfig {
            credential_id,
            credential_secret,
            bucket,
            region,
            app_id,
            endpoint,
            path_style: storage.path_style.or(file.storage.path_style).unwrap_or(false),
        },
        public_dir: deploy
            .public_dir
            .or(file.deploy.public_dir)
            .unwrap_or_else(default_public_dir),
        transfer: TransferOptions {
            concurrency: deploy
                .concurrency
                .or(file.deploy.concurrency)
                .unwrap_or(DEFAULT_CONCURRENCY),
            delete_batch_size: deploy
                .delete_batch_size
                .or(file.deploy.delete_batch_size)
                .unwrap_or(DEFAULT_MAX_DELETE_BATCH),
            delete_extras: deploy
                .delete_extras
                .or(file.deploy.delete_extras)
                .unwrap_or(false),
        },
    };

    validate_config(&config)?;
    Ok(config)
}

/// Validate configuration
pub fn validate_config(config: &DeployConfig) -> Result<()> {
    let mut missing = Vec::new();
    if config.storage.credential_id.is_empty() {
        missing.push("credential_id");
    }
    if config.storage.credential_secret.is_empty() {
        missing.push("credential_secret");
    }
    if config.storage.bucket.is_empty() {
        missing.push("bucket");
    }
    if config.storage.region.is_empty() {
        missing.push("region");
    }
    if !missing.is_empty() {
        return Err(Error::MissingOptions(missing));
    }

    if let Some(endpoint) = &config.storage.endpoint {
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(Error::InvalidConfig(format!(
                "Endpoint must be an http(s) URL, got '{}'",
                endpoint
            )));
        }
    }

    if config.transfer.concurrency == 0 {
        return Err(Error::InvalidConfig("concurrency must be at least 1".to_string()));
    }

    if config.transfer.delete_batch_size == 0 {
        return Err(Error::InvalidConfig(
            "delete_batch_size must be at least 1".to_string(),
        ));
    }

    Ok(())
}
