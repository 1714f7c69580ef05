use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::domain::Credentials;
use crate::error::FetchError;
use crate::filter::MetadataPolicy;
use crate::store::Store;

pub const DEFAULT_CONFIG_FILE: &str = "ecostress-fetch.json";
pub const DEFAULT_BASE_URL: &str = "https://e4ftl01.cr.usgs.gov/ECOSTRESS/";
pub const DEFAULT_PRODUCT: &str = "ECO2CLD.001";
pub const DEFAULT_DOWNLOAD_WORKERS: usize = 4;
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

pub const USERNAME_ENV: &str = "EARTHDATA_USERNAME";
pub const PASSWORD_ENV: &str = "EARTHDATA_PASSWORD";

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub metadata_dir: Option<String>,
    #[serde(default)]
    pub download_workers: Option<usize>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub metadata_policy: Option<MetadataPolicy>,
    #[serde(default)]
    pub credentials: Option<Credentials>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub base_url: String,
    pub product: String,
    pub metadata_dir: Utf8PathBuf,
    pub download_workers: usize,
    pub timeout: Duration,
    pub metadata_policy: MetadataPolicy,
    pub credentials: Option<Credentials>,
}

impl ResolvedConfig {
    pub fn store(&self) -> Store {
        Store::new_with_paths(self.metadata_dir.clone())
    }
}

/// Shape of the settings echoed by `eco-fetch config`; credentials are left out.
#[derive(Debug, Serialize)]
pub struct ConfigSummary<'a> {
    pub base_url: &'a str,
    pub product: &'a str,
    pub metadata_dir: &'a str,
    pub download_workers: usize,
    pub timeout_secs: u64,
    pub metadata_policy: MetadataPolicy,
    pub has_credentials: bool,
}

impl<'a> From<&'a ResolvedConfig> for ConfigSummary<'a> {
    fn from(config: &'a ResolvedConfig) -> Self {
        Self {
            base_url: &config.base_url,
            product: &config.product,
            metadata_dir: config.metadata_dir.as_str(),
            download_workers: config.download_workers,
            timeout_secs: config.timeout.as_secs(),
            metadata_policy: config.metadata_policy,
            has_credentials: config.credentials.is_some(),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, FetchError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Err(FetchError::MissingConfig);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| FetchError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| FetchError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    /// Like [`ConfigLoader::resolve`], but an absent default file means built-in defaults.
    pub fn resolve_or_default(path: Option<&str>) -> Result<ResolvedConfig, FetchError> {
        match Self::resolve(path) {
            Err(FetchError::MissingConfig) => Self::resolve_config(Config::default()),
            other => other,
        }
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, FetchError> {
        let metadata_dir = match config.metadata_dir {
            Some(dir) => Utf8PathBuf::from(dir),
            None => Store::new()?.metadata_root().to_owned(),
        };

        Ok(ResolvedConfig {
            schema_version: config.schema_version.unwrap_or(1),
            base_url: config
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            product: config.product.unwrap_or_else(|| DEFAULT_PRODUCT.to_string()),
            metadata_dir,
            download_workers: config
                .download_workers
                .unwrap_or(DEFAULT_DOWNLOAD_WORKERS)
                .max(1),
            timeout: Duration::from_secs(config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            metadata_policy: config.metadata_policy.unwrap_or_default(),
            credentials: config.credentials,
        })
    }
}

/// Credentials from `EARTHDATA_USERNAME` / `EARTHDATA_PASSWORD`, if both are set.
pub fn credentials_from_env() -> Option<Credentials> {
    let username = std::env::var(USERNAME_ENV).ok()?;
    let password = std::env::var(PASSWORD_ENV).ok()?;
    if username.trim().is_empty() {
        return None;
    }
    Some(Credentials::new(username.trim(), password))
}
