use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::DEFAULT_TTL;
use crate::domain::VersionRequest;
use crate::error::ImfError;
use crate::version::normalize_value;

pub const DEFAULT_CONFIG_FILE: &str = "imf-reader.json";
pub const SUPPORTED_SCHEMA_VERSION: u32 = 1;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub cache_dir: Option<String>,
    #[serde(default)]
    pub cache_ttl_days: Option<u64>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub weo_version: Option<VersionEntry>,
}

/// `"latest"`, `"April 2024"`, or `["April", 2024]`.
#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum VersionEntry {
    Shorthand(String),
    Pair(Vec<Value>),
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub cache_dir: Option<Utf8PathBuf>,
    pub cache_ttl: Duration,
    pub timeout: Duration,
    pub weo_version: VersionRequest,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            schema_version: SUPPORTED_SCHEMA_VERSION,
            cache_dir: None,
            cache_ttl: DEFAULT_TTL,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            weo_version: VersionRequest::Latest,
        }
    }
}

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads `path`, or `imf-reader.json` when present. Without either the
    /// defaults apply.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, ImfError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(ResolvedConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| ImfError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| ImfError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, ImfError> {
        let schema_version = config.schema_version.unwrap_or(SUPPORTED_SCHEMA_VERSION);
        if schema_version != SUPPORTED_SCHEMA_VERSION {
            return Err(ImfError::ConfigParse(format!(
                "unsupported schema_version {schema_version}, expected {SUPPORTED_SCHEMA_VERSION}"
            )));
        }
        let weo_version = match config.weo_version {
            None => VersionRequest::Latest,
            Some(VersionEntry::Shorthand(value)) => value.parse()?,
            Some(VersionEntry::Pair(items)) => {
                VersionRequest::Specific(normalize_value(&Value::Array(items))?)
            }
        };

        Ok(ResolvedConfig {
            schema_version,
            cache_dir: config.cache_dir.map(Utf8PathBuf::from),
            cache_ttl: match config.cache_ttl_days {
                Some(count) => days(count)?,
                None => DEFAULT_TTL,
            },
            timeout: Duration::from_secs(config.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            weo_version,
        })
    }
}

fn days(count: u64) -> Result<Duration, ImfError> {
    count
        .checked_mul(SECONDS_PER_DAY)
        .map(Duration::from_secs)
        .ok_or_else(|| ImfError::ConfigParse(format!("cache_ttl_days {count} is out of range")))
}
