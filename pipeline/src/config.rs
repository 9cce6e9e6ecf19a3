//! Pipeline configuration.
//!
//! Everything is an explicit value built once at start-up and passed down.
//! Remote credentials come from the environment (optionally a `.env` file)
//! and are never written anywhere by the pipeline.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;
use crate::parser::ReadOptions;

/// Default folder scanned for the source CSV.
pub const DEFAULT_SOURCE_FOLDER: &str = "data";

/// Default folder receiving the five output CSV files.
pub const DEFAULT_OUTPUT_FOLDER: &str = "transformed_data";

/// Default folder for run log files.
pub const DEFAULT_LOG_FOLDER: &str = "logs";

pub const ENV_URL: &str = "SUPABASE_URL";
pub const ENV_KEY: &str = "SUPABASE_KEY";
pub const ENV_TIMEOUT: &str = "SUPABASE_TIMEOUT_SECS";

/// Local paths and source options of a run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub source_folder: PathBuf,
    /// Read this file instead of the newest CSV in `source_folder`.
    pub source_file: Option<String>,
    /// Source encoding label; auto-detected if not set.
    pub encoding: Option<String>,
    pub output_folder: PathBuf,
    /// Where run logs go; `None` logs to the console only.
    pub log_folder: Option<PathBuf>,
}

impl PipelineConfig {
    pub fn read_options(&self) -> ReadOptions {
        ReadOptions {
            file_name: self.source_file.clone(),
            encoding: self.encoding.clone(),
            delimiter: None,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_folder: PathBuf::from(DEFAULT_SOURCE_FOLDER),
            source_file: None,
            encoding: None,
            output_folder: PathBuf::from(DEFAULT_OUTPUT_FOLDER),
            log_folder: Some(PathBuf::from(DEFAULT_LOG_FOLDER)),
        }
    }
}

/// Endpoint and credentials of the remote store.
#[derive(Clone)]
pub struct RemoteConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub url: String,
    pub api_key: String,
    /// Per-request timeout; transport default if not set.
    pub timeout: Option<Duration>,
}

impl RemoteConfig {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build from `SUPABASE_URL`, `SUPABASE_KEY` and optional
    /// `SUPABASE_TIMEOUT_SECS`, loading `.env` first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::MissingVar(name))
        };

        let url = required(ENV_URL)?;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::InvalidVar {
                name: ENV_URL,
                message: format!("'{}' is not an http(s) URL", url),
            });
        }

        let mut config = Self::new(url, required(ENV_KEY)?);
        if let Some(raw) = lookup(ENV_TIMEOUT) {
            let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidVar {
                name: ENV_TIMEOUT,
                message: format!("'{}' is not a number of seconds", raw),
            })?;
            config = config.with_timeout(Duration::from_secs(secs));
        }
        Ok(config)
    }
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("url", &self.url)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}
