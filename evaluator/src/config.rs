use std::path::Path;
use std::time::Duration;

use racing_client::DEFAULT_REGION;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;
use crate::poll::PollPolicy;

/// Configuration of the evaluator, read from an optional TOML file.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EvaluatorConfig {
    #[serde(default)]
    pub racing: RacingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub leaderboard: LeaderboardConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

impl EvaluatorConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` if given, otherwise returns the defaults.
    pub fn load_optional(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.racing.region.is_empty() {
            return Err(ConfigError::Invalid("`racing.region` must not be empty".to_string()));
        }
        if self.leaderboard.page_size == 0 {
            return Err(ConfigError::Invalid(
                "`leaderboard.page_size` must be greater than zero".to_string(),
            ));
        }
        if self.leaderboard.max_pages == 0 {
            return Err(ConfigError::Invalid(
                "`leaderboard.max_pages` must be greater than zero".to_string(),
            ));
        }
        if self.export.poll_interval_s == 0 {
            return Err(ConfigError::Invalid(
                "`export.poll_interval_s` must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RacingConfig {
    /// Region of the racing service. Also used to build track ARNs.
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub endpoint: Option<Url>,
    #[serde(default = "default_timeout_s")]
    pub timeout_s: u64,
}

impl Default for RacingConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            endpoint: None,
            timeout_s: default_timeout_s(),
        }
    }
}

impl RacingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_s)
    }
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_timeout_s() -> u64 {
    30
}

/// Overrides for the S3 stores. Unset fields fall back to the `AWS_*` environment.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub allow_http: Option<bool>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LeaderboardConfig {
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_pages: default_max_pages(),
        }
    }
}

fn default_page_size() -> u32 {
    50
}

fn default_max_pages() -> usize {
    100
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ExportConfig {
    #[serde(default = "default_poll_interval_s")]
    pub poll_interval_s: u64,
    #[serde(default = "default_max_wait_s")]
    pub max_wait_s: u64,
    #[serde(default = "default_wanted_status")]
    pub wanted_status: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            poll_interval_s: default_poll_interval_s(),
            max_wait_s: default_max_wait_s(),
            wanted_status: default_wanted_status(),
        }
    }
}

impl ExportConfig {
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_secs(self.poll_interval_s),
            max_wait: Duration::from_secs(self.max_wait_s),
        }
    }
}

fn default_poll_interval_s() -> u64 {
    10
}

fn default_max_wait_s() -> u64 {
    300
}

fn default_wanted_status() -> String {
    "READY".to_string()
}
