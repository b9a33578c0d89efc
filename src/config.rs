//! Process configuration, built once in `main` and passed by reference.

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

pub const DEFAULT_SIZE_METRIC: &str = "NY.GDP.MKTP.CD";
pub const DEFAULT_WORLDBANK_URL: &str = "https://api.worldbank.org/v2";
pub const DEFAULT_LOG_FILE: &str = "logs/reporting_coverage.log";

/// Where data lives and which size metric ranks entities.
///
/// Read from the environment (after `.env` is loaded):
///
/// | Variable                 | Required | Default                          |
/// |--------------------------|----------|----------------------------------|
/// | `COVERAGE_DATA_ROOT`     | yes      |                                  |
/// | `COVERAGE_SIZE_METRIC`   | no       | `NY.GDP.MKTP.CD`                 |
/// | `COVERAGE_IGNORE_LIST`   | no       | embedded list                    |
/// | `COVERAGE_CROSSWALK`     | no       | none                             |
/// | `COVERAGE_WORLDBANK_URL` | no       | `https://api.worldbank.org/v2`   |
/// | `LOG_FILE_PATH`          | no       | `logs/reporting_coverage.log`    |
#[derive(Debug, Clone)]
pub struct Config {
    pub data_root: PathBuf,
    pub size_metric: String,
    pub ignore_list_path: Option<PathBuf>,
    pub crosswalk_path: Option<PathBuf>,
    pub worldbank_url: String,
    pub log_file_path: PathBuf,
}

impl Config {
    /// A configuration rooted at `data_root` with every other setting defaulted.
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            size_metric: DEFAULT_SIZE_METRIC.to_string(),
            ignore_list_path: None,
            crosswalk_path: None,
            worldbank_url: DEFAULT_WORLDBANK_URL.to_string(),
            log_file_path: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; `from_env` passes `std::env::var`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let data_root = get("COVERAGE_DATA_ROOT")
            .map(PathBuf::from)
            .ok_or_else(|| ConfigError::MissingEnvVar("COVERAGE_DATA_ROOT".to_string()))?;

        if !data_root.is_dir() {
            return Err(ConfigError::InvalidEnvValue {
                var: "COVERAGE_DATA_ROOT".to_string(),
                reason: format!("data path does not exist: {}", data_root.display()),
            });
        }

        let mut config = Self::new(data_root);
        if let Some(metric) = get("COVERAGE_SIZE_METRIC") {
            config.size_metric = metric;
        }
        config.ignore_list_path = get("COVERAGE_IGNORE_LIST").map(PathBuf::from);
        config.crosswalk_path = get("COVERAGE_CROSSWALK").map(PathBuf::from);
        if let Some(url) = get("COVERAGE_WORLDBANK_URL") {
            config.worldbank_url = url.trim_end_matches('/').to_string();
        }
        if let Some(path) = get("LOG_FILE_PATH") {
            config.log_file_path = PathBuf::from(path);
        }
        Ok(config)
    }

    /// Directory holding size-metric tables.
    pub fn size_dir(&self) -> PathBuf {
        self.data_root.join("wb_wdi")
    }

    pub fn size_table_path(&self, metric: &str) -> PathBuf {
        self.size_dir().join(format!("{metric}.csv"))
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }
}
