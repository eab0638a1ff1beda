// src/config.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use url::Url;

use crate::aggregate::{PaidSpendBasis, RatioMetric};
use crate::analyst::{DEFAULT_ANALYST_BASE, DEFAULT_ANALYST_MODEL};
use crate::error::ConfigError;
use crate::fetch::sheets::{RetryPolicy, DEFAULT_SHEETS_BASE, MAX_RETRIES};
use crate::fetch::{CsvFileSource, DataSource, SheetSource};

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    pub source: SourceConfig,
    /// Seconds a loaded dataset stays valid. `null` keeps it for the session.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: Option<u64>,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub views: ViewConfig,
    #[serde(default)]
    pub paid_spend_basis: PaidSpendBasis,
    #[serde(default)]
    pub analyst: AnalystConfig,
}

fn default_cache_ttl_secs() -> Option<u64> {
    Some(600)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    Sheets {
        spreadsheet_id: String,
        sheets: Vec<String>,
        #[serde(default)]
        base_url: Option<String>,
    },
    Csv {
        files: Vec<CsvFileConfig>,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct CsvFileConfig {
    pub tag: String,
    pub path: PathBuf,
}

/// Optional dashboard sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ViewConfig {
    /// Paid-only efficiency block (organic channels excluded).
    #[serde(default = "enabled")]
    pub paid_efficiency: bool,
    /// One monthly series per cost ratio instead of CPL only.
    #[serde(default = "enabled")]
    pub monthly_metric_charts: bool,
    /// Whether the include-organic toggle is offered. When off, organic
    /// rows are always included.
    #[serde(default = "enabled")]
    pub organic_toggle: bool,
}

fn enabled() -> bool {
    true
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            paid_efficiency: true,
            monthly_metric_charts: true,
            organic_toggle: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalystConfig {
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable holding the API key. Keys never live in the file.
    #[serde(default = "default_key_env")]
    pub api_key_env: String,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Ratio columns sent along with channel and spend.
    #[serde(default = "default_ratios")]
    pub ratios: Vec<RatioMetric>,
}

fn default_model() -> String {
    DEFAULT_ANALYST_MODEL.to_string()
}

fn default_key_env() -> String {
    "GOOGLE_API_KEY".to_string()
}

fn default_ratios() -> Vec<RatioMetric> {
    vec![RatioMetric::CostPerLead]
}

impl Default for AnalystConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: default_model(),
            api_key_env: default_key_env(),
            base_url: None,
            ratios: default_ratios(),
        }
    }
}

impl AnalystConfig {
    pub fn base_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(self.base_url.as_deref().unwrap_or(DEFAULT_ANALYST_BASE))
    }
}

impl DashboardConfig {
    pub fn from_yaml(input: &str) -> Result<Self, ConfigError> {
        let config: DashboardConfig = serde_yaml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl_secs.map(Duration::from_secs)
    }

    /// Sheets base URL, falling back to Google's.
    pub fn sheets_base(&self) -> Result<Url, ConfigError> {
        let raw = match &self.source {
            SourceConfig::Sheets {
                base_url: Some(u), ..
            } => u.as_str(),
            _ => DEFAULT_SHEETS_BASE,
        };
        // join() drops the last segment unless the base ends with '/'
        let raw = if raw.ends_with('/') {
            raw.to_string()
        } else {
            format!("{raw}/")
        };
        Url::parse(&raw).map_err(|e| ConfigError::Validation(format!("source.base_url: {e}")))
    }

    /// Build the configured data source.
    pub fn data_source(&self, client: Client) -> Result<Box<dyn DataSource>, ConfigError> {
        Ok(match &self.source {
            SourceConfig::Sheets {
                spreadsheet_id,
                sheets,
                ..
            } => Box::new(SheetSource::new(
                client,
                self.sheets_base()?,
                spreadsheet_id.clone(),
                sheets.clone(),
                self.retry,
            )),
            SourceConfig::Csv { files } => Box::new(CsvFileSource::new(
                files
                    .iter()
                    .map(|f| (f.tag.clone(), f.path.clone()))
                    .collect(),
            )),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.source {
            SourceConfig::Sheets {
                spreadsheet_id,
                sheets,
                ..
            } => {
                if spreadsheet_id.trim().is_empty() {
                    return Err(ConfigError::Validation(
                        "source.spreadsheet_id must not be empty".into(),
                    ));
                }
                if sheets.is_empty() {
                    return Err(ConfigError::Validation(
                        "source.sheets needs at least one sheet".into(),
                    ));
                }
                self.sheets_base()?;
            }
            SourceConfig::Csv { files } => {
                if files.is_empty() {
                    return Err(ConfigError::Validation(
                        "source.files needs at least one file".into(),
                    ));
                }
            }
        }

        if self.retry.max_retries > MAX_RETRIES {
            return Err(ConfigError::Validation(format!(
                "retry.max_retries must be at most {MAX_RETRIES}, got {}",
                self.retry.max_retries
            )));
        }

        if self.analyst.ratios.is_empty() {
            return Err(ConfigError::Validation(
                "analyst.ratios needs at least one ratio".into(),
            ));
        }
        self.analyst
            .base_url()
            .map_err(|e| ConfigError::Validation(format!("analyst.base_url: {e}")))?;
        Ok(())
    }
}
