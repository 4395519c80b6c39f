use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::constants::{DEFAULT_CONFIG_PATH, DEFAULT_QUERY_TIMEOUT_SECS};
use crate::error::{ReportError, Result};
use crate::pipeline::processing::normalize::default_ordinal_epoch;
use crate::pipeline::processing::row_builder::RowContext;
use crate::pipeline::report_spec::ReportRegistry;

/// Environment variable naming the config file when no path is given.
pub const CONFIG_PATH_ENV: &str = "OPS_REPORTS_CONFIG";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    #[serde(default)]
    pub dates: DatesConfig,
    /// Query text per report name.
    #[serde(default)]
    pub queries: HashMap<String, QueryConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Sqlite,
    Libsql,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub kind: SourceKind,
    /// Database file for the sqlite source.
    pub path: Option<PathBuf>,
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatesConfig {
    /// Date that integer ordinal 1 stands for, as a quoted `YYYY-MM-DD`.
    #[serde(default = "default_ordinal_epoch")]
    pub ordinal_epoch: NaiveDate,
}

impl Default for DatesConfig {
    fn default() -> Self {
        Self {
            ordinal_epoch: default_ordinal_epoch(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QueryConfig {
    /// Parent rows; may use `:offset` and `:limit`.
    pub rows: String,
    /// Child rows for pivoted reports.
    pub children: Option<String>,
    /// Single-value total row count.
    pub count: Option<String>,
}

fn default_query_timeout_secs() -> u64 {
    DEFAULT_QUERY_TIMEOUT_SECS
}

impl Config {
    /// Pick the config path: explicit argument, then `OPS_REPORTS_CONFIG`,
    /// then `config.toml` in the working directory.
    pub fn resolve_path(explicit: Option<PathBuf>) -> PathBuf {
        explicit
            .or_else(|| std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(path).map_err(|e| {
            ReportError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&config_content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Check the config against the reports it will serve.
    pub fn validate(&self, registry: &ReportRegistry) -> Result<()> {
        match self.source.kind {
            SourceKind::Sqlite if self.source.path.is_none() => {
                return Err(ReportError::Config(
                    "source.path is required for the sqlite source".to_string(),
                ));
            }
            SourceKind::Libsql if !cfg!(feature = "db") => {
                return Err(ReportError::Config(
                    "the libsql source requires building with the `db` feature".to_string(),
                ));
            }
            _ => {}
        }

        if self.source.query_timeout_secs == 0 {
            return Err(ReportError::Config(
                "source.query_timeout_secs must be positive".to_string(),
            ));
        }

        for (report, query) in &self.queries {
            let spec = registry.get(report).ok_or_else(|| {
                ReportError::Config(format!("queries.{report} does not name a known report"))
            })?;
            if spec.pivot.is_some() && query.children.is_none() {
                return Err(ReportError::Config(format!(
                    "queries.{report}.children is required for a pivoted report"
                )));
            }
        }
        Ok(())
    }

    pub fn query(&self, report: &str) -> Option<&QueryConfig> {
        self.queries.get(report)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.source.query_timeout_secs)
    }

    pub fn row_context(&self) -> RowContext {
        RowContext {
            ordinal_epoch: self.dates.ordinal_epoch,
        }
    }
}
