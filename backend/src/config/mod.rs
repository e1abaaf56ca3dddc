//! Dataset manifest
//!
//! Declares which CSV files make up the dashboard, how each one is read and
//! which reducer combines its entities. Loaded from JSON, with environment
//! overrides (the binary fills them from `.env` through `dotenvy`).
//!
//! ```json
//! {
//!   "dataDir": "data",
//!   "baselineYear": 2012,
//!   "metrics": [
//!     { "name": "jobs", "label": "Jobs", "file": "JobGrowth2012_2024.csv",
//!       "reducer": "sum", "scale": 1000 }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, ConfigResult};
use crate::models::Reducer;
use crate::parser::ColumnMapping;

/// Path of the manifest to load
pub const CONFIG_PATH_ENV: &str = "STATEDASH_CONFIG";

/// Overrides `dataDir` of whatever manifest is in use
pub const DATA_DIR_ENV: &str = "STATEDASH_DATA_DIR";

/// One metric and the file that holds it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSource {
    /// Key used by the API and the transforms
    pub name: String,
    /// Human-readable label
    pub label: String,
    /// CSV file, relative to the data directory unless absolute
    pub file: PathBuf,
    pub reducer: Reducer,
    /// Multiplier applied after normalization
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub columns: ColumnMapping,
    /// Forced delimiter; detected when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<char>,
}

fn default_scale() -> f64 {
    1.0
}

impl MetricSource {
    pub fn new(name: impl Into<String>, label: impl Into<String>, file: impl Into<PathBuf>, reducer: Reducer) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            file: file.into(),
            reducer,
            scale: default_scale(),
            columns: ColumnMapping::default(),
            delimiter: None,
        }
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Resolve `file` against `data_dir`.
    pub fn path_in(&self, data_dir: &Path) -> PathBuf {
        if self.file.is_absolute() {
            self.file.clone()
        } else {
            data_dir.join(&self.file)
        }
    }
}

/// The whole manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    pub metrics: Vec<MetricSource>,
    #[serde(default = "default_baseline_year")]
    pub baseline_year: i32,
    #[serde(default = "default_comparison_year")]
    pub comparison_year: i32,
    /// Pseudo-entities left out of map color scales
    #[serde(default = "default_excluded_entities")]
    pub excluded_entities: Vec<String>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_baseline_year() -> i32 {
    2012
}

fn default_comparison_year() -> i32 {
    2024
}

fn default_excluded_entities() -> Vec<String> {
    vec!["United States".to_string()]
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            metrics: vec![
                MetricSource::new("population", "Population", "PopulationDataClean.csv", Reducer::Sum),
                MetricSource::new("median_income", "Median Income", "MedianIncomeDataClean.csv", Reducer::Mean),
                MetricSource::new("housing_prices", "Housing Prices", "HousingYearlyDataClean.csv", Reducer::Mean),
                // source file counts thousands of jobs
                MetricSource::new("jobs", "Jobs", "JobGrowth2012_2024.csv", Reducer::Sum).with_scale(1000.0),
            ],
            baseline_year: default_baseline_year(),
            comparison_year: default_comparison_year(),
            excluded_entities: default_excluded_entities(),
        }
    }
}

impl DashboardConfig {
    /// Parse and validate a JSON manifest.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load a manifest file. A relative `dataDir` is resolved against the
    /// manifest's own directory.
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let mut config = Self::from_json(&content)?;
        if config.data_dir.is_relative() {
            if let Some(parent) = path.parent() {
                config.data_dir = parent.join(&config.data_dir);
            }
        }
        Ok(config)
    }

    /// Build the effective configuration from the environment.
    ///
    /// Reads the manifest named by `STATEDASH_CONFIG` (built-in defaults
    /// otherwise) and applies `STATEDASH_DATA_DIR`. Does not load `.env`;
    /// the binary does that once at startup.
    pub fn from_env() -> ConfigResult<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(path.trim())?,
            _ => Self::default(),
        };
        if let Ok(dir) = std::env::var(DATA_DIR_ENV) {
            if !dir.trim().is_empty() {
                config.data_dir = PathBuf::from(dir.trim());
            }
        }
        Ok(config)
    }

    /// Check invariants serde cannot express.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.metrics.is_empty() {
            return Err(ConfigError::NoMetrics);
        }

        let mut seen = HashSet::new();
        for metric in &self.metrics {
            if metric.name.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "metrics.name".into(),
                    message: "must not be empty".into(),
                });
            }
            if !seen.insert(metric.name.as_str()) {
                return Err(ConfigError::DuplicateMetric(metric.name.clone()));
            }
            if !metric.scale.is_finite() || metric.scale == 0.0 {
                return Err(ConfigError::InvalidValue {
                    field: format!("metrics.{}.scale", metric.name),
                    message: format!("{} is not a usable multiplier", metric.scale),
                });
            }
            if let Some(d) = metric.delimiter {
                if !d.is_ascii() {
                    return Err(ConfigError::InvalidValue {
                        field: format!("metrics.{}.delimiter", metric.name),
                        message: format!("'{d}' is not a single byte"),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn metric(&self, name: &str) -> Option<&MetricSource> {
        self.metrics.iter().find(|m| m.name == name)
    }

    pub fn metric_names(&self) -> Vec<&str> {
        self.metrics.iter().map(|m| m.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_has_four_metrics() {
        let config = DashboardConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.metric_names(),
            vec!["population", "median_income", "housing_prices", "jobs"]
        );
        assert_eq!(config.metric("jobs").unwrap().scale, 1000.0);
        assert_eq!(config.metric("median_income").unwrap().reducer, Reducer::Mean);
        assert_eq!(config.baseline_year, 2012);
        assert_eq!(config.excluded_entities, vec!["United States"]);
    }

    #[test]
    fn test_minimal_json_gets_defaults() {
        let json = r#"{
            "metrics": [
                { "name": "gdp", "label": "GDP", "file": "gdp.csv", "reducer": "sum" }
            ]
        }"#;
        let config = DashboardConfig::from_json(json).unwrap();

        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.comparison_year, 2024);
        let gdp = &config.metrics[0];
        assert_eq!(gdp.scale, 1.0);
        assert_eq!(gdp.columns, ColumnMapping::default());
        assert_eq!(gdp.delimiter, None);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = DashboardConfig::default();
        let json = config.to_json().unwrap();
        assert!(json.contains("\"baselineYear\": 2012"));
        assert_eq!(DashboardConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_rejects_duplicates_and_empty() {
        let mut config = DashboardConfig::default();
        config.metrics.push(MetricSource::new("jobs", "Jobs again", "x.csv", Reducer::Sum));
        assert!(matches!(config.validate(), Err(ConfigError::DuplicateMetric(m)) if m == "jobs"));

        config.metrics.clear();
        assert!(matches!(config.validate(), Err(ConfigError::NoMetrics)));
    }

    #[test]
    fn test_rejects_bad_scale() {
        let mut config = DashboardConfig::default();
        config.metrics[0].scale = 0.0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_unknown_reducer_is_json_error() {
        let json = r#"{"metrics": [{"name": "a", "label": "A", "file": "a.csv", "reducer": "median"}]}"#;
        assert!(matches!(DashboardConfig::from_json(json), Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_from_file_resolves_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("statedash.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{"dataDir": "csv", "metrics": [{{"name": "a", "label": "A", "file": "a.csv", "reducer": "mean"}}]}}"#
        )
        .unwrap();

        let config = DashboardConfig::from_file(&path).unwrap();
        assert_eq!(config.data_dir, dir.path().join("csv"));
        assert_eq!(
            config.metrics[0].path_in(&config.data_dir),
            dir.path().join("csv").join("a.csv")
        );
    }
}
