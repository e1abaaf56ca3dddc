//! Error types for the statedash data pipeline.
//!
//! Data-quality problems (unparseable rows, undefined statistics, missing
//! entity/year combinations) are *values* carried in results, not errors.
//! The types below only cover I/O failures and contract violations:
//!
//! - [`LoadError`] - reading and splitting a CSV data file
//! - [`ConfigError`] - dataset manifest problems
//! - [`TransformError`] - precondition violations of the pure transforms
//! - [`PipelineError`] - catalog loading and view orchestration
//! - [`ServerError`] - HTTP API failures
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// CSV Loading Errors
// =============================================================================

/// Errors while reading a tabular data file.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reader failure (headers or framing).
    #[error("Invalid CSV format: {0}")]
    Csv(#[from] csv::Error),

    /// Empty file.
    #[error("CSV file is empty")]
    EmptyFile,

    /// Delimiter is not a single-byte character.
    #[error("Delimiter '{0}' is not a single byte")]
    InvalidDelimiter(char),

    /// A required column is not present in the header row.
    #[error("Missing column '{column}' (found: {found})")]
    MissingColumn { column: String, found: String },
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors in the dataset manifest.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Manifest could not be read.
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest is not valid JSON for the expected shape.
    #[error("Config JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// No metric is declared.
    #[error("Config declares no metrics")]
    NoMetrics,

    /// Two metrics share a name.
    #[error("Metric '{0}' is declared more than once")]
    DuplicateMetric(String),

    /// A field holds an unusable value.
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

// =============================================================================
// Transform Errors
// =============================================================================

/// Contract violations of the transform functions.
///
/// These are caller bugs, not data problems, and are reported immediately
/// instead of producing a misleading empty result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    /// Correlation requested over zero metrics.
    #[error("At least one metric is required")]
    NoMetrics,

    /// The same metric was supplied twice.
    #[error("Metric '{0}' was supplied more than once")]
    DuplicateMetric(String),

    /// `min > max`.
    #[error("Invalid year range: {min} > {max}")]
    InvalidYearRange { min: i32, max: i32 },
}

// =============================================================================
// Pipeline Errors
// =============================================================================

/// Catalog loading and view errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Loading a metric's file failed.
    #[error("Failed to load metric '{metric}': {source}")]
    Load {
        metric: String,
        #[source]
        source: LoadError,
    },

    /// Manifest error.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Transform precondition violated.
    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    /// A request named a metric that is not in the catalog.
    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    /// Every row of a metric's file was rejected.
    #[error("All {count} rows of metric '{metric}' were rejected")]
    AllRejected { metric: String, count: usize },
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Socket or runtime failure.
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Whether the caller is at fault (maps to HTTP 400).
    pub fn is_client_error(&self) -> bool {
        match self {
            ServerError::BadRequest(_) => true,
            ServerError::Pipeline(PipelineError::UnknownMetric(_))
            | ServerError::Pipeline(PipelineError::Transform(_)) => true,
            _ => false,
        }
    }
}

impl From<TransformError> for ServerError {
    fn from(err: TransformError) -> Self {
        ServerError::Pipeline(PipelineError::Transform(err))
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for loading operations.
pub type LoadResult<T> = Result<T, LoadError>;

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for transform operations.
pub type TransformResult<T> = Result<T, TransformError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // TransformError -> PipelineError
        let err: PipelineError = TransformError::NoMetrics.into();
        assert!(err.to_string().contains("At least one metric"));

        // ConfigError -> PipelineError
        let err: PipelineError = ConfigError::DuplicateMetric("jobs".into()).into();
        assert!(err.to_string().contains("jobs"));

        // TransformError -> ServerError skips a level
        let err: ServerError = TransformError::InvalidYearRange { min: 2024, max: 2012 }.into();
        assert!(err.to_string().contains("2024 > 2012"));
    }

    #[test]
    fn test_load_error_names_metric() {
        let err = PipelineError::Load {
            metric: "population".into(),
            source: LoadError::MissingColumn {
                column: "Year".into(),
                found: "State, Value".into(),
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("population"));
        assert!(msg.contains("Missing column 'Year'"));
    }

    #[test]
    fn test_client_error_classification() {
        assert!(ServerError::BadRequest("x".into()).is_client_error());
        assert!(ServerError::from(PipelineError::UnknownMetric("gdp".into())).is_client_error());
        assert!(!ServerError::Internal("bind".into()).is_client_error());
        assert!(!ServerError::from(PipelineError::AllRejected {
            metric: "jobs".into(),
            count: 3
        })
        .is_client_error());
    }
}
