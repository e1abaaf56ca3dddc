//! # Statedash - tidy dataset transforms for a US-state dashboard
//!
//! Statedash loads tidy `State,Year,Value` CSV files (population, median
//! income, housing prices, jobs) and derives the data behind each chart:
//! per-state series, yearly aggregates, change from a baseline year, a
//! cross-metric correlation matrix, map snapshots and bubble points.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  CSV files  │────▶│   Parser    │────▶│ Normalizer  │────▶│   Catalog   │
//! │  (manifest) │     │  (auto-enc) │     │ (typed rows)│     │ (immutable) │
//! └─────────────┘     └─────────────┘     └─────────────┘     └──────┬──────┘
//!                                                                    │
//!                 ┌────────────┬────────────┬────────────┬───────────┤
//!                 ▼            ▼            ▼            ▼           ▼
//!              Series     Aggregate     Baseline    Correlation  Snapshot
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use statedash::{load_catalog, correlation, DashboardConfig};
//!
//! let catalog = load_catalog(&DashboardConfig::from_env()?)?;
//! let matrix = correlation(&catalog, Some(2024))?;
//! println!("{}", serde_json::to_string_pretty(&matrix)?);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Records, datasets, series and undefined-aware statistics
//! - [`config`] - Dataset manifest
//! - [`parser`] - CSV loading with auto-detection
//! - [`transform`] - The pure transforms and the catalog views
//! - [`api`] - HTTP API server

// Core modules
pub mod error;
pub mod models;

// Configuration
pub mod config;

// Parsing
pub mod parser;

// Transformation
pub mod transform;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{ConfigError, LoadError, PipelineError, ServerError, TransformError};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    Dataset,
    RawRecord,
    Reducer,
    SeriesPoint,
    Stat,
    TimeSeries,
    TypedRecord,
    UndefinedReason,
    YearlyAggregate,
};

// =============================================================================
// Re-exports - Configuration
// =============================================================================

pub use config::{DashboardConfig, MetricSource};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    decode_content,
    detect_delimiter,
    detect_encoding,
    format_delimiter,
    parse_bytes,
    parse_bytes_auto,
    parse_csv_file_auto,
    parse_str,
    ColumnMapping,
    ParseResult,
};

// =============================================================================
// Re-exports - Transforms
// =============================================================================

pub use transform::{
    aggregate_by_year,
    bubble_points,
    change_from_baseline,
    combine_aggregates,
    correlation_matrix,
    extract_series,
    normalize,
    period_change,
    year_snapshot,
    BaselineResult,
    CorrelationMatrix,
    NormalizeResult,
    SeriesFilter,
    SeriesMap,
    YearRange,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    bubble_view,
    comparison,
    correlation,
    heatmap_table,
    line_view,
    load_catalog,
    load_metric,
    load_metric_bytes,
    map_view,
    state_changes,
    DatasetCatalog,
    LoadReport,
    LoadedMetric,
    MapView,
    Selection,
};

// =============================================================================
// Re-exports - API
// =============================================================================

pub use api::types::{error_response, ApiResponse, MetricSummary};

// Server
pub mod server {
    pub use crate::api::server::{router, start_server};
}
