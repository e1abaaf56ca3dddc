//! Transformation module.
//!
//! Pure transforms over tidy `(entity, year, value)` data:
//! - Normalizer: raw strings to typed records
//! - Series: per-entity time series with entity and year filters
//! - Aggregate: per-year sums or means across entities
//! - Baseline: percentage change from a reference year
//! - Correlation: pairwise Pearson matrix between metrics
//! - Snapshot: single-year cross sections for maps and bubbles
//! - Pipeline: catalog loading and dashboard views

pub mod aggregate;
pub mod baseline;
pub mod correlation;
pub mod normalizer;
pub mod pipeline;
pub mod series;
pub mod snapshot;

pub use aggregate::{aggregate_by_year, aggregate_series, combine_aggregates};
pub use baseline::{
    change_from_baseline, percent_change, period_change, BaselineChange, BaselineResult, Direction, PeriodChange,
    UndefinedBaseline,
};
pub use correlation::{correlation_matrix, pearson, CorrelationEntry, CorrelationMatrix};
pub use normalizer::{normalize, normalize_row, NormalizeResult, RejectReason, RejectedRow};
pub use pipeline::*;
pub use series::{extract_series, SeriesFilter, SeriesMap, YearRange};
pub use snapshot::{bubble_points, year_snapshot, BubblePoint, ValueExtent, YearSnapshot};
