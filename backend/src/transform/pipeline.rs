//! Catalog loading and dashboard views.
//!
//! [`load_catalog`] runs every manifest entry through
//! parse -> normalize -> scale once and returns an immutable
//! [`DatasetCatalog`]. Views are plain functions of the catalog and an
//! explicit [`Selection`]; nothing here holds mutable state.
//!
//! # Example
//!
//! ```rust,ignore
//! use statedash::config::DashboardConfig;
//! use statedash::transform::pipeline::{load_catalog, line_view, Selection};
//!
//! let catalog = load_catalog(&DashboardConfig::from_env()?)?;
//! let selection = Selection::new("population").with_states(["Utah", "Ohio"]);
//! let series = line_view(&catalog, &selection, None)?;
//! ```

use serde::Serialize;
use std::path::Path;

use crate::api::logs::{log_info, log_success, log_success_indent, log_warning_indent};
use crate::config::{DashboardConfig, MetricSource};
use crate::error::{LoadError, PipelineError, PipelineResult};
use crate::models::{Dataset, YearlyAggregate};
use crate::parser::{format_delimiter, parse_bytes, MalformedLine};
use crate::transform::aggregate::{aggregate_series, combine_aggregates};
use crate::transform::baseline::{change_from_baseline, period_change, BaselineResult, PeriodChange};
use crate::transform::correlation::{correlation_matrix, CorrelationMatrix};
use crate::transform::normalizer::{normalize, RejectedRow};
use crate::transform::series::{extract_series, SeriesFilter, SeriesMap, YearRange};
use crate::transform::snapshot::{bubble_points, year_snapshot, BubblePoint, YearSnapshot};

/// Number of rejected rows echoed to the log per metric
const REJECT_LOG_SAMPLE: usize = 5;

// =============================================================================
// Catalog
// =============================================================================

/// What happened while loading one metric file
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadReport {
    pub rows_read: usize,
    pub rows_used: usize,
    pub rejected: Vec<RejectedRow>,
    pub malformed: Vec<MalformedLine>,
    pub encoding: String,
    pub delimiter: char,
    pub headers: Vec<String>,
}

/// A metric ready for the views
#[derive(Debug, Clone)]
pub struct LoadedMetric {
    pub source: MetricSource,
    /// Normalized and scaled records
    pub dataset: Dataset,
    pub report: LoadReport,
}

/// Every loaded metric plus the manifest settings the views need.
#[derive(Debug, Clone)]
pub struct DatasetCatalog {
    metrics: Vec<LoadedMetric>,
    pub baseline_year: i32,
    pub comparison_year: i32,
    pub excluded_entities: Vec<String>,
}

impl DatasetCatalog {
    /// Assemble a catalog from metrics loaded elsewhere.
    pub fn new(config: &DashboardConfig, metrics: Vec<LoadedMetric>) -> Self {
        Self {
            metrics,
            baseline_year: config.baseline_year,
            comparison_year: config.comparison_year,
            excluded_entities: config.excluded_entities.clone(),
        }
    }

    pub fn metrics(&self) -> &[LoadedMetric] {
        &self.metrics
    }

    pub fn metric(&self, name: &str) -> PipelineResult<&LoadedMetric> {
        self.metrics
            .iter()
            .find(|m| m.source.name == name)
            .ok_or_else(|| PipelineError::UnknownMetric(name.to_string()))
    }

    pub fn dataset(&self, name: &str) -> PipelineResult<&Dataset> {
        Ok(&self.metric(name)?.dataset)
    }
}

/// Load every metric of the manifest.
///
/// Stops at the first metric that cannot be read or yields no usable row.
pub fn load_catalog(config: &DashboardConfig) -> PipelineResult<DatasetCatalog> {
    config.validate()?;
    log_info(format!(
        "📂 Loading {} metrics from {}",
        config.metrics.len(),
        config.data_dir.display()
    ));

    let metrics = config
        .metrics
        .iter()
        .map(|source| load_metric(source, &config.data_dir))
        .collect::<PipelineResult<Vec<_>>>()?;

    log_success(format!("Catalog ready: {}", config.metric_names().join(", ")));
    Ok(DatasetCatalog::new(config, metrics))
}

/// Load one metric from its file under `data_dir`.
pub fn load_metric(source: &MetricSource, data_dir: &Path) -> PipelineResult<LoadedMetric> {
    let path = source.path_in(data_dir);
    log_info(format!("📖 {} <- {}", source.name, path.display()));

    let bytes = std::fs::read(&path).map_err(|e| PipelineError::Load {
        metric: source.name.clone(),
        source: LoadError::Io(e),
    })?;
    load_metric_bytes(source, &bytes)
}

/// Load one metric from in-memory CSV bytes.
pub fn load_metric_bytes(source: &MetricSource, bytes: &[u8]) -> PipelineResult<LoadedMetric> {
    let parsed = parse_bytes(bytes, source.delimiter, &source.columns).map_err(|e| PipelineError::Load {
        metric: source.name.clone(),
        source: e,
    })?;

    log_success_indent(
        format!(
            "{} rows (encoding {}, delimiter '{}')",
            parsed.records.len(),
            parsed.encoding,
            format_delimiter(parsed.delimiter)
        ),
        1,
    );
    for bad in &parsed.malformed {
        log_warning_indent(format!("line {}: {}", bad.line, bad.message), 1);
    }

    let normalized = normalize(&parsed.records);
    if !normalized.is_clean() {
        log_warning_indent(format!("{} rows rejected", normalized.rejected.len()), 1);
        for rejected in normalized.rejected.iter().take(REJECT_LOG_SAMPLE) {
            let line = parsed.lines.get(rejected.row).copied().unwrap_or_default();
            log_warning_indent(format!("line {}: {}", line, rejected.reason), 2);
        }
    }

    if normalized.records.is_empty() {
        return Err(PipelineError::AllRejected {
            metric: source.name.clone(),
            count: parsed.records.len(),
        });
    }

    let mut dataset = Dataset::new(source.name.clone(), normalized.records);
    if source.scale != 1.0 {
        dataset = dataset.scaled(source.scale);
    }

    let report = LoadReport {
        rows_read: parsed.records.len(),
        rows_used: dataset.len(),
        rejected: normalized.rejected,
        malformed: parsed.malformed,
        encoding: parsed.encoding,
        delimiter: parsed.delimiter,
        headers: parsed.headers,
    };
    log_success_indent(format!("{} records for '{}'", report.rows_used, source.name), 1);

    Ok(LoadedMetric {
        source: source.clone(),
        dataset,
        report,
    })
}

// =============================================================================
// Selection
// =============================================================================

/// What the user is currently looking at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub dataset: String,
    /// Year of interest; the catalog's comparison year when absent
    pub year: Option<i32>,
    /// Selected states in display order; empty means all
    pub states: Vec<String>,
}

impl Selection {
    pub fn new(dataset: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            year: None,
            states: Vec::new(),
        }
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_states<I, S>(mut self, states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.states = states.into_iter().map(Into::into).collect();
        self
    }

    fn year_or(&self, catalog: &DatasetCatalog) -> i32 {
        self.year.unwrap_or(catalog.comparison_year)
    }

    fn filter(&self) -> SeriesFilter {
        SeriesFilter::entities(self.states.iter().cloned())
    }
}

// =============================================================================
// Views
// =============================================================================

/// Series of the selected dataset for the selected states.
pub fn line_view(catalog: &DatasetCatalog, selection: &Selection, years: Option<YearRange>) -> PipelineResult<SeriesMap> {
    let dataset = catalog.dataset(&selection.dataset)?;
    let mut filter = selection.filter();
    if let Some(range) = years {
        filter = filter.with_years(range);
    }
    Ok(extract_series(&dataset.records, &filter))
}

/// Yearly aggregate of every metric with its own reducer.
pub fn heatmap_table(catalog: &DatasetCatalog) -> Vec<YearlyAggregate> {
    let inputs: Vec<(&Dataset, _)> = catalog
        .metrics()
        .iter()
        .map(|m| (&m.dataset, m.source.reducer))
        .collect();
    combine_aggregates(&inputs)
}

/// Change from `baseline_year` of each metric's cross-state aggregate.
///
/// Each series in the result is named after its metric.
pub fn comparison(catalog: &DatasetCatalog, baseline_year: Option<i32>) -> BaselineResult {
    let aggregates = SeriesMap::from_series(
        catalog
            .metrics()
            .iter()
            .map(|m| aggregate_series(&m.dataset, m.source.reducer)),
    );
    change_from_baseline(&aggregates, baseline_year.unwrap_or(catalog.baseline_year))
}

/// Per-state change from `baseline_year` for the selected dataset.
pub fn state_changes(catalog: &DatasetCatalog, selection: &Selection, baseline_year: Option<i32>) -> PipelineResult<BaselineResult> {
    let series = line_view(catalog, selection, None)?;
    Ok(change_from_baseline(&series, baseline_year.unwrap_or(catalog.baseline_year)))
}

/// Correlation between every pair of metrics.
pub fn correlation(catalog: &DatasetCatalog, key_year: Option<i32>) -> PipelineResult<CorrelationMatrix> {
    let datasets: Vec<Dataset> = catalog.metrics().iter().map(|m| m.dataset.clone()).collect();
    Ok(correlation_matrix(&datasets, key_year)?)
}

/// Choropleth data for one dataset and year
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapView {
    pub label: String,
    pub snapshot: YearSnapshot,
    /// Change of each selected state between the two years
    pub changes: Vec<PeriodChange>,
    pub descriptions: Vec<String>,
}

/// Snapshot of the selected year plus the selected states' change from
/// `from_year` to the selected year.
pub fn map_view(catalog: &DatasetCatalog, selection: &Selection, from_year: Option<i32>) -> PipelineResult<MapView> {
    let metric = catalog.metric(&selection.dataset)?;
    let year = selection.year_or(catalog);
    let from_year = from_year.unwrap_or(catalog.baseline_year);

    let snapshot = year_snapshot(&metric.dataset, year, &catalog.excluded_entities);
    let changes = if selection.states.is_empty() {
        Vec::new()
    } else {
        period_change(&extract_series(&metric.dataset.records, &selection.filter()), from_year, year)
    };
    let descriptions = changes.iter().map(|c| c.describe(&metric.source.label)).collect();

    Ok(MapView {
        label: metric.source.label.clone(),
        snapshot,
        changes,
        descriptions,
    })
}

/// Two metrics paired per state at the selected year.
pub fn bubble_view(catalog: &DatasetCatalog, x: &str, y: &str, year: Option<i32>) -> PipelineResult<Vec<BubblePoint>> {
    let x = catalog.dataset(x)?;
    let y = catalog.dataset(y)?;
    Ok(bubble_points(x, y, year.unwrap_or(catalog.comparison_year), &catalog.excluded_entities))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Reducer, Stat, UndefinedReason};
    use std::fs;

    const POPULATION: &str = "State,Year,Value\n\
        Utah,2012,100\n\
        Utah,2024,150\n\
        Ohio,2012,200\n\
        Ohio,2024,180\n\
        United States,2012,300\n\
        United States,2024,330\n";

    const INCOME: &str = "State;Year;Value\n\
        Utah;2012;10\n\
        Utah;2024;20\n\
        Ohio;2012;30\n\
        Ohio;2024;n/a\n";

    fn config() -> DashboardConfig {
        DashboardConfig {
            metrics: vec![
                MetricSource::new("population", "Population", "pop.csv", Reducer::Sum),
                MetricSource::new("income", "Income", "income.csv", Reducer::Mean),
            ],
            ..DashboardConfig::default()
        }
    }

    fn catalog() -> DatasetCatalog {
        let config = config();
        let metrics = vec![
            load_metric_bytes(&config.metrics[0], POPULATION.as_bytes()).unwrap(),
            load_metric_bytes(&config.metrics[1], INCOME.as_bytes()).unwrap(),
        ];
        DatasetCatalog::new(&config, metrics)
    }

    #[test]
    fn test_load_report_counts() {
        let cat = catalog();
        let income = cat.metric("income").unwrap();
        assert_eq!(income.report.delimiter, ';');
        assert_eq!(income.report.rows_read, 4);
        assert_eq!(income.report.rows_used, 3);
        assert_eq!(income.report.rejected.len(), 1);
        assert_eq!(income.report.rejected[0].record.entity, "Ohio");
    }

    #[test]
    fn test_scale_applied() {
        let source = MetricSource::new("jobs", "Jobs", "jobs.csv", Reducer::Sum).with_scale(1000.0);
        let loaded = load_metric_bytes(&source, b"State,Year,Value\nUtah,2012,1.5\n").unwrap();
        assert_eq!(loaded.dataset.records[0].value, 1500.0);
    }

    #[test]
    fn test_all_rejected_is_error() {
        let source = MetricSource::new("jobs", "Jobs", "jobs.csv", Reducer::Sum);
        let err = load_metric_bytes(&source, b"State,Year,Value\nUtah,soon,1\n,2012,2\n").unwrap_err();
        assert!(matches!(err, PipelineError::AllRejected { ref metric, count: 2 } if metric == "jobs"));
    }

    #[test]
    fn test_load_error_names_metric() {
        let source = MetricSource::new("jobs", "Jobs", "jobs.csv", Reducer::Sum);
        let err = load_metric_bytes(&source, b"Name,Year,Value\nUtah,2012,1\n").unwrap_err();
        assert!(matches!(err, PipelineError::Load { ref metric, source: LoadError::MissingColumn { .. } } if metric == "jobs"));
    }

    #[test]
    fn test_load_catalog_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("pop.csv"), POPULATION).unwrap();
        fs::write(dir.path().join("income.csv"), INCOME).unwrap();

        let config = DashboardConfig {
            data_dir: dir.path().to_path_buf(),
            ..config()
        };
        let cat = load_catalog(&config).unwrap();
        assert_eq!(cat.metrics().len(), 2);
        assert_eq!(cat.dataset("population").unwrap().len(), 6);
    }

    #[test]
    fn test_load_catalog_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = DashboardConfig {
            data_dir: dir.path().to_path_buf(),
            ..config()
        };
        let err = load_catalog(&config).unwrap_err();
        assert!(matches!(err, PipelineError::Load { source: LoadError::Io(_), .. }));
    }

    #[test]
    fn test_unknown_metric() {
        let cat = catalog();
        let err = line_view(&cat, &Selection::new("gdp"), None).unwrap_err();
        assert!(matches!(err, PipelineError::UnknownMetric(ref m) if m == "gdp"));
        assert!(bubble_view(&cat, "population", "gdp", None).is_err());
    }

    #[test]
    fn test_line_view_follows_selection() {
        let cat = catalog();
        let selection = Selection::new("population").with_states(["Ohio", "Utah"]);
        let series = line_view(&cat, &selection, None).unwrap();
        assert_eq!(series.entities().collect::<Vec<_>>(), vec!["Ohio", "Utah"]);

        let all = line_view(&cat, &Selection::new("population"), None).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_heatmap_keeps_every_entity() {
        let cat = catalog();
        let table = heatmap_table(&cat);
        assert_eq!(table.len(), 4);
        // the national row is only dropped through an explicit selection
        let pop_2012 = table
            .iter()
            .find(|r| r.metric == "population" && r.year == 2012)
            .unwrap();
        assert_eq!(pop_2012.value, 600.0);

        // income 2024 has a single usable row
        let income_2024 = table.iter().find(|r| r.metric == "income" && r.year == 2024).unwrap();
        assert_eq!(income_2024.value, 20.0);
    }

    #[test]
    fn test_comparison_per_metric() {
        let cat = catalog();
        let result = comparison(&cat, None);
        assert_eq!(result.baseline_year, 2012);

        let pop_2024 = result
            .records
            .iter()
            .find(|r| r.entity == "population" && r.year == 2024)
            .unwrap();
        // 600 -> 660
        assert!((pop_2024.percent_change - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_state_changes() {
        let cat = catalog();
        let selection = Selection::new("population").with_states(["Utah"]);
        let result = state_changes(&cat, &selection, None).unwrap();
        assert_eq!(result.records.len(), 2);
        assert_eq!(result.records[1].percent_change, 50.0);
    }

    #[test]
    fn test_map_view() {
        let cat = catalog();
        let selection = Selection::new("population").with_states(["Utah", "Ohio"]);
        let view = map_view(&cat, &selection, None).unwrap();

        assert_eq!(view.snapshot.year, 2024);
        assert_eq!(view.snapshot.values.len(), 3);
        let extent = view.snapshot.extent.unwrap();
        assert_eq!((extent.min, extent.max), (150.0, 180.0));
        assert_eq!(view.changes[0].percent_change, Stat::Defined(50.0));
        assert_eq!(view.changes[1].percent_change, Stat::Defined(-10.0));
        assert_eq!(view.descriptions[1], "Ohio has decreased in Population by 10.00% from 2012 to 2024.");
    }

    #[test]
    fn test_map_view_without_states_has_no_changes() {
        let cat = catalog();
        let view = map_view(&cat, &Selection::new("income").with_year(2012), None).unwrap();
        assert!(view.changes.is_empty());
        assert_eq!(view.snapshot.values.len(), 2);
    }

    #[test]
    fn test_bubble_view_skips_missing_pairs() {
        let cat = catalog();
        let points = bubble_view(&cat, "population", "income", Some(2024)).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].entity, "Utah");
    }

    #[test]
    fn test_bubble_view_size_ignores_national_total() {
        let cat = catalog();
        let points = bubble_view(&cat, "population", "population", Some(2024)).unwrap();
        let entities: Vec<&str> = points.iter().map(|p| p.entity.as_str()).collect();
        assert_eq!(entities, vec!["Utah", "Ohio", "United States"]);
        // states span 100..=200 across all years
        assert_eq!(points[0].size, Stat::Defined(0.5));
        assert_eq!(points[1].size, Stat::Defined(0.8));
    }

    #[test]
    fn test_correlation_view() {
        let cat = catalog();
        let matrix = correlation(&cat, Some(2012)).unwrap();
        assert_eq!(matrix.metrics, vec!["population", "income"]);
        // Utah and Ohio both move up together in 2012
        assert_eq!(matrix.get("population", "income").unwrap().coefficient, Stat::Defined(1.0));

        let later = correlation(&cat, Some(2024)).unwrap();
        assert_eq!(
            later.get("population", "income").unwrap().coefficient,
            Stat::Undefined(UndefinedReason::TooFewPairs)
        );
    }
}
