//! Domain models shared by the loader, the transforms and the API.
//!
//! - [`RawRecord`] / [`TypedRecord`] - one tidy `(entity, year, value)` row
//! - [`Dataset`] - typed rows tagged with a metric name
//! - [`TimeSeries`] - one entity's points, ascending by year
//! - [`YearlyAggregate`] - one reduced value per (year, metric)
//! - [`Reducer`] - how entity values combine within a year
//! - [`Stat`] - a statistic that is either defined or explicitly undefined

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Records
// =============================================================================

/// A row as split from a tabular source, nothing parsed yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub entity: String,
    pub year: String,
    pub value: String,
}

impl RawRecord {
    pub fn new(entity: impl Into<String>, year: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            year: year.into(),
            value: value.into(),
        }
    }
}

/// A parsed row. `value` is always finite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedRecord {
    pub entity: String,
    pub year: i32,
    pub value: f64,
}

impl TypedRecord {
    pub fn new(entity: impl Into<String>, year: i32, value: f64) -> Self {
        Self {
            entity: entity.into(),
            year,
            value,
        }
    }
}

// =============================================================================
// Dataset
// =============================================================================

/// Typed records for one metric, in source order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub metric: String,
    pub records: Vec<TypedRecord>,
}

impl Dataset {
    pub fn new(metric: impl Into<String>, records: Vec<TypedRecord>) -> Self {
        Self {
            metric: metric.into(),
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Multiply every value by `factor` (e.g. a file reported in thousands).
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            metric: self.metric.clone(),
            records: self
                .records
                .iter()
                .map(|r| TypedRecord::new(r.entity.clone(), r.year, r.value * factor))
                .collect(),
        }
    }

    /// Drop records of the listed entities (e.g. a national pseudo-entity).
    pub fn without_entities(&self, excluded: &[String]) -> Self {
        self.filtered(|r| !excluded.iter().any(|e| e == &r.entity))
    }

    /// Keep only records of the listed entities.
    pub fn only_entities(&self, included: &[String]) -> Self {
        self.filtered(|r| included.iter().any(|e| e == &r.entity))
    }

    fn filtered(&self, keep: impl Fn(&TypedRecord) -> bool) -> Self {
        Self {
            metric: self.metric.clone(),
            records: self.records.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }

    /// Distinct years, ascending.
    pub fn years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = self.records.iter().map(|r| r.year).collect();
        years.sort_unstable();
        years.dedup();
        years
    }

    /// Distinct entities in first-appearance order.
    pub fn entities(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.records
            .iter()
            .filter(|r| seen.insert(r.entity.as_str()))
            .map(|r| r.entity.clone())
            .collect()
    }
}

// =============================================================================
// Time Series
// =============================================================================

/// One observation in a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub year: i32,
    pub value: f64,
}

/// One entity's values, strictly ascending by year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub entity: String,
    pub points: Vec<SeriesPoint>,
}

impl TimeSeries {
    /// Value at `year`, if the series has a point there.
    pub fn value_at(&self, year: i32) -> Option<f64> {
        self.points
            .binary_search_by_key(&year, |p| p.year)
            .ok()
            .map(|idx| self.points[idx].value)
    }

    pub fn first_year(&self) -> Option<i32> {
        self.points.first().map(|p| p.year)
    }

    pub fn last_year(&self) -> Option<i32> {
        self.points.last().map(|p| p.year)
    }
}

// =============================================================================
// Aggregation
// =============================================================================

/// Cross-entity combining function for one year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reducer {
    Sum,
    Mean,
}

impl fmt::Display for Reducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reducer::Sum => write!(f, "sum"),
            Reducer::Mean => write!(f, "mean"),
        }
    }
}

impl FromStr for Reducer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sum" => Ok(Reducer::Sum),
            "mean" | "avg" | "average" => Ok(Reducer::Mean),
            other => Err(format!("unknown reducer '{other}' (expected sum or mean)")),
        }
    }
}

/// One reduced value for a (year, metric) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearlyAggregate {
    pub year: i32,
    pub metric: String,
    pub value: f64,
}

// =============================================================================
// Undefined-aware statistics
// =============================================================================

/// Why a statistic could not be computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UndefinedReason {
    /// No value at the baseline year.
    MissingBaseline,
    /// Baseline value is exactly zero.
    ZeroBaseline,
    /// No value at the comparison year.
    MissingValue,
    /// Fewer than two paired observations.
    TooFewPairs,
    /// Zero variance in at least one variable.
    ZeroVariance,
    /// Min-max normalization over a zero-width domain.
    DegenerateDomain,
}

impl fmt::Display for UndefinedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            UndefinedReason::MissingBaseline => "no value at baseline year",
            UndefinedReason::ZeroBaseline => "baseline value is zero",
            UndefinedReason::MissingValue => "no value at comparison year",
            UndefinedReason::TooFewPairs => "fewer than two paired observations",
            UndefinedReason::ZeroVariance => "zero variance",
            UndefinedReason::DegenerateDomain => "value domain has zero width",
        };
        f.write_str(text)
    }
}

/// A derived number that may be undefined.
///
/// Undefined is kept distinct from zero so a renderer can print `N/A`
/// instead of a misleading `0%`. Serializes as
/// `{"status": "defined", "value": 0.93}` or
/// `{"status": "undefined", "value": "zeroVariance"}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "lowercase")]
pub enum Stat {
    Defined(f64),
    Undefined(UndefinedReason),
}

impl Stat {
    pub fn value(&self) -> Option<f64> {
        match self {
            Stat::Defined(v) => Some(*v),
            Stat::Undefined(_) => None,
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, Stat::Defined(_))
    }

    pub fn reason(&self) -> Option<UndefinedReason> {
        match self {
            Stat::Defined(_) => None,
            Stat::Undefined(reason) => Some(*reason),
        }
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self, f.precision()) {
            (Stat::Defined(v), Some(p)) => write!(f, "{:.*}", p, v),
            (Stat::Defined(v), None) => write!(f, "{}", v),
            (Stat::Undefined(_), _) => f.write_str("N/A"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Dataset {
        Dataset::new(
            "population",
            vec![
                TypedRecord::new("Utah", 2013, 2.9),
                TypedRecord::new("Ohio", 2012, 11.5),
                TypedRecord::new("United States", 2012, 314.0),
                TypedRecord::new("Utah", 2012, 2.8),
            ],
        )
    }

    #[test]
    fn test_dataset_years_and_entities() {
        let ds = sample();
        assert_eq!(ds.years(), vec![2012, 2013]);
        assert_eq!(ds.entities(), vec!["Utah", "Ohio", "United States"]);
    }

    #[test]
    fn test_dataset_exclusion_is_explicit() {
        let ds = sample();
        let states = ds.without_entities(&["United States".to_string()]);
        assert_eq!(states.len(), 3);
        assert!(states.records.iter().all(|r| r.entity != "United States"));

        let only = ds.only_entities(&["Ohio".to_string()]);
        assert_eq!(only.len(), 1);
        assert_eq!(only.metric, "population");
    }

    #[test]
    fn test_dataset_scaled() {
        let ds = Dataset::new("jobs", vec![TypedRecord::new("Utah", 2012, 1.5)]).scaled(1000.0);
        assert_eq!(ds.records[0].value, 1500.0);
    }

    #[test]
    fn test_series_value_at() {
        let series = TimeSeries {
            entity: "Utah".into(),
            points: vec![
                SeriesPoint { year: 2012, value: 1.0 },
                SeriesPoint { year: 2014, value: 3.0 },
            ],
        };
        assert_eq!(series.value_at(2014), Some(3.0));
        assert_eq!(series.value_at(2013), None);
        assert_eq!(series.first_year(), Some(2012));
        assert_eq!(series.last_year(), Some(2014));
    }

    #[test]
    fn test_reducer_from_str() {
        assert_eq!("Sum".parse::<Reducer>().unwrap(), Reducer::Sum);
        assert_eq!("average".parse::<Reducer>().unwrap(), Reducer::Mean);
        assert!("median".parse::<Reducer>().is_err());
    }

    #[test]
    fn test_stat_serde_format() {
        assert_eq!(
            serde_json::to_value(Stat::Defined(0.5)).unwrap(),
            json!({ "status": "defined", "value": 0.5 })
        );
        assert_eq!(
            serde_json::to_value(Stat::Undefined(UndefinedReason::ZeroBaseline)).unwrap(),
            json!({ "status": "undefined", "value": "zeroBaseline" })
        );
    }

    #[test]
    fn test_stat_display_never_prints_nan() {
        assert_eq!(format!("{:.2}", Stat::Defined(12.3456)), "12.35");
        assert_eq!(format!("{:.2}", Stat::Undefined(UndefinedReason::TooFewPairs)), "N/A");
    }
}
