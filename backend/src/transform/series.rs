//! Group typed records into per-entity time series.
//!
//! ```text
//! Tidy rows                  →  Series by entity
//! ┌──────────────────┐         ┌───────────────────────────────┐
//! │ Utah, 2013, 2.9  │         │ Utah: (2012, 2.8) (2013, 2.9) │
//! │ Ohio, 2012, 11.5 │   →     ├───────────────────────────────┤
//! │ Utah, 2012, 2.8  │         │ Ohio: (2012, 11.5)            │
//! └──────────────────┘         └───────────────────────────────┘
//! ```
//!
//! An empty entity filter selects everything. Duplicate (entity, year)
//! rows resolve to the last one in input order.

use indexmap::IndexMap;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::{TransformError, TransformResult};
use crate::models::{SeriesPoint, TimeSeries, TypedRecord};

/// Inclusive `[min, max]` year window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct YearRange {
    min: i32,
    max: i32,
}

impl YearRange {
    pub fn new(min: i32, max: i32) -> TransformResult<Self> {
        if min > max {
            return Err(TransformError::InvalidYearRange { min, max });
        }
        Ok(Self { min, max })
    }

    /// Build from optional bounds; open ends extend to the i32 limits.
    pub fn from_bounds(min: Option<i32>, max: Option<i32>) -> TransformResult<Option<Self>> {
        match (min, max) {
            (None, None) => Ok(None),
            (min, max) => Self::new(min.unwrap_or(i32::MIN), max.unwrap_or(i32::MAX)).map(Some),
        }
    }

    pub fn min(&self) -> i32 {
        self.min
    }

    pub fn max(&self) -> i32 {
        self.max
    }

    pub fn contains(&self, year: i32) -> bool {
        self.min <= year && year <= self.max
    }
}

/// Which entities and years to keep.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesFilter {
    /// Selected entities in display order; empty means all of them
    pub entities: Vec<String>,
    pub years: Option<YearRange>,
}

impl SeriesFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn entities<I, S>(entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entities: entities.into_iter().map(Into::into).collect(),
            years: None,
        }
    }

    pub fn with_years(mut self, years: YearRange) -> Self {
        self.years = Some(years);
        self
    }
}

/// Ordered mapping from entity to its series.
///
/// Equality ignores ordering.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SeriesMap {
    series: IndexMap<String, TimeSeries>,
}

impl SeriesMap {
    /// Build from already-sorted series, keeping the given order.
    pub fn from_series(series: impl IntoIterator<Item = TimeSeries>) -> Self {
        Self {
            series: series.into_iter().map(|s| (s.entity.clone(), s)).collect(),
        }
    }

    pub fn get(&self, entity: &str) -> Option<&TimeSeries> {
        self.series.get(entity)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn entities(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimeSeries> {
        self.series.values()
    }

    /// Back to tidy rows, entity by entity, years ascending.
    pub fn flatten(&self) -> Vec<TypedRecord> {
        self.iter()
            .flat_map(|s| {
                s.points
                    .iter()
                    .map(move |p| TypedRecord::new(s.entity.clone(), p.year, p.value))
            })
            .collect()
    }

    pub fn into_vec(self) -> Vec<TimeSeries> {
        self.series.into_values().collect()
    }
}

/// Group records into per-entity series.
pub fn extract_series(records: &[TypedRecord], filter: &SeriesFilter) -> SeriesMap {
    let mut grouped: IndexMap<&str, BTreeMap<i32, f64>> = IndexMap::new();

    for record in records {
        if let Some(range) = &filter.years {
            if !range.contains(record.year) {
                continue;
            }
        }
        // insert() overwrites, so the last duplicate wins
        grouped
            .entry(record.entity.as_str())
            .or_default()
            .insert(record.year, record.value);
    }

    let to_series = |entity: &str, points: BTreeMap<i32, f64>| TimeSeries {
        entity: entity.to_string(),
        points: points
            .into_iter()
            .map(|(year, value)| SeriesPoint { year, value })
            .collect(),
    };

    if filter.entities.is_empty() {
        return SeriesMap::from_series(grouped.into_iter().map(|(e, p)| to_series(e, p)));
    }

    let mut selected = Vec::with_capacity(filter.entities.len());
    for entity in &filter.entities {
        if let Some(points) = grouped.swap_remove(entity.trim()) {
            selected.push(to_series(entity.trim(), points));
        }
    }
    SeriesMap::from_series(selected)
}
