//! Per-year cross-entity aggregates.
//!
//! The aggregator is single-metric; [`combine_aggregates`] merges several
//! metrics into one `(year, metric)` table for heatmaps.

use std::collections::BTreeMap;

use crate::models::{Dataset, Reducer, SeriesPoint, TimeSeries, YearlyAggregate};

/// Reduce every entity value of each year, ascending by year.
///
/// Years without records produce no row.
pub fn aggregate_by_year(dataset: &Dataset, reducer: Reducer) -> Vec<YearlyAggregate> {
    let mut groups: BTreeMap<i32, (f64, usize)> = BTreeMap::new();
    for record in &dataset.records {
        let (sum, count) = groups.entry(record.year).or_insert((0.0, 0));
        *sum += record.value;
        *count += 1;
    }

    groups
        .into_iter()
        .map(|(year, (sum, count))| YearlyAggregate {
            year,
            metric: dataset.metric.clone(),
            value: match reducer {
                Reducer::Sum => sum,
                Reducer::Mean => sum / count as f64,
            },
        })
        .collect()
}

/// The aggregate as a single series named after the metric.
pub fn aggregate_series(dataset: &Dataset, reducer: Reducer) -> TimeSeries {
    TimeSeries {
        entity: dataset.metric.clone(),
        points: aggregate_by_year(dataset, reducer)
            .into_iter()
            .map(|a| SeriesPoint {
                year: a.year,
                value: a.value,
            })
            .collect(),
    }
}

/// Merge several single-metric aggregates into one table.
///
/// Ordered by year, then by the order of `inputs`.
pub fn combine_aggregates(inputs: &[(&Dataset, Reducer)]) -> Vec<YearlyAggregate> {
    let mut table: BTreeMap<(i32, usize), YearlyAggregate> = BTreeMap::new();
    for (idx, (dataset, reducer)) in inputs.iter().enumerate() {
        for row in aggregate_by_year(dataset, *reducer) {
            table.insert((row.year, idx), row);
        }
    }
    table.into_values().collect()
}
