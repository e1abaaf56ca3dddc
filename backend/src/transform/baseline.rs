//! Percentage change relative to a baseline year.
//!
//! `percent_change = (value(year) - value(baseline)) / value(baseline) * 100`
//!
//! An entity whose baseline point is missing or exactly zero produces no
//! records at all and is listed in [`BaselineResult::undefined`] instead.

use serde::Serialize;

use crate::models::{Stat, UndefinedReason};
use crate::transform::series::SeriesMap;

/// Change of one entity at one year
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineChange {
    pub entity: String,
    pub year: i32,
    pub percent_change: f64,
}

/// An entity skipped because its baseline is unusable
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UndefinedBaseline {
    pub entity: String,
    pub reason: UndefinedReason,
}

/// Result of [`change_from_baseline`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineResult {
    pub baseline_year: i32,
    pub records: Vec<BaselineChange>,
    pub undefined: Vec<UndefinedBaseline>,
}

/// Direction of a defined change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Increased,
    Decreased,
    Unchanged,
}

/// Change of one entity between two years
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodChange {
    pub entity: String,
    pub from_year: i32,
    pub to_year: i32,
    pub percent_change: Stat,
    pub direction: Option<Direction>,
}

impl PeriodChange {
    /// One-line description, e.g. "Utah has increased by 18.25% from 2012 to 2024."
    pub fn describe(&self, metric_label: &str) -> String {
        match (self.percent_change, self.direction) {
            (Stat::Defined(pct), Some(Direction::Unchanged)) => format!(
                "{} {} is unchanged ({:.2}%) from {} to {}.",
                self.entity, metric_label, pct, self.from_year, self.to_year
            ),
            (Stat::Defined(pct), Some(direction)) => format!(
                "{} has {} in {} by {:.2}% from {} to {}.",
                self.entity,
                if direction == Direction::Increased { "increased" } else { "decreased" },
                metric_label,
                pct.abs(),
                self.from_year,
                self.to_year
            ),
            (stat, _) => format!(
                "{}: {} data unavailable ({}).",
                self.entity,
                metric_label,
                stat.reason().map(|r| r.to_string()).unwrap_or_default()
            ),
        }
    }
}

/// Percentage change from `base` to `value`.
///
/// Undefined when `base` is exactly zero.
pub fn percent_change(base: f64, value: f64) -> Stat {
    if base == 0.0 {
        return Stat::Undefined(UndefinedReason::ZeroBaseline);
    }
    Stat::Defined((value - base) / base * 100.0)
}

/// Change of every point of every series relative to `baseline_year`.
pub fn change_from_baseline(series: &SeriesMap, baseline_year: i32) -> BaselineResult {
    let mut result = BaselineResult {
        baseline_year,
        ..Default::default()
    };

    for s in series.iter() {
        let base = match s.value_at(baseline_year) {
            Some(v) if v != 0.0 => v,
            found => {
                result.undefined.push(UndefinedBaseline {
                    entity: s.entity.clone(),
                    reason: if found.is_some() {
                        UndefinedReason::ZeroBaseline
                    } else {
                        UndefinedReason::MissingBaseline
                    },
                });
                continue;
            }
        };

        for point in &s.points {
            let percent_change = if point.year == baseline_year {
                0.0
            } else {
                (point.value - base) / base * 100.0
            };
            result.records.push(BaselineChange {
                entity: s.entity.clone(),
                year: point.year,
                percent_change,
            });
        }
    }

    result
}

/// Change of each series between two specific years.
pub fn period_change(series: &SeriesMap, from_year: i32, to_year: i32) -> Vec<PeriodChange> {
    series
        .iter()
        .map(|s| {
            let percent_change = match (s.value_at(from_year), s.value_at(to_year)) {
                (None, _) => Stat::Undefined(UndefinedReason::MissingBaseline),
                (Some(_), None) => Stat::Undefined(UndefinedReason::MissingValue),
                (Some(base), Some(value)) => percent_change(base, value),
            };
            PeriodChange {
                entity: s.entity.clone(),
                from_year,
                to_year,
                percent_change,
                direction: percent_change.value().map(|pct| {
                    if pct > 0.0 {
                        Direction::Increased
                    } else if pct < 0.0 {
                        Direction::Decreased
                    } else {
                        Direction::Unchanged
                    }
                }),
            }
        })
        .collect()
}
