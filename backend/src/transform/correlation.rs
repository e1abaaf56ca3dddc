//! Pairwise Pearson correlation between metrics.
//!
//! Observations are paired on shared `(entity, year)` keys. Each unordered
//! pair of metrics is computed once and mirrored, so the matrix is exactly
//! symmetric. Self-pairs are pinned to `1.0` when defined.

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use crate::error::{TransformError, TransformResult};
use crate::models::{Dataset, Stat, UndefinedReason};

/// One cell of the matrix
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationEntry {
    pub metric_x: String,
    pub metric_y: String,
    pub coefficient: Stat,
    /// Number of paired observations used
    pub pairs: usize,
}

/// Row-major matrix over `metrics`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationMatrix {
    pub metrics: Vec<String>,
    pub key_year: Option<i32>,
    pub entries: Vec<CorrelationEntry>,
}

impl CorrelationMatrix {
    pub fn get(&self, metric_x: &str, metric_y: &str) -> Option<&CorrelationEntry> {
        let x = self.metrics.iter().position(|m| m == metric_x)?;
        let y = self.metrics.iter().position(|m| m == metric_y)?;
        self.entries.get(x * self.metrics.len() + y)
    }
}

type KeyIndex<'a> = BTreeMap<(&'a str, i32), f64>;

/// Build the correlation matrix.
///
/// With `key_year`, only observations of that year are paired; otherwise
/// every shared `(entity, year)` key is used.
pub fn correlation_matrix(datasets: &[Dataset], key_year: Option<i32>) -> TransformResult<CorrelationMatrix> {
    if datasets.is_empty() {
        return Err(TransformError::NoMetrics);
    }
    let mut seen = HashSet::new();
    for ds in datasets {
        if !seen.insert(ds.metric.as_str()) {
            return Err(TransformError::DuplicateMetric(ds.metric.clone()));
        }
    }

    let indices: Vec<KeyIndex> = datasets.iter().map(|ds| build_index(ds, key_year)).collect();
    let n = datasets.len();
    let mut cells: Vec<Option<(Stat, usize)>> = vec![None; n * n];

    for i in 0..n {
        for j in i..n {
            let pairs = paired_values(&indices[i], &indices[j]);
            let mut coefficient = pearson(&pairs);
            if i == j && coefficient.is_defined() {
                coefficient = Stat::Defined(1.0);
            }
            cells[i * n + j] = Some((coefficient, pairs.len()));
            cells[j * n + i] = Some((coefficient, pairs.len()));
        }
    }

    let entries = cells
        .into_iter()
        .enumerate()
        .filter_map(|(idx, cell)| {
            let (coefficient, pairs) = cell?;
            Some(CorrelationEntry {
                metric_x: datasets[idx / n].metric.clone(),
                metric_y: datasets[idx % n].metric.clone(),
                coefficient,
                pairs,
            })
        })
        .collect();

    Ok(CorrelationMatrix {
        metrics: datasets.iter().map(|ds| ds.metric.clone()).collect(),
        key_year,
        entries,
    })
}

/// `(entity, year) -> value`; the last duplicate wins.
fn build_index(dataset: &Dataset, key_year: Option<i32>) -> KeyIndex<'_> {
    dataset
        .records
        .iter()
        .filter(|r| key_year.map_or(true, |y| r.year == y))
        .map(|r| ((r.entity.as_str(), r.year), r.value))
        .collect()
}

fn paired_values(x: &KeyIndex, y: &KeyIndex) -> Vec<(f64, f64)> {
    x.iter()
        .filter_map(|(key, xv)| y.get(key).map(|yv| (*xv, *yv)))
        .collect()
}

/// Pearson correlation coefficient of paired observations.
pub fn pearson(pairs: &[(f64, f64)]) -> Stat {
    if pairs.len() < 2 {
        return Stat::Undefined(UndefinedReason::TooFewPairs);
    }
    // rounding in the mean leaves tiny nonzero spreads for constant columns
    let (x0, y0) = pairs[0];
    if pairs.iter().all(|(x, _)| *x == x0) || pairs.iter().all(|(_, y)| *y == y0) {
        return Stat::Undefined(UndefinedReason::ZeroVariance);
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let (mut numerator, mut ss_x, mut ss_y) = (0.0, 0.0, 0.0);
    for (x, y) in pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        numerator += dx * dy;
        ss_x += dx * dx;
        ss_y += dy * dy;
    }

    let denominator = (ss_x * ss_y).sqrt();
    if denominator == 0.0 || !denominator.is_finite() {
        return Stat::Undefined(UndefinedReason::ZeroVariance);
    }
    Stat::Defined((numerator / denominator).clamp(-1.0, 1.0))
}
