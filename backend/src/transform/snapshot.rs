//! Single-year cross sections: choropleth values and bubble points.

use indexmap::IndexMap;
use serde::Serialize;

use crate::models::{Dataset, Stat, UndefinedReason};

/// Closed value interval
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValueExtent {
    pub min: f64,
    pub max: f64,
}

impl ValueExtent {
    /// Extent of `values`, or `None` when empty.
    pub fn of(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        values.into_iter().fold(None, |acc, v| match acc {
            None => Some(Self { min: v, max: v }),
            Some(e) => Some(Self {
                min: e.min.min(v),
                max: e.max.max(v),
            }),
        })
    }

    /// Min-max normalize `value` into `[0, 1]` against this extent.
    pub fn normalize(&self, value: f64) -> Stat {
        let width = self.max - self.min;
        if width == 0.0 {
            return Stat::Undefined(UndefinedReason::DegenerateDomain);
        }
        Stat::Defined((value - self.min) / width)
    }
}

/// Every entity's value for one year of one metric
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearSnapshot {
    pub metric: String,
    pub year: i32,
    pub values: IndexMap<String, f64>,
    /// Extent over `values` minus the excluded entities
    pub extent: Option<ValueExtent>,
}

/// Values of `year` by entity (last duplicate wins), with a color-scale
/// extent that ignores `excluded` pseudo-entities.
pub fn year_snapshot(dataset: &Dataset, year: i32, excluded: &[String]) -> YearSnapshot {
    let mut values = IndexMap::new();
    for record in dataset.records.iter().filter(|r| r.year == year) {
        values.insert(record.entity.clone(), record.value);
    }

    let extent = ValueExtent::of(
        values
            .iter()
            .filter(|(entity, _)| !excluded.iter().any(|e| e == *entity))
            .map(|(_, v)| *v),
    );

    YearSnapshot {
        metric: dataset.metric.clone(),
        year,
        values,
        extent,
    }
}

/// One bubble of a two-metric scatter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BubblePoint {
    pub entity: String,
    pub x: f64,
    pub y: f64,
    /// Mean of x and y, each normalized against its metric's all-years extent
    pub size: Stat,
}

/// Pair two metrics at `year` for entities present in both.
///
/// Output follows `x`'s first-appearance order. `excluded` entities still get
/// a point but do not widen the size extents.
pub fn bubble_points(x: &Dataset, y: &Dataset, year: i32, excluded: &[String]) -> Vec<BubblePoint> {
    let counted = |entity: &str| !excluded.iter().any(|e| e == entity);
    let x_extent = ValueExtent::of(x.records.iter().filter(|r| counted(&r.entity)).map(|r| r.value));
    let y_extent = ValueExtent::of(y.records.iter().filter(|r| counted(&r.entity)).map(|r| r.value));
    let xs = year_snapshot(x, year, &[]).values;
    let ys = year_snapshot(y, year, &[]).values;

    xs.into_iter()
        .filter_map(|(entity, xv)| {
            let yv = *ys.get(&entity)?;
            // both extents exist whenever a value was found
            let size = match (x_extent, y_extent) {
                (Some(xe), Some(ye)) => match (xe.normalize(xv), ye.normalize(yv)) {
                    (Stat::Defined(a), Stat::Defined(b)) => Stat::Defined((a + b) / 2.0),
                    (Stat::Undefined(r), _) | (_, Stat::Undefined(r)) => Stat::Undefined(r),
                },
                _ => Stat::Undefined(UndefinedReason::DegenerateDomain),
            };
            Some(BubblePoint {
                entity,
                x: xv,
                y: yv,
                size,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TypedRecord;

    fn dataset(metric: &str, rows: &[(&str, i32, f64)]) -> Dataset {
        Dataset::new(
            metric,
            rows.iter().map(|(e, y, v)| TypedRecord::new(*e, *y, *v)).collect(),
        )
    }

    #[test]
    fn test_snapshot_extent_skips_excluded() {
        let ds = dataset(
            "population",
            &[
                ("Utah", 2012, 2.8),
                ("United States", 2012, 314.0),
                ("Ohio", 2012, 11.5),
                ("Ohio", 2013, 11.6),
            ],
        );
        let snap = year_snapshot(&ds, 2012, &["United States".to_string()]);

        assert_eq!(snap.values.len(), 3);
        assert_eq!(snap.values["United States"], 314.0);
        assert_eq!(snap.extent, Some(ValueExtent { min: 2.8, max: 11.5 }));
    }

    #[test]
    fn test_snapshot_of_missing_year_has_no_extent() {
        let ds = dataset("population", &[("Utah", 2012, 2.8)]);
        let snap = year_snapshot(&ds, 1999, &[]);
        assert!(snap.values.is_empty());
        assert_eq!(snap.extent, None);
    }

    #[test]
    fn test_bubble_size_uses_global_domain() {
        let income = dataset("income", &[("A", 2012, 0.0), ("B", 2012, 50.0), ("A", 2013, 100.0)]);
        let housing = dataset("housing", &[("B", 2012, 10.0), ("A", 2012, 0.0), ("C", 2012, 20.0)]);

        let points = bubble_points(&income, &housing, 2012, &[]);
        let entities: Vec<&str> = points.iter().map(|p| p.entity.as_str()).collect();
        assert_eq!(entities, vec!["A", "B"]);

        assert_eq!(points[0].size, Stat::Defined(0.0));
        // (50/100 + 10/20) / 2
        assert_eq!(points[1].size, Stat::Defined(0.5));
        assert_eq!((points[1].x, points[1].y), (50.0, 10.0));
    }

    #[test]
    fn test_bubble_extent_ignores_excluded_entities() {
        let income = dataset(
            "income",
            &[("A", 2012, 0.0), ("B", 2012, 100.0), ("United States", 2012, 1000.0)],
        );
        let housing = dataset(
            "housing",
            &[("A", 2012, 0.0), ("B", 2012, 10.0), ("United States", 2012, 500.0)],
        );
        let excluded = vec!["United States".to_string()];

        let points = bubble_points(&income, &housing, 2012, &excluded);
        assert_eq!(points.len(), 3);
        assert_eq!(points[1].entity, "B");
        assert_eq!(points[1].size, Stat::Defined(1.0));

        let unfiltered = bubble_points(&income, &housing, 2012, &[]);
        // (100/1000 + 10/500) / 2
        match unfiltered[1].size {
            Stat::Defined(size) => assert!((size - 0.06).abs() < 1e-12),
            ref other => panic!("expected a defined size, got {:?}", other),
        }
    }

    #[test]
    fn test_bubble_degenerate_domain() {
        let flat = dataset("flat", &[("A", 2012, 5.0), ("B", 2012, 5.0)]);
        let other = dataset("other", &[("A", 2012, 1.0), ("B", 2012, 2.0)]);

        let points = bubble_points(&flat, &other, 2012, &[]);
        assert!(points
            .iter()
            .all(|p| p.size == Stat::Undefined(UndefinedReason::DegenerateDomain)));
    }
}
