//! Record normalizer
//!
//! Turns string-typed rows into [`TypedRecord`]s. Rows that do not parse are
//! reported in [`NormalizeResult::rejected`] and processing continues; the
//! caller decides whether partial data is acceptable.

use serde::Serialize;
use std::fmt;

use crate::models::{RawRecord, TypedRecord};

/// Result of normalizing a batch of raw rows
#[derive(Debug, Clone, Default, Serialize)]
pub struct NormalizeResult {
    /// Successfully parsed records, in input order
    pub records: Vec<TypedRecord>,
    /// Rows excluded from `records`
    pub rejected: Vec<RejectedRow>,
}

/// A row that was excluded
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedRow {
    /// 0-based index into the input
    pub row: usize,
    pub record: RawRecord,
    pub reason: RejectReason,
}

/// Why a row was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RejectReason {
    /// Entity is blank after trimming
    MissingEntity,
    /// Year is not an integer-valued string
    InvalidYear,
    /// Value is not a number
    InvalidValue,
    /// Value parsed to NaN or an infinity
    NonFiniteValue,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RejectReason::MissingEntity => "entity is empty",
            RejectReason::InvalidYear => "year is not an integer",
            RejectReason::InvalidValue => "value is not a number",
            RejectReason::NonFiniteValue => "value is not finite",
        };
        f.write_str(text)
    }
}

impl NormalizeResult {
    /// Check if every row parsed
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }

    /// Get summary statistics
    pub fn summary(&self) -> String {
        format!(
            "Normalized: {} records, {} rejected",
            self.records.len(),
            self.rejected.len()
        )
    }
}

/// Normalize raw rows into typed records.
///
/// Never fails: bad rows end up in `rejected` with the reason.
pub fn normalize(rows: &[RawRecord]) -> NormalizeResult {
    let mut result = NormalizeResult::default();

    for (row, raw) in rows.iter().enumerate() {
        match normalize_row(raw) {
            Ok(record) => result.records.push(record),
            Err(reason) => result.rejected.push(RejectedRow {
                row,
                record: raw.clone(),
                reason,
            }),
        }
    }

    result
}

/// Normalize a single row
pub fn normalize_row(raw: &RawRecord) -> Result<TypedRecord, RejectReason> {
    let entity = raw.entity.trim();
    if entity.is_empty() {
        return Err(RejectReason::MissingEntity);
    }

    Ok(TypedRecord {
        entity: entity.to_string(),
        year: parse_year(&raw.year)?,
        value: parse_value(&raw.value)?,
    })
}

/// Parse an integer-valued year.
///
/// `"2012"` and `"2012.0"` are accepted; fractional or out-of-range values are not.
pub fn parse_year(raw: &str) -> Result<i32, RejectReason> {
    let s = raw.trim();
    if let Ok(year) = s.parse::<i32>() {
        return Ok(year);
    }

    match s.parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 && v >= i32::MIN as f64 && v <= i32::MAX as f64 => {
            Ok(v as i32)
        }
        _ => Err(RejectReason::InvalidYear),
    }
}

/// Parse a finite float value
pub fn parse_value(raw: &str) -> Result<f64, RejectReason> {
    let value = raw
        .trim()
        .parse::<f64>()
        .map_err(|_| RejectReason::InvalidValue)?;

    if value.is_finite() {
        Ok(value)
    } else {
        Err(RejectReason::NonFiniteValue)
    }
}
