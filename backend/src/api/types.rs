//! REST API types for the dashboard frontend.
//!
//! Every successful response is wrapped in [`ApiResponse`]; failures use
//! [`error_response`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::models::Reducer;
use crate::transform::pipeline::LoadedMetric;

/// Envelope for every successful response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    /// Unique request identifier
    pub request_id: String,
    pub generated_at: DateTime<Utc>,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            generated_at: Utc::now(),
            data,
        }
    }
}

/// One entry of `GET /api/metrics`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSummary {
    pub name: String,
    pub label: String,
    pub reducer: Reducer,
    pub scale: f64,
    pub records: usize,
    pub entities: usize,
    pub first_year: Option<i32>,
    pub last_year: Option<i32>,
    pub rejected: usize,
    pub file_info: FileInfo,
}

/// CSV file metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub encoding: String,
    pub delimiter: String,
    pub row_count: usize,
    pub columns: Vec<String>,
}

impl From<&LoadedMetric> for MetricSummary {
    fn from(metric: &LoadedMetric) -> Self {
        let years = metric.dataset.years();
        MetricSummary {
            name: metric.source.name.clone(),
            label: metric.source.label.clone(),
            reducer: metric.source.reducer,
            scale: metric.source.scale,
            records: metric.dataset.len(),
            entities: metric.dataset.entities().len(),
            first_year: years.first().copied(),
            last_year: years.last().copied(),
            rejected: metric.report.rejected.len(),
            file_info: FileInfo {
                encoding: metric.report.encoding.clone(),
                delimiter: metric.report.delimiter.to_string(),
                row_count: metric.report.rows_read,
                columns: metric.report.headers.clone(),
            },
        }
    }
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "requestId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
    })
}
