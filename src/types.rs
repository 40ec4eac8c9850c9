use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::errors::DashboardError;

/// One row pulled from the CSV source, header -> raw cell value.
///
/// Transient: consumed during aggregation, never stored.
pub type RawRecord = HashMap<String, String>;

/// Where the current snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataOrigin {
    CsvFile,
    FallbackData,
}

impl DataOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataOrigin::CsvFile => "csv_file",
            DataOrigin::FallbackData => "fallback_data",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DataOrigin::CsvFile => "Government CSV File",
            DataOrigin::FallbackData => "Sample Government Data",
        }
    }
}

/// Aggregated performance metrics for one district.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistrictMetrics {
    pub employment_generated: u64,
    pub persondays_generated: u64,
    pub avg_days_per_household: u64,
    /// Clamped to [50, 75], see aggregation policy.
    pub women_participation: u64,
    /// Clamped to [75, 95], see aggregation policy.
    pub work_completion_rate: u64,
    pub total_works: u64,
    pub completed_works: u64,
    pub active_workers: u64,
    pub demand_registered: u64,
    pub work_provided: u64,
    pub total_wages: u64,
    pub records_processed: u64,
}

/// The full aggregation result for one state, replaced wholesale per load.
#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub state: String,
    pub districts: BTreeMap<String, DistrictMetrics>,
    pub loaded_at: DateTime<Utc>,
    pub origin: DataOrigin,
}

/// Diagnostic view of the CSV source, returned by `DataService::file_status`.
#[derive(Debug, Clone, Serialize)]
pub struct FileStatus {
    pub csv_path: String,
    pub file_exists: bool,
    pub last_modified: Option<DateTime<Utc>>,
    pub snapshot_loaded: bool,
    pub district_count: usize,
    pub source: DataOrigin,
}

// =============================================================================
// QUERY RESPONSES
// Every query operation resolves to a serializable envelope carrying
// `success: true`; failures become an ErrorResponse with `success: false`.
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct DistrictListResponse {
    pub success: bool,
    pub districts: Vec<String>,
    pub total: usize,
    pub source: DataOrigin,
    pub data_source: String,
    pub last_updated: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceSummary {
    pub total_persondays: u64,
    pub total_households: u64,
    pub works_completed: u64,
    pub total_works: u64,
    pub note: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceMetadata {
    pub state: String,
    pub district: String,
    pub data_source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_last_modified: Option<DateTime<Utc>>,
    pub records_processed: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceResponse {
    pub success: bool,
    pub performance: DistrictMetrics,
    pub source: DataOrigin,
    pub last_updated: DateTime<Utc>,
    pub summary: PerformanceSummary,
    pub metadata: PerformanceMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComparativeEntry {
    pub district: String,
    pub employment_generated: u64,
    pub work_completion_rate: u64,
    pub women_participation: u64,
    pub avg_days_per_household: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparativeResponse {
    pub success: bool,
    pub data: Vec<ComparativeEntry>,
    pub state: String,
    pub total_districts: usize,
    pub source: DataOrigin,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshResponse {
    pub success: bool,
    pub district_count: usize,
    pub source: DataOrigin,
    pub refreshed_at: DateTime<Utc>,
}

/// Structured failure envelope, the only shape errors reach callers in.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_states: Option<Vec<String>>,
}

impl From<&DashboardError> for ErrorResponse {
    fn from(err: &DashboardError) -> Self {
        let available_states = match err {
            DashboardError::StateNotFound { available, .. } => Some(available.clone()),
            _ => None,
        };
        Self {
            success: false,
            error: err.to_string(),
            available_states,
        }
    }
}

/// Collapse a query result into the `{success, ...}` JSON shape the routing
/// layer forwards verbatim.
pub fn to_envelope<T: Serialize>(result: Result<T, DashboardError>) -> serde_json::Value {
    match result {
        Ok(payload) => serde_json::to_value(payload).unwrap_or_else(|e| {
            serde_json::json!({
                "success": false,
                "error": format!("Serialization error: {}", e),
            })
        }),
        Err(err) => serde_json::to_value(ErrorResponse::from(&err)).unwrap_or_else(|_| {
            serde_json::json!({ "success": false, "error": err.to_string() })
        }),
    }
}
