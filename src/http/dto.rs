//! Response bodies that are not the snapshot document itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::verify::CoverageReport;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Body of `GET /api/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    /// When the served snapshot became current; `None` before the first publish.
    pub published_at: Option<DateTime<Utc>>,
    pub age_secs: Option<u64>,
    pub stale: bool,
    pub max_snapshot_age_secs: u64,
    pub total_records: usize,
    pub refresh: RefreshStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshStatus {
    pub cycles: u64,
    pub consecutive_failures: u32,
    pub last_attempt: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_coverage: Option<CoverageReport>,
}
