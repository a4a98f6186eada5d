//! Registry Coverage Reporting
//!
//! Describes how well one extraction covered the category registry: which
//! expected sensors were populated from a scraped row, which had to be
//! sentinel-filled, and which scraped rows populated nothing at all (a
//! renamed sensor on the source page usually shows up as one of each).
//!
//! Presence/absence only. No attempt is made to judge reading quality.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::model::CategoryId;

// ============================================================================
// Coverage Results
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageReport {
    pub timestamp: String,
    pub categories: Vec<CategoryCoverage>,
    /// Sensor names of raw rows that populated no category.
    pub unused_rows: Vec<String>,
    pub summary: CoverageSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryCoverage {
    pub category: CategoryId,
    pub status: VerificationStatus,
    pub expected: usize,
    pub populated: usize,
    pub sentinel_filled: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageSummary {
    pub expected_total: usize,
    pub populated_total: usize,
    pub sentinel_total: usize,
    pub unused_row_total: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum VerificationStatus {
    Success,
    PartialSuccess,
    Failed,
}

impl CategoryCoverage {
    pub fn new(category: CategoryId, expected: usize, sentinel_filled: Vec<String>) -> Self {
        let populated = expected.saturating_sub(sentinel_filled.len());
        let status = if sentinel_filled.is_empty() {
            VerificationStatus::Success
        } else if populated > 0 {
            VerificationStatus::PartialSuccess
        } else {
            VerificationStatus::Failed
        };

        Self {
            category,
            status,
            expected,
            populated,
            sentinel_filled,
        }
    }
}

impl CoverageReport {
    pub fn new(categories: Vec<CategoryCoverage>, unused_rows: Vec<String>) -> Self {
        let summary = CoverageSummary {
            expected_total: categories.iter().map(|c| c.expected).sum(),
            populated_total: categories.iter().map(|c| c.populated).sum(),
            sentinel_total: categories.iter().map(|c| c.sentinel_filled.len()).sum(),
            unused_row_total: unused_rows.len(),
        };

        Self {
            timestamp: Utc::now().to_rfc3339(),
            categories,
            unused_rows,
            summary,
        }
    }

    pub fn category(&self, category: CategoryId) -> Option<&CategoryCoverage> {
        self.categories.iter().find(|c| c.category == category)
    }

    /// True when no category received a single real reading.
    pub fn is_total_miss(&self) -> bool {
        self.summary.expected_total > 0 && self.summary.populated_total == 0
    }
}

// ============================================================================
// Tests
// ============================================================================
