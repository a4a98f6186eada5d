/// Live checks against the public sensor network page
///
/// These make real HTTP requests and are ignored by default.
///
/// Run with: cargo test --test live_source -- --ignored --test-threads=1
///
/// Note: the page may render its table client-side, in which case a plain
/// fetch reports `StructureNotFound`. That is a finding, not a flaky test.

use std::time::Duration;

use sensmon_service::ingest::Extractor;
use sensmon_service::ingest::iriseup::{DEFAULT_SOURCE_URL, SensorPageExtractor};
use sensmon_service::ingest::retry::RetryConfig;
use sensmon_service::normalize::normalize_with_coverage;
use sensmon_service::registry::CategoryRegistry;

#[test]
#[ignore]
fn test_live_page_yields_rows_matching_registry() {
    let mut extractor =
        SensorPageExtractor::new(Duration::from_secs(60), RetryConfig::default(), None)
            .expect("client should build");

    let rows = match extractor.fetch(DEFAULT_SOURCE_URL) {
        Ok(rows) => rows,
        Err(e) => panic!("live fetch failed: {}", e),
    };
    assert!(!rows.is_empty());

    let registry = CategoryRegistry::default();
    let normalized = normalize_with_coverage(&rows, &registry);
    println!(
        "{} rows: {}/{} populated, unused: {:?}",
        rows.len(),
        normalized.coverage.summary.populated_total,
        normalized.coverage.summary.expected_total,
        normalized.coverage.unused_rows
    );
    assert!(
        !normalized.coverage.is_total_miss(),
        "no registry sensor matched; names on the page may have changed"
    );
}
