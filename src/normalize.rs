/// Row normalization: raw table rows → category-keyed snapshot.
///
/// Two passes over the extracted rows:
///
/// 1. **Unit classification.** Every row is assigned to the street-flood
///    family if its current value carries the depth unit (`m`), otherwise to
///    the flood-risk index. The row is kept only if its sensor name is listed
///    (exactly, case-sensitive) in that category's registry. Kept rows are
///    appended in the order they were scraped. Registry members that received
///    no row are then appended as sentinels, in registry order.
/// 2. **Registry lookup.** Every remaining category walks its registry list in
///    order and looks each name up among the rows case-insensitively; the
///    first matching row wins. A miss produces a sentinel.
///
/// Normalization is a pure function of its inputs, so the same rows always
/// produce the same snapshot.

use std::collections::BTreeMap;

use crate::model::{CategoryId, RawRow, SensorRecord, Snapshot};
use crate::registry::CategoryRegistry;
use crate::verify::{CategoryCoverage, CoverageReport};

/// Snapshot plus the coverage report describing how it was filled.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub snapshot: Snapshot,
    pub coverage: CoverageReport,
}

/// Normalizes `rows` against `registry`. Empty input yields a snapshot made
/// entirely of sentinels; callers that treat empty extraction as a failure
/// must check before calling.
pub fn normalize(rows: &[RawRow], registry: &CategoryRegistry) -> Snapshot {
    normalize_with_coverage(rows, registry).snapshot
}

pub fn normalize_with_coverage(rows: &[RawRow], registry: &CategoryRegistry) -> Normalized {
    let mut buckets: BTreeMap<CategoryId, Vec<SensorRecord>> = BTreeMap::new();
    let mut filled: BTreeMap<CategoryId, Vec<String>> = BTreeMap::new();
    let mut used = vec![false; rows.len()];

    // Pass 1: depth unit decides between street flood sensors and the risk index.
    for (idx, row) in rows.iter().enumerate() {
        let category = if row.has_depth_unit() {
            CategoryId::StreetFloodSensors
        } else {
            CategoryId::FloodRiskIndex
        };
        if !registry.contains(category, &row.sensor_name) {
            continue;
        }
        let bucket = buckets.entry(category).or_default();
        if bucket.iter().any(|r| r.name == row.sensor_name) {
            continue;
        }
        bucket.push(SensorRecord::from_row(category, &row.sensor_name, row));
        used[idx] = true;
    }

    for category in CategoryId::ALL.into_iter().filter(CategoryId::is_unit_classified) {
        let bucket = buckets.entry(category).or_default();
        for name in registry.expected(category) {
            if !bucket.iter().any(|r| &r.name == name) {
                bucket.push(SensorRecord::sentinel(category, name));
                filled.entry(category).or_default().push(name.clone());
            }
        }
    }

    // Pass 2: registry order, case-insensitive lookup, first match wins.
    for category in CategoryId::ALL.into_iter().filter(|c| !c.is_unit_classified()) {
        let bucket = buckets.entry(category).or_default();
        for name in registry.expected(category) {
            match find_row(rows, name) {
                Some(idx) => {
                    bucket.push(SensorRecord::from_row(category, name, &rows[idx]));
                    used[idx] = true;
                }
                None => {
                    bucket.push(SensorRecord::sentinel(category, name));
                    filled.entry(category).or_default().push(name.clone());
                }
            }
        }
    }

    let coverage = CoverageReport::new(
        CategoryId::ALL
            .into_iter()
            .map(|c| {
                CategoryCoverage::new(
                    c,
                    registry.expected(c).len(),
                    filled.remove(&c).unwrap_or_default(),
                )
            })
            .collect(),
        unused_row_names(rows, &used),
    );

    Normalized {
        snapshot: Snapshot::from_categories(buckets),
        coverage,
    }
}

/// Index of the first row whose sensor name equals `name` ignoring case.
fn find_row(rows: &[RawRow], name: &str) -> Option<usize> {
    let wanted = fold_case(name);
    rows.iter().position(|r| fold_case(&r.sensor_name) == wanted)
}

/// Caseless form of `s`: lowercase, plus the full case foldings of Latin
/// and Greek letters that lowercasing alone leaves distinct.
fn fold_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            'ß' | 'ẞ' => out.push_str("ss"),
            'ſ' => out.push('s'),
            'ς' => out.push('σ'),
            'µ' => out.push('μ'),
            'ﬀ' => out.push_str("ff"),
            'ﬁ' => out.push_str("fi"),
            'ﬂ' => out.push_str("fl"),
            'ﬃ' => out.push_str("ffi"),
            'ﬄ' => out.push_str("ffl"),
            'ﬅ' | 'ﬆ' => out.push_str("st"),
            _ => out.extend(ch.to_lowercase()),
        }
    }
    out
}

fn unused_row_names(rows: &[RawRow], used: &[bool]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for (row, _) in rows.iter().zip(used).filter(|(_, used)| !**used) {
        if !names.contains(&row.sensor_name) {
            names.push(row.sensor_name.clone());
        }
    }
    names
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
