/// Core data types for the sensor network monitoring service.
///
/// This module defines the shared domain model imported by all other modules:
/// the raw row shape produced by extraction, the closed set of sensor
/// categories, normalized sensor records, and the snapshot document served
/// to dashboard consumers. It contains no I/O.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Sentinels
// ---------------------------------------------------------------------------

/// Current value substituted for a missing street-type sensor.
pub const ZERO_DEPTH_SENTINEL: &str = "0.0m";

/// Current value substituted for a missing sensor in every other category.
pub const NUMERIC_SENTINEL: f64 = 0.0;

/// Marker for a textual field (normal level, description) with no reading.
pub const NOT_AVAILABLE: &str = "N/A";

/// Length-unit marker. A current value containing it is a measured depth.
pub const DEPTH_UNIT_MARKER: char = 'm';

// ---------------------------------------------------------------------------
// Raw rows
// ---------------------------------------------------------------------------

/// One row of the sensor network table, exactly as extracted.
///
/// Field renames match the column headers of the persisted `sensor_data.csv`
/// intermediate so rows can be written and replayed with the same shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRow {
    #[serde(rename = "SENSOR NAME")]
    pub sensor_name: String,
    /// Location / observation time column. Carried through persistence but
    /// never used by normalization.
    #[serde(rename = "OBS TIME")]
    pub secondary_field: String,
    #[serde(rename = "NORMAL LEVEL")]
    pub normal_level: String,
    #[serde(rename = "CURRENT")]
    pub current_value: String,
    #[serde(rename = "DESCRIPTION")]
    pub description: String,
}

impl RawRow {
    pub fn new(
        sensor_name: impl Into<String>,
        secondary_field: impl Into<String>,
        normal_level: impl Into<String>,
        current_value: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            sensor_name: sensor_name.into(),
            secondary_field: secondary_field.into(),
            normal_level: normal_level.into(),
            current_value: current_value.into(),
            description: description.into(),
        }
    }

    /// True when the current value carries the length-unit marker.
    pub fn has_depth_unit(&self) -> bool {
        self.current_value.contains(DEPTH_UNIT_MARKER)
    }
}

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

/// The closed set of sensor groupings.
///
/// Declaration order is the order categories appear in the served document,
/// so `Ord` is derived rather than alphabetical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryId {
    RainGauge,
    FloodSensors,
    StreetFloodSensors,
    FloodRiskIndex,
    EarthquakeSensors,
}

impl CategoryId {
    pub const ALL: [CategoryId; 5] = [
        CategoryId::RainGauge,
        CategoryId::FloodSensors,
        CategoryId::StreetFloodSensors,
        CategoryId::FloodRiskIndex,
        CategoryId::EarthquakeSensors,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryId::RainGauge => "rain_gauge",
            CategoryId::FloodSensors => "flood_sensors",
            CategoryId::StreetFloodSensors => "street_flood_sensors",
            CategoryId::FloodRiskIndex => "flood_risk_index",
            CategoryId::EarthquakeSensors => "earthquake_sensors",
        }
    }

    pub fn parse(s: &str) -> Option<CategoryId> {
        CategoryId::ALL.into_iter().find(|c| c.as_str() == s)
    }

    /// Records in these categories carry normal level and description.
    pub fn carries_levels(&self) -> bool {
        matches!(self, CategoryId::FloodSensors | CategoryId::StreetFloodSensors)
    }

    /// Categories filled by the depth-unit classification pass rather than
    /// by registry lookup.
    pub fn is_unit_classified(&self) -> bool {
        matches!(self, CategoryId::StreetFloodSensors | CategoryId::FloodRiskIndex)
    }

    /// The current value written for an expected sensor with no reading.
    pub fn sentinel_value(&self) -> ReadingValue {
        match self {
            CategoryId::StreetFloodSensors => ReadingValue::Text(ZERO_DEPTH_SENTINEL.to_string()),
            _ => ReadingValue::Number(NUMERIC_SENTINEL),
        }
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A sensor's current value as served: scraped text, or a numeric sentinel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReadingValue {
    Text(String),
    Number(f64),
}

impl fmt::Display for ReadingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadingValue::Text(s) => f.write_str(s),
            ReadingValue::Number(n) => write!(f, "{:?}", n),
        }
    }
}

/// One normalized sensor entry within a category.
///
/// `normal_level` and `description` are present only for level-carrying
/// categories; they are omitted from the document otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorRecord {
    #[serde(rename = "SENSOR NAME")]
    pub name: String,
    #[serde(rename = "CURRENT")]
    pub current_value: ReadingValue,
    #[serde(rename = "NORMAL LEVEL", default, skip_serializing_if = "Option::is_none")]
    pub normal_level: Option<String>,
    #[serde(rename = "DESCRIPTION", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl SensorRecord {
    /// Builds the record for `category` from a matched raw row, naming it
    /// `name` (the registry spelling in the case-insensitive pass).
    pub fn from_row(category: CategoryId, name: &str, row: &RawRow) -> Self {
        let (normal_level, description) = if category.carries_levels() {
            (Some(row.normal_level.clone()), Some(row.description.clone()))
        } else {
            (None, None)
        };
        Self {
            name: name.to_string(),
            current_value: ReadingValue::Text(row.current_value.clone()),
            normal_level,
            description,
        }
    }

    /// Placeholder for an expected sensor with no matching row.
    pub fn sentinel(category: CategoryId, name: &str) -> Self {
        let (normal_level, description) = if category.carries_levels() {
            (Some(NOT_AVAILABLE.to_string()), Some(NOT_AVAILABLE.to_string()))
        } else {
            (None, None)
        };
        Self {
            name: name.to_string(),
            current_value: category.sentinel_value(),
            normal_level,
            description,
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// The complete normalized document produced by one refresh cycle.
///
/// Serializes as a bare category-keyed object, e.g.
/// `{"rain_gauge": [...], "flood_sensors": [...], ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    categories: BTreeMap<CategoryId, Vec<SensorRecord>>,
}

impl Snapshot {
    /// Every known category mapped to an empty sequence.
    pub fn empty() -> Self {
        Self {
            categories: CategoryId::ALL.into_iter().map(|c| (c, Vec::new())).collect(),
        }
    }

    pub fn from_categories(categories: BTreeMap<CategoryId, Vec<SensorRecord>>) -> Self {
        let mut snapshot = Self { categories };
        snapshot.fill_missing_categories();
        snapshot
    }

    /// Ensures every known category has an entry. Documents written by older
    /// registries may lack one.
    pub fn fill_missing_categories(&mut self) {
        for category in CategoryId::ALL {
            self.categories.entry(category).or_default();
        }
    }

    pub fn records(&self, category: CategoryId) -> &[SensorRecord] {
        self.categories.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn record(&self, category: CategoryId, name: &str) -> Option<&SensorRecord> {
        self.records(category).iter().find(|r| r.name == name)
    }

    pub fn categories(&self) -> impl Iterator<Item = (CategoryId, &[SensorRecord])> {
        self.categories.iter().map(|(c, r)| (*c, r.as_slice()))
    }

    pub fn total_records(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_records() == 0
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_snapshot_serializes_every_category_in_order() {
        let json = serde_json::to_string(&Snapshot::empty()).unwrap();
        assert_eq!(
            json,
            r#"{"rain_gauge":[],"flood_sensors":[],"street_flood_sensors":[],"flood_risk_index":[],"earthquake_sensors":[]}"#
        );
    }

    #[test]
    fn test_sentinels_are_bit_exact() {
        let street = SensorRecord::sentinel(CategoryId::StreetFloodSensors, "Libis");
        let flood = SensorRecord::sentinel(CategoryId::FloodSensors, "Sta Cruz");
        let index = SensorRecord::sentinel(CategoryId::FloodRiskIndex, "Libis");

        assert_eq!(
            serde_json::to_string(&street).unwrap(),
            r#"{"SENSOR NAME":"Libis","CURRENT":"0.0m","NORMAL LEVEL":"N/A","DESCRIPTION":"N/A"}"#
        );
        assert_eq!(
            serde_json::to_string(&flood).unwrap(),
            r#"{"SENSOR NAME":"Sta Cruz","CURRENT":0.0,"NORMAL LEVEL":"N/A","DESCRIPTION":"N/A"}"#
        );
        assert_eq!(
            serde_json::to_string(&index).unwrap(),
            r#"{"SENSOR NAME":"Libis","CURRENT":0.0}"#
        );
    }

    #[test]
    fn test_reading_value_deserializes_both_shapes() {
        let text: ReadingValue = serde_json::from_str(r#""1.1m""#).unwrap();
        let number: ReadingValue = serde_json::from_str("0.0").unwrap();
        assert_eq!(text, ReadingValue::Text("1.1m".to_string()));
        assert_eq!(number, ReadingValue::Number(0.0));
    }

    #[test]
    fn test_snapshot_deserialization_fills_missing_categories() {
        let mut snapshot: Snapshot =
            serde_json::from_str(r#"{"rain_gauge":[{"SENSOR NAME":"QCPU","CURRENT":"2.5"}]}"#)
                .unwrap();
        snapshot.fill_missing_categories();
        assert_eq!(snapshot.categories().count(), CategoryId::ALL.len());
        assert_eq!(snapshot.records(CategoryId::RainGauge).len(), 1);
        assert!(snapshot.records(CategoryId::EarthquakeSensors).is_empty());
    }

    #[test]
    fn test_unknown_category_key_is_rejected() {
        let result: Result<Snapshot, _> = serde_json::from_str(r#"{"tide_gauges":[]}"#);
        assert!(result.is_err(), "unknown category keys must not deserialize");
    }

    #[test]
    fn test_depth_unit_detection() {
        assert!(RawRow::new("Libis", "", "0.5m", "0.35m", "Normal").has_depth_unit());
        assert!(!RawRow::new("Libis", "", "", "1.2", "").has_depth_unit());
    }

    #[test]
    fn test_category_parse_round_trips_names() {
        for category in CategoryId::ALL {
            assert_eq!(CategoryId::parse(category.as_str()), Some(category));
        }
        assert_eq!(CategoryId::parse("RAIN_GAUGE"), None);
    }
}
