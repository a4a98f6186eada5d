/// Sensor category registry for the sensor network monitoring service.
///
/// Defines which sensor names are expected in each category of the served
/// document. This is the single source of truth for expected sensors: the
/// normalizer gap-fills against it, and the dashboard relies on every name
/// listed here being present in its category exactly once.
///
/// The registry is static configuration. It is built once at startup, either
/// from the built-in table below or from a TOML override file, and is never
/// derived from scraped data.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::model::CategoryId;

// ---------------------------------------------------------------------------
// Built-in registry
// ---------------------------------------------------------------------------

/// Expected sensors per category, in the order the dashboard lists them.
///
/// Street-level sensors appear in both `street_flood_sensors` and
/// `flood_risk_index`; which of the two a given reading lands in is decided
/// by its unit, not by this table.
pub static DEFAULT_REGISTRY: &[(CategoryId, &[&str])] = &[
    (
        CategoryId::RainGauge,
        &[
            "QCPU",
            "Masambong",
            "Batasan Hills",
            "Ugong Norte",
            "Ramon Magsaysay HS",
            "UP Village",
            "Dona Imelda",
            "Kaligayahan",
            "Emilio Jacinto Sr HS",
            "Payatas ES",
            "Ramon Magsaysay Brgy Hall",
            "Phil-Am",
            "Holy Spirit",
            "Libis",
            "South Triangle",
            "Nagkaisang Nayon",
            "Tandang Sora",
            "Talipapa",
            "Brgy Fairview (REC)",
            "Brgy Baesa Hall",
            "Brgy N.S Amoranto Hall",
            "Brgy Valencia Hall",
        ],
    ),
    (
        CategoryId::FloodSensors,
        &[
            "North Fairview",
            "Batasan-San Mateo",
            "Bahay Toro",
            "Sta Cruz",
            "San Bartolome",
        ],
    ),
    (CategoryId::StreetFloodSensors, STREET_LEVEL_SENSORS),
    (CategoryId::FloodRiskIndex, STREET_LEVEL_SENSORS),
    (CategoryId::EarthquakeSensors, &["QCDRRMO", "QCDRRMO REC"]),
];

const STREET_LEVEL_SENSORS: &[&str] = &[
    "N.S. Amoranto Street",
    "New Greenland",
    "Kalantiaw Street",
    "F. Calderon Street",
    "Christine Street",
    "Ramon Magsaysay Brgy Hall",
    "Phil-Am",
    "Holy Spirit",
    "Libis",
    "South Triangle",
    "Nagkaisang Nayon",
    "Tandang Sora",
    "Talipapa",
];

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("duplicate sensor '{name}' in category {category}")]
    DuplicateSensor { category: CategoryId, name: String },
    #[error("unknown category '{0}' in registry file")]
    UnknownCategory(String),
    #[error("failed to read registry file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse registry file: {0}")]
    Parse(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Category → ordered list of expected sensor names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRegistry {
    entries: BTreeMap<CategoryId, Vec<String>>,
}

impl CategoryRegistry {
    /// Builds a registry from explicit lists. Categories not mentioned get an
    /// empty list. A name listed twice within one category is rejected, since
    /// the snapshot could then not hold it exactly once.
    pub fn new<I, N>(lists: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = (CategoryId, Vec<N>)>,
        N: Into<String>,
    {
        let mut entries: BTreeMap<CategoryId, Vec<String>> =
            CategoryId::ALL.into_iter().map(|c| (c, Vec::new())).collect();

        for (category, names) in lists {
            let mut seen = HashSet::new();
            let list = entries.entry(category).or_default();
            list.clear();
            for name in names {
                let name = name.into();
                if !seen.insert(name.clone()) {
                    return Err(RegistryError::DuplicateSensor { category, name });
                }
                list.push(name);
            }
        }

        Ok(Self { entries })
    }

    /// Parses a registry override file:
    ///
    /// ```toml
    /// rain_gauge = ["QCPU", "Masambong"]
    /// flood_sensors = ["North Fairview"]
    /// ```
    pub fn from_toml_str(text: &str) -> Result<Self, RegistryError> {
        #[derive(Deserialize)]
        #[serde(transparent)]
        struct RegistryFile(BTreeMap<String, Vec<String>>);

        let RegistryFile(raw) = toml::from_str(text)?;
        let mut lists = Vec::with_capacity(raw.len());
        for (key, names) in raw {
            let category =
                CategoryId::parse(&key).ok_or_else(|| RegistryError::UnknownCategory(key.clone()))?;
            lists.push((category, names));
        }
        Self::new(lists)
    }

    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let text = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Expected sensor names for a category, in declaration order.
    pub fn expected(&self, category: CategoryId) -> &[String] {
        self.entries.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Case-sensitive exact membership test.
    pub fn contains(&self, category: CategoryId, name: &str) -> bool {
        self.expected(category).iter().any(|n| n == name)
    }

    pub fn total_expected(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

impl Default for CategoryRegistry {
    fn default() -> Self {
        let entries = DEFAULT_REGISTRY
            .iter()
            .map(|(category, names)| (*category, names.iter().map(|n| n.to_string()).collect()))
            .collect();
        Self { entries }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
