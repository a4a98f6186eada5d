//! Sensor network monitoring service.
//!
//! Scrapes the public sensor network table (rain gauges, flood sensors,
//! street flood sensors, flood risk index, earthquake sensors), normalizes
//! it against a registry of expected sensor names, and serves the latest
//! snapshot over a read-only HTTP API.

pub mod config;
pub mod dev_mode;
pub mod http;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod normalize;
pub mod refresh;
pub mod registry;
pub mod staleness;
pub mod store;
pub mod verify;
