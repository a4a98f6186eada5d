/// Structured logging for the sensor network monitoring service
///
/// Provides component-tagged logging with optional sensor identifiers,
/// failure classification for refresh cycles, and cycle summaries. Events are
/// emitted through `tracing`; `init_logger` installs a console layer and,
/// optionally, an append-only file layer for daemon operation.

use std::fmt;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt as tfmt};

use crate::ingest::ExtractError;
use crate::refresh::RefreshError;
use crate::verify::CoverageReport;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn parse(s: &str) -> Option<LogLevel> {
        match s.to_ascii_lowercase().as_str() {
            "debug" | "trace" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warning),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }

    fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Extract,
    Normalize,
    Store,
    Refresh,
    Api,
    System,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Extract => write!(f, "EXTRACT"),
            Component::Normalize => write!(f, "NORMALIZE"),
            Component::Store => write!(f, "STORE"),
            Component::Refresh => write!(f, "REFRESH"),
            Component::Api => write!(f, "API"),
            Component::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - source briefly unavailable, retry will likely fix it
    Expected,
    /// Unexpected failure - the source changed shape or local storage is broken
    Unexpected,
    /// Unknown - cannot tell whether this is transient
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Install the global subscriber.
///
/// `RUST_LOG`, when set, takes precedence over `min_level`. Fails if the log
/// file cannot be opened or a subscriber is already installed.
pub fn init_logger(
    min_level: LogLevel,
    log_file: Option<&Path>,
    console_timestamps: bool,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(min_level.as_filter()));

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    layers.push(if console_timestamps {
        tfmt::layer().with_target(false).boxed()
    } else {
        tfmt::layer().with_target(false).without_time().boxed()
    });

    if let Some(path) = log_file {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        layers.push(
            tfmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Log a general informational message
pub fn info(component: Component, sensor: Option<&str>, message: &str) {
    match sensor {
        Some(s) => tracing::info!(component = %component, sensor = s, "{}", message),
        None => tracing::info!(component = %component, "{}", message),
    }
}

/// Log a warning message
pub fn warn(component: Component, sensor: Option<&str>, message: &str) {
    match sensor {
        Some(s) => tracing::warn!(component = %component, sensor = s, "{}", message),
        None => tracing::warn!(component = %component, "{}", message),
    }
}

/// Log an error message
pub fn error(component: Component, sensor: Option<&str>, message: &str) {
    match sensor {
        Some(s) => tracing::error!(component = %component, sensor = s, "{}", message),
        None => tracing::error!(component = %component, "{}", message),
    }
}

/// Log a debug message
pub fn debug(component: Component, sensor: Option<&str>, message: &str) {
    match sensor {
        Some(s) => tracing::debug!(component = %component, sensor = s, "{}", message),
        None => tracing::debug!(component = %component, "{}", message),
    }
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify an extraction failure
pub fn classify_extract_failure(err: &ExtractError) -> FailureType {
    match err {
        // The page is slow or down; the next cycle usually recovers.
        ExtractError::Timeout { .. } => FailureType::Expected,
        // The page rendered but the table moved or changed shape.
        ExtractError::StructureNotFound(_) | ExtractError::SchemaDrift { .. } => {
            FailureType::Unexpected
        }
        // Could be a quiet period on the source or a partial render.
        ExtractError::Empty => FailureType::Unknown,
        ExtractError::Replay(_) | ExtractError::UnsupportedRowShape { .. } => {
            FailureType::Unexpected
        }
    }
}

/// Classify a failed refresh cycle
pub fn classify_refresh_failure(err: &RefreshError) -> FailureType {
    match err {
        RefreshError::Extract(e) => classify_extract_failure(e),
        RefreshError::Persist(_) => FailureType::Unexpected,
    }
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log a failed refresh cycle at a level chosen by its classification
pub fn log_refresh_failure(source: &str, err: &RefreshError) {
    let failure_type = classify_refresh_failure(err);
    let message = format!("Refresh from {} failed [{}]: {}", source, failure_type, err);

    match failure_type {
        FailureType::Expected => warn(Component::Refresh, None, &message),
        FailureType::Unexpected => error(Component::Refresh, None, &message),
        FailureType::Unknown => warn(Component::Refresh, None, &message),
    }
}

// ---------------------------------------------------------------------------
// Cycle Summary Logging
// ---------------------------------------------------------------------------

/// Log a summary of how well a cycle covered the registry
pub fn log_cycle_summary(rows: usize, coverage: &CoverageReport) {
    let summary = &coverage.summary;
    let message = format!(
        "Snapshot published: {} rows, {}/{} sensors populated, {} sentinel-filled, {} unused rows",
        rows,
        summary.populated_total,
        summary.expected_total,
        summary.sentinel_total,
        summary.unused_row_total
    );

    if coverage.is_total_miss() {
        error(Component::Normalize, None, &message);
    } else if summary.sentinel_total > 0 {
        warn(Component::Normalize, None, &message);
    } else {
        info(Component::Normalize, None, &message);
    }

    for name in &coverage.unused_rows {
        debug(Component::Normalize, Some(name), "row matched no registry entry");
    }
}
