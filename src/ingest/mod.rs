/// Row extraction from the sensor network source.
///
/// The source page is treated as an unreliable producer of table rows. All
/// retrieval mechanisms sit behind the [`Extractor`] trait so the refresh
/// cycle, and its tests, never depend on a live page.
///
/// Submodules:
/// - `table`: pulls `tbody` rows out of an HTML document.
/// - `iriseup`: live HTTP fetch with timeout and retry.
/// - `retry`: blocking retry with exponential backoff.

pub mod iriseup;
pub mod retry;
pub mod table;

use thiserror::Error;

use crate::model::RawRow;

/// Version of the row shape this crate expects from an extractor: five
/// columns (name, observation time, normal level, current, description).
/// The refresh cycle refuses extractors reporting any other version.
pub const ROW_SHAPE_VERSION: u32 = 1;

/// Number of table cells a row must carry to be read.
pub const EXPECTED_COLUMNS: usize = 5;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why an extraction attempt produced no usable rows.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractError {
    /// The page could not be loaded within the attempt budget.
    #[error("page load failed after {attempts} attempt(s): {last_error}")]
    Timeout { attempts: u32, last_error: String },
    /// The page loaded but the expected table was absent.
    #[error("structure not found: {0}")]
    StructureNotFound(String),
    /// The table is present but no row has the expected column count.
    #[error("schema drift: expected {expected} columns, rows carry at most {found}")]
    SchemaDrift { expected: usize, found: usize },
    /// The table is present and well-formed but holds no rows.
    #[error("no sensor rows extracted")]
    Empty,
    /// The replay file could not be read.
    #[error("replay source unreadable: {0}")]
    Replay(String),
    /// The extractor produces a row shape this build cannot normalize.
    #[error("unsupported row shape version {found}, expected {expected}")]
    UnsupportedRowShape { expected: u32, found: u32 },
}

impl ExtractError {
    /// Only load failures are worth retrying within a cycle.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExtractError::Timeout { .. })
    }
}

// ---------------------------------------------------------------------------
// Extractor contract
// ---------------------------------------------------------------------------

/// A producer of raw sensor rows.
///
/// `fetch` may block for a bounded time. Implementations return
/// [`ExtractError::Empty`] rather than an empty `Vec`.
pub trait Extractor: Send {
    fn fetch(&mut self, source: &str) -> Result<Vec<RawRow>, ExtractError>;

    /// Short label used in log lines.
    fn name(&self) -> &str;

    /// Row shape this extractor produces.
    fn row_shape_version(&self) -> u32 {
        ROW_SHAPE_VERSION
    }
}

/// Fails unless `extractor` produces the row shape this build expects.
pub fn check_row_shape(extractor: &dyn Extractor) -> Result<(), ExtractError> {
    let found = extractor.row_shape_version();
    if found != ROW_SHAPE_VERSION {
        return Err(ExtractError::UnsupportedRowShape {
            expected: ROW_SHAPE_VERSION,
            found,
        });
    }
    Ok(())
}

impl<E: Extractor + ?Sized> Extractor for Box<E> {
    fn fetch(&mut self, source: &str) -> Result<Vec<RawRow>, ExtractError> {
        (**self).fetch(source)
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn row_shape_version(&self) -> u32 {
        (**self).row_shape_version()
    }
}
