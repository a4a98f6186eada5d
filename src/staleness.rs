/// Published snapshot staleness detection.
///
/// The refresh loop publishes every minute under normal conditions. When the
/// source page is down for a while the API keeps serving the last good
/// snapshot, so clients need to know how old it is. The status endpoint uses
/// this module to flag that.
///
/// # Clock injection
/// `is_stale_at` takes `now` as a parameter rather than calling `Utc::now()`
/// internally, so staleness is deterministic in tests.

use chrono::{DateTime, Utc};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Staleness check
// ---------------------------------------------------------------------------

/// Returns `true` if a snapshot published at `published_at` is older than
/// `max_age` relative to `now`.
///
/// Staleness is strictly greater than the threshold:
///   age > max_age  →  stale
///   age == max_age →  not stale
///
/// A snapshot with no known publish time (nothing published yet) is stale.
/// A publish time in the future, e.g. after a clock step, is not.
pub fn is_stale_at(published_at: Option<DateTime<Utc>>, max_age: Duration, now: DateTime<Utc>) -> bool {
    let Some(published_at) = published_at else {
        return true;
    };
    match (now - published_at).to_std() {
        Ok(age) => age > max_age,
        Err(_) => false,
    }
}

/// Age of the snapshot in whole seconds, `None` when unknown or in the future.
pub fn age_secs_at(published_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<u64> {
    let age = now - published_at?;
    u64::try_from(age.num_seconds()).ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
