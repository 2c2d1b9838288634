//! Time and timestamp helpers.

use chrono::{DateTime, TimeDelta, Utc};

/// UTC timestamp used for `occurred_at`, `created_at`, `scheduled_at`, etc.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// The instant `days` whole days before `at`, or `None` when that lies
/// before the earliest representable timestamp.
#[must_use]
pub fn days_before(at: Timestamp, days: u32) -> Option<Timestamp> {
    at.checked_sub_signed(TimeDelta::try_days(i64::from(days))?)
}
