//! Authorization: may a test cycle start, may the input list be refreshed.
//!
//! Pure decision logic over an already-normalized [`Record`], the current
//! time and the commit-message override signal. Fetching that signal is the
//! caller's job (see `io::git`); keeping these functions free of I/O makes
//! every scheduling rule testable with synthetic records.

use std::sync::LazyLock;

use chrono::{DateTime, Duration, Utc};

use crate::core::record::Record;

/// Commit-message marker that forces a launch: whitespace-flexible,
/// case-sensitive on the literal words.
static LAUNCH_MARKER: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"Launch\s+test").unwrap());

/// Whether the most recent commit message requests a launch.
///
/// This is the one human-override escape hatch: it bypasses the cooldown
/// and forces an input refresh mid-cycle.
pub fn launch_requested(commit_message: &str) -> bool {
    LAUNCH_MARKER.is_match(commit_message)
}

/// Earliest instant at which the next cycle may start.
pub fn next_authorized_at(record: &Record) -> DateTime<Utc> {
    record.finish + days_duration(record.days_until_next_test)
}

/// May a test cycle start (or continue) right now?
///
/// Rules in order, first match wins:
/// 1. the commit-message override is present;
/// 2. the cooldown is disabled (`days_until_next_test <= 0`);
/// 3. the cooldown has elapsed since the last finish;
/// 4. a cycle is already in progress (a multi-part test must never be
///    blocked by a cooldown computed against its own stale finish time).
pub fn is_test_authorized(record: &Record, now: DateTime<Utc>, launch_requested: bool) -> bool {
    if launch_requested {
        return true;
    }
    if record.days_until_next_test <= 0.0 {
        return true;
    }
    if now > next_authorized_at(record) {
        return true;
    }
    record.currently_under_test
}

/// May the input list be re-downloaded/re-normalized right now?
///
/// Refreshing mid-cycle would mean testing a moving target across parts of
/// the same cycle, so it is only allowed when no cycle is in progress,
/// unless forced by the override or by the record's `live_update` demand.
pub fn is_refresh_authorized(record: &Record, launch_requested: bool) -> bool {
    !record.currently_under_test || launch_requested || record.live_update
}

/// Exact duration of a fractional number of days.
fn days_duration(days: f64) -> Duration {
    Duration::milliseconds((days * 86_400_000.0) as i64)
}
