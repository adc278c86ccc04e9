//! Cleaning schedule computation.
//!
//! Pure, deterministic functions over the two stored schedule fields and a
//! supplied current time. Nothing here reads the wall clock; callers inject
//! `now`.

use chrono::{DateTime, Duration, Utc};

use crate::models::Node;

/// The instant at which a cleaning cadence falls due.
pub fn next_due(cleaned_at: DateTime<Utc>, interval_days: u32) -> DateTime<Utc> {
    cleaned_at + Duration::days(i64::from(interval_days))
}

/// Whether a node is overdue at `now`.
///
/// Strict comparison: at the exact due instant the node is not yet due.
pub fn is_due(node: &Node, now: DateTime<Utc>) -> bool {
    now > next_due(node.cleaned_at, node.cleaned_interval_days)
}
