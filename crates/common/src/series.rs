//! Hourly downsampling of account-value snapshots.
//!
//! Snapshots arrive at irregular intervals; the dashboard charts want a
//! regular hourly series over the trailing 24 hours. Buckets are anchored to
//! the top of each UTC hour, last write wins within a bucket, and empty
//! buckets are omitted rather than interpolated or zero-filled.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Width of the trailing window, in hours. The window spans 25 hourly
/// anchors (hour 0 through hour 24 inclusive).
pub const WINDOW_HOURS: i64 = 24;

/// One point-in-time account-value observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapshot {
    pub at: DateTime<Utc>,
    pub total_value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub time: DateTime<Utc>,
    pub value: f64,
}

fn truncate_to_hour(at: DateTime<Utc>) -> DateTime<Utc> {
    let secs = at.timestamp();
    DateTime::from_timestamp(secs - secs.rem_euclid(3600), 0).unwrap_or(at)
}

/// Downsample `snapshots` (sorted ascending by timestamp) into hourly buckets
/// over `[window_end - 24h, window_end]`.
///
/// Pure function of its inputs: the caller fixes `window_end` once per
/// request, so concurrent requests a few seconds apart may see slightly
/// different windows.
pub fn hourly_series(snapshots: &[Snapshot], window_end: DateTime<Utc>) -> Vec<SeriesPoint> {
    let window_start = window_end - Duration::hours(WINDOW_HOURS);

    let mut buckets = std::collections::BTreeMap::new();
    for snapshot in snapshots {
        if snapshot.at < window_start || snapshot.at > window_end {
            continue;
        }
        // Ascending input order makes plain insert last-write-wins.
        buckets.insert(truncate_to_hour(snapshot.at), snapshot.total_value);
    }

    let anchor0 = truncate_to_hour(window_start);
    (0..=WINDOW_HOURS)
        .filter_map(|hour| {
            let time = anchor0 + Duration::hours(hour);
            buckets
                .get(&time)
                .map(|&value| SeriesPoint { time, value })
        })
        .collect()
}
