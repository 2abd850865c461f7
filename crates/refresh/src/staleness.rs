//! When a cached reading is due for a new fetch.

use chrono::{DateTime, Duration, Utc};
use common::config::DEFAULT_FRESHNESS_WINDOW_SECS;
use common::TrackedLocation;

pub fn default_freshness_window() -> Duration {
    Duration::seconds(DEFAULT_FRESHNESS_WINDOW_SECS as i64)
}

/// A location with no reading always needs a fetch; otherwise it needs one
/// once `freshness_window` has fully elapsed since `last_updated`. A
/// timestamp in the future counts as fresh.
pub fn needs_refresh(
    reading: Option<f64>,
    last_updated: DateTime<Utc>,
    now: DateTime<Utc>,
    freshness_window: Duration,
) -> bool {
    if reading.is_none() {
        return true;
    }
    now - last_updated >= freshness_window
}

pub fn location_needs_refresh(
    location: &TrackedLocation,
    now: DateTime<Utc>,
    freshness_window: Duration,
) -> bool {
    needs_refresh(
        location.reading(),
        location.last_updated(),
        now,
        freshness_window,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::never_updated;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-02-13T12:00:00Z")
            .expect("valid now")
            .with_timezone(&Utc)
    }

    #[test]
    fn test_absent_reading_always_needs_refresh() {
        let window = default_freshness_window();
        assert!(needs_refresh(None, never_updated(), now(), window));
        assert!(needs_refresh(None, now(), now(), window));
        assert!(needs_refresh(None, now() + Duration::hours(1), now(), window));
    }

    #[test]
    fn test_recent_reading_is_fresh() {
        let last = now() - Duration::minutes(14) - Duration::seconds(59);
        assert!(!needs_refresh(Some(10.0), last, now(), default_freshness_window()));
    }

    #[test]
    fn test_window_edge_is_stale() {
        let last = now() - Duration::minutes(15);
        assert!(needs_refresh(Some(10.0), last, now(), default_freshness_window()));
    }

    #[test]
    fn test_old_reading_is_stale() {
        assert!(needs_refresh(
            Some(-2.0),
            now() - Duration::hours(6),
            now(),
            default_freshness_window()
        ));
    }

    #[test]
    fn test_zero_reading_counts_as_present() {
        assert!(!needs_refresh(Some(0.0), now(), now(), default_freshness_window()));
    }

    #[test]
    fn test_future_timestamp_is_fresh() {
        let last = now() + Duration::minutes(30);
        assert!(!needs_refresh(Some(5.0), last, now(), default_freshness_window()));
    }

    #[test]
    fn test_zero_window_always_refreshes() {
        assert!(needs_refresh(Some(5.0), now(), now(), Duration::zero()));
    }
}
