//! Concurrent fan-out of temperature fetches over stale locations.

use chrono::{DateTime, Duration, Utc};
use common::{LocationId, TemperatureSource, TrackedLocation};
use futures_util::future::join_all;
use tracing::{debug, info, warn};

use crate::staleness::location_needs_refresh;

/// Result of one pass of [`RefreshEngine::refresh_all`].
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    /// Every input location, with successful readings applied.
    pub locations: Vec<TrackedLocation>,
    /// Locations whose reading/timestamp pair changed this pass.
    pub changed: Vec<LocationId>,
    /// Fetches issued.
    pub attempted: usize,
    /// Fetches that ended in a `FetchError`.
    pub failed: usize,
}

impl RefreshOutcome {
    fn untouched(locations: Vec<TrackedLocation>) -> Self {
        Self {
            locations,
            changed: Vec::new(),
            attempted: 0,
            failed: 0,
        }
    }

    pub fn updated_count(&self) -> usize {
        self.changed.len()
    }

    pub fn changed_locations(&self) -> impl Iterator<Item = &TrackedLocation> + '_ {
        self.locations
            .iter()
            .filter(move |loc| self.changed.contains(&loc.id()))
    }
}

/// Staleness filter plus concurrent fetcher.
///
/// Holds no entity state between calls; each call works on the snapshot it
/// is handed.
#[derive(Debug, Clone)]
pub struct RefreshEngine<S> {
    source: S,
    freshness_window: Duration,
}

impl<S: TemperatureSource> RefreshEngine<S> {
    pub fn new(source: S, freshness_window: Duration) -> Self {
        Self {
            source,
            freshness_window,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Fetch every stale location concurrently and apply the readings that
    /// came back. Returns once all fetches have resolved; fetch failures only
    /// affect their own location.
    pub async fn refresh_all(
        &self,
        locations: Vec<TrackedLocation>,
        now: DateTime<Utc>,
    ) -> RefreshOutcome {
        let stale: Vec<usize> = locations
            .iter()
            .enumerate()
            .filter(|(_, loc)| {
                let stale = location_needs_refresh(loc, now, self.freshness_window);
                if !stale {
                    let age = now - loc.last_updated();
                    debug!(
                        "Skipping {} (id={}), updated {:.1} min ago",
                        loc.name(),
                        loc.id(),
                        age.num_seconds() as f64 / 60.0
                    );
                }
                stale
            })
            .map(|(idx, _)| idx)
            .collect();

        if stale.is_empty() {
            return RefreshOutcome::untouched(locations);
        }

        info!(
            "Fetching {} of {} locations",
            stale.len(),
            locations.len()
        );

        // Each future owns a copy of its own coordinates; nothing is shared
        // between fetches except the source.
        let fetches = stale.iter().map(|&idx| {
            let coordinates = locations[idx].coordinates();
            async move {
                let result = self
                    .source
                    .fetch_reading(coordinates.latitude(), coordinates.longitude())
                    .await;
                (idx, result)
            }
        });
        let results = join_all(fetches).await;

        let attempted = results.len();
        let mut locations = locations;
        let mut changed = Vec::new();
        let mut failed = 0usize;

        for (idx, result) in results {
            let location = &mut locations[idx];
            match result {
                Ok(celsius) => {
                    let before = location.clone();
                    location.record_reading(celsius, now);
                    info!(
                        "Reading for {} (id={}): {:.1}°C",
                        location.name(),
                        location.id(),
                        celsius
                    );
                    if location.reading_differs(&before) {
                        changed.push(location.id());
                    }
                }
                Err(e) => {
                    failed += 1;
                    warn!(
                        "Failed to fetch reading for {} (id={}): {}",
                        location.name(),
                        location.id(),
                        e
                    );
                }
            }
        }

        RefreshOutcome {
            locations,
            changed,
            attempted,
            failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::staleness::default_freshness_window;
    use crate::stub::StubSource;
    use common::{never_updated, Coordinates};
    use std::time::Duration as StdDuration;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-02-13T12:00:00Z")
            .expect("valid now")
            .with_timezone(&Utc)
    }

    fn location(id: i64) -> TrackedLocation {
        let lat = id as f64;
        TrackedLocation::new(
            LocationId(id),
            format!("City {id}"),
            Coordinates::new(lat, -lat).expect("coords"),
        )
    }

    fn fetched(id: i64, reading: f64, age: Duration) -> TrackedLocation {
        let mut loc = location(id);
        loc.record_reading(reading, now() - age);
        loc
    }

    fn engine(stub: StubSource) -> RefreshEngine<StubSource> {
        RefreshEngine::new(stub, default_freshness_window())
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_calls() {
        let engine = engine(StubSource::returning(20.0));
        let outcome = engine.refresh_all(Vec::new(), now()).await;

        assert_eq!(outcome.updated_count(), 0);
        assert_eq!(outcome.attempted, 0);
        assert_eq!(engine.source().calls(), 0);
    }

    #[tokio::test]
    async fn test_all_fresh_makes_no_calls() {
        let engine = engine(StubSource::returning(20.0));
        let input = vec![
            fetched(1, 3.0, Duration::minutes(1)),
            fetched(2, 4.0, Duration::minutes(14)),
        ];
        let outcome = engine.refresh_all(input.clone(), now()).await;

        assert_eq!(outcome.updated_count(), 0);
        assert_eq!(engine.source().calls(), 0);
        assert_eq!(outcome.locations, input);
    }

    #[tokio::test]
    async fn test_all_stale_all_succeed() {
        let engine = engine(StubSource::returning(21.5));
        let input: Vec<TrackedLocation> = (1..=5).map(location).collect();
        let outcome = engine.refresh_all(input, now()).await;

        assert_eq!(outcome.updated_count(), 5);
        assert_eq!(outcome.attempted, 5);
        assert_eq!(outcome.failed, 0);
        for loc in &outcome.locations {
            assert_eq!(loc.reading(), Some(21.5));
            assert_eq!(loc.last_updated(), now());
            assert!(loc.last_updated() > never_updated());
        }
    }

    #[tokio::test]
    async fn test_failed_subset_is_left_untouched() {
        let stub = StubSource::returning(9.0).failing_for(&[2.0, 4.0]);
        let engine = engine(stub);
        let input = vec![
            location(1),
            fetched(2, -5.0, Duration::hours(2)),
            location(3),
            location(4),
        ];
        let outcome = engine.refresh_all(input.clone(), now()).await;

        assert_eq!(outcome.attempted, 4);
        assert_eq!(outcome.failed, 2);
        assert_eq!(outcome.updated_count(), 2);
        assert_eq!(outcome.changed, vec![LocationId(1), LocationId(3)]);
        assert_eq!(outcome.locations[1], input[1]);
        assert_eq!(outcome.locations[3], input[3]);
        assert_eq!(outcome.locations[0].reading(), Some(9.0));
        assert_eq!(outcome.locations[2].reading(), Some(9.0));
    }

    #[tokio::test]
    async fn test_all_fail_changes_nothing() {
        let engine = engine(StubSource::returning(1.0).failing_for(&[1.0, 2.0]));
        let input = vec![location(1), location(2)];
        let outcome = engine.refresh_all(input.clone(), now()).await;

        assert_eq!(outcome.updated_count(), 0);
        assert_eq!(outcome.failed, 2);
        assert_eq!(outcome.locations, input);
    }

    #[tokio::test]
    async fn test_only_stale_locations_are_fetched() {
        let engine = engine(StubSource::returning(30.0));
        let input = vec![
            fetched(1, 10.0, Duration::minutes(2)),
            fetched(2, 11.0, Duration::minutes(15)),
            location(3),
        ];
        let outcome = engine.refresh_all(input, now()).await;

        assert_eq!(engine.source().calls(), 2);
        let mut seen = engine.source().seen();
        seen.sort_by(|a, b| a.0.total_cmp(&b.0));
        assert_eq!(seen, vec![(2.0, -2.0), (3.0, -3.0)]);
        assert_eq!(outcome.locations[0].reading(), Some(10.0));
        assert_eq!(outcome.changed, vec![LocationId(2), LocationId(3)]);
    }

    #[tokio::test]
    async fn test_second_pass_with_same_now_is_a_no_op() {
        let engine = engine(StubSource::returning(12.0));
        let first = engine
            .refresh_all((1..=3).map(location).collect(), now())
            .await;
        assert_eq!(first.updated_count(), 3);

        let second = engine.refresh_all(first.locations.clone(), now()).await;
        assert_eq!(second.updated_count(), 0);
        assert_eq!(second.attempted, 0);
        assert_eq!(engine.source().calls(), 3);
    }

    #[tokio::test]
    async fn test_unchanged_pair_is_not_counted() {
        let engine = RefreshEngine::new(StubSource::returning(7.0), Duration::zero());
        let mut loc = location(1);
        loc.record_reading(7.0, now());

        let outcome = engine.refresh_all(vec![loc], now()).await;
        assert_eq!(outcome.attempted, 1);
        assert_eq!(outcome.updated_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetches_run_concurrently() {
        let stub = StubSource::returning(15.0).with_delay(StdDuration::from_millis(100));
        let engine = engine(stub);
        let input: Vec<TrackedLocation> = (1..=10).map(location).collect();

        let started = tokio::time::Instant::now();
        let outcome = engine.refresh_all(input, now()).await;
        let elapsed = started.elapsed();

        assert_eq!(outcome.updated_count(), 10);
        assert_eq!(engine.source().max_in_flight(), 10);
        assert!(
            elapsed < StdDuration::from_millis(200),
            "fetches were serialized: {elapsed:?}"
        );
    }

    #[tokio::test]
    async fn test_each_location_changed_at_most_once() {
        let engine = engine(StubSource::returning(5.0));
        let outcome = engine
            .refresh_all((1..=8).map(location).collect(), now())
            .await;

        let mut ids = outcome.changed.clone();
        ids.dedup();
        assert_eq!(ids.len(), outcome.changed.len());
        assert_eq!(engine.source().calls(), 8);
        assert_eq!(outcome.changed_locations().count(), 8);
    }
}
