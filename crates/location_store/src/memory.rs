//! In-memory location store for tests and dry runs.

use crate::{LocationStore, Mutation, PersistenceError, StoreResult};
use common::{DefaultLocation, LocationId, TrackedLocation};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default)]
struct State {
    locations: BTreeMap<LocationId, TrackedLocation>,
    defaults: Vec<DefaultLocation>,
    next_id: i64,
}

/// Location store kept entirely in memory, with the same staging semantics
/// as the SQLite store.
#[derive(Debug, Default)]
pub struct InMemoryLocationStore {
    state: State,
    pending: Vec<Mutation>,
    commits: usize,
    fail_next_commit: bool,
}

impl InMemoryLocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed committed locations directly (ids are kept as given).
    pub fn with_locations(locations: impl IntoIterator<Item = TrackedLocation>) -> Self {
        let mut store = Self::new();
        for location in locations {
            store.state.next_id = store.state.next_id.max(location.id().0);
            store.state.locations.insert(location.id(), location);
        }
        store
    }

    /// Number of successful commits that wrote at least one mutation.
    pub fn commit_count(&self) -> usize {
        self.commits
    }

    /// Make the next non-empty commit fail after applying part of the batch
    /// to a scratch copy.
    pub fn fail_next_commit(&mut self) {
        self.fail_next_commit = true;
    }
}

impl LocationStore for InMemoryLocationStore {
    fn list_all(&self) -> StoreResult<Vec<TrackedLocation>> {
        Ok(self.state.locations.values().cloned().collect())
    }

    fn list_defaults(&self) -> StoreResult<Vec<DefaultLocation>> {
        Ok(self.state.defaults.clone())
    }

    fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.state.locations.is_empty() && self.state.defaults.is_empty())
    }

    fn stage(&mut self, mutation: Mutation) {
        self.pending.push(mutation);
    }

    fn pending(&self) -> &[Mutation] {
        &self.pending
    }

    fn commit(&mut self) -> StoreResult<usize> {
        let batch = std::mem::take(&mut self.pending);
        if batch.is_empty() {
            return Ok(0);
        }

        let mut scratch = self.state.clone();
        for (applied, mutation) in batch.iter().enumerate() {
            // Fires at the midpoint, and on the only mutation of a one-item batch.
            if self.fail_next_commit && (applied + 1) * 2 > batch.len() {
                self.fail_next_commit = false;
                return Err(PersistenceError::CommitFailed(format!(
                    "injected failure after {applied} of {} mutations",
                    batch.len()
                )));
            }
            apply_mutation(&mut scratch, mutation)?;
        }

        self.state = scratch;
        self.commits += 1;
        Ok(batch.len())
    }

    fn rollback(&mut self) {
        self.pending.clear();
    }
}

fn apply_mutation(state: &mut State, mutation: &Mutation) -> StoreResult<()> {
    match mutation {
        Mutation::Insert(template) => {
            state.next_id += 1;
            let id = LocationId(state.next_id);
            state.locations.insert(
                id,
                TrackedLocation::new(id, template.name.clone(), template.coordinates),
            );
        }
        Mutation::InsertDefault(template) => state.defaults.push(template.clone()),
        Mutation::UpdateReading {
            id,
            reading,
            last_updated,
        } => {
            let current = state
                .locations
                .get(id)
                .ok_or(PersistenceError::NotFound(*id))?;
            let updated = TrackedLocation::from_parts(
                *id,
                current.name(),
                current.coordinates(),
                *reading,
                *last_updated,
            );
            updated.validate()?;
            state.locations.insert(*id, updated);
        }
        Mutation::Remove(id) => {
            state.locations.remove(id);
        }
        Mutation::RemoveAll => state.locations.clear(),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::Coordinates;

    fn template(name: &str) -> DefaultLocation {
        DefaultLocation::new(name, Coordinates::new(10.0, 20.0).expect("coords"))
            .expect("template")
    }

    #[test]
    fn test_reads_ignore_staged_mutations() {
        let mut store = InMemoryLocationStore::new();
        store.insert(&template("Paris"));

        assert!(store.list_all().expect("list").is_empty());
        assert_eq!(store.pending().len(), 1);

        store.commit().expect("commit");
        assert_eq!(store.list_all().expect("list").len(), 1);
        assert!(store.pending().is_empty());
    }

    #[test]
    fn test_failed_commit_applies_nothing() {
        let mut store = InMemoryLocationStore::new();
        store.insert(&template("Paris"));
        store.insert(&template("Rome"));
        store.commit().expect("seed commit");

        let now = Utc::now();
        for mut loc in store.list_all().expect("list") {
            loc.record_reading(21.0, now);
            store.update(&loc);
        }
        store.fail_next_commit();

        assert!(matches!(
            store.commit(),
            Err(PersistenceError::CommitFailed(_))
        ));
        assert!(store
            .list_all()
            .expect("list")
            .iter()
            .all(|loc| loc.is_never_fetched()));
        assert!(store.pending().is_empty());
        assert_eq!(store.commit_count(), 1);
    }

    #[test]
    fn test_injected_failure_fires_on_single_mutation_commit() {
        let mut store = InMemoryLocationStore::new();
        store.insert(&template("Paris"));
        store.commit().expect("seed commit");

        let mut paris = store.list_all().expect("list").remove(0);
        paris.record_reading(12.0, Utc::now());
        store.update(&paris);
        store.fail_next_commit();

        assert!(matches!(
            store.commit(),
            Err(PersistenceError::CommitFailed(_))
        ));
        assert!(store.list_all().expect("list")[0].is_never_fetched());

        // The injected failure is spent; the next commit goes through.
        store.update(&paris);
        assert_eq!(store.commit().expect("commit"), 1);
        assert_eq!(store.list_all().expect("list")[0].reading(), Some(12.0));
    }

    #[test]
    fn test_update_unknown_id_fails_whole_batch() {
        let mut store = InMemoryLocationStore::new();
        store.insert(&template("Paris"));
        store.commit().expect("seed commit");

        let mut paris = store.list_all().expect("list").remove(0);
        paris.record_reading(18.0, Utc::now());
        store.update(&paris);
        store.stage(Mutation::UpdateReading {
            id: LocationId(99),
            reading: Some(1.0),
            last_updated: Utc::now(),
        });

        assert!(matches!(
            store.commit(),
            Err(PersistenceError::NotFound(LocationId(99)))
        ));
        assert!(store.list_all().expect("list")[0].is_never_fetched());
    }

    #[test]
    fn test_empty_commit_is_not_a_write() {
        let mut store = InMemoryLocationStore::new();
        assert_eq!(store.commit().expect("commit"), 0);
        assert_eq!(store.commit_count(), 0);
    }
}
