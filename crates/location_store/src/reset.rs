//! Rebuild the tracked set from the default templates.

use crate::{LocationStore, StoreResult};
use tracing::info;

/// Drop every tracked location and recreate one never-fetched location per
/// default template, in a single commit. Returns the new tracked count.
pub fn reset_to_defaults<S: LocationStore + ?Sized>(store: &mut S) -> StoreResult<usize> {
    let defaults = store.list_defaults()?;

    store.remove_all();
    for template in &defaults {
        store.insert(template);
    }
    store.commit()?;

    info!("Reset tracked locations to {} defaults", defaults.len());
    Ok(defaults.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryLocationStore;
    use chrono::Utc;
    use common::{Coordinates, DefaultLocation};

    #[test]
    fn test_reset_restores_defaults_without_readings() {
        let mut store = InMemoryLocationStore::new();
        for (name, lat, lon) in [("Oslo", 59.91, 10.75), ("Lima", -12.05, -77.04)] {
            let template =
                DefaultLocation::new(name, Coordinates::new(lat, lon).expect("coords"))
                    .expect("template");
            store.insert_default(template.clone());
            store.insert(&template);
        }
        store.commit().expect("seed");

        let mut oslo = store.list_all().expect("list").remove(0);
        oslo.record_reading(-4.0, Utc::now());
        store.update(&oslo);
        let lima = store.list_all().expect("list")[1].id();
        store.remove(lima);
        store.commit().expect("mutate");
        assert_eq!(store.list_all().expect("list").len(), 1);

        assert_eq!(reset_to_defaults(&mut store).expect("reset"), 2);

        let locations = store.list_all().expect("list");
        assert_eq!(locations.len(), 2);
        assert!(locations.iter().all(|loc| loc.is_never_fetched()));
        let names: Vec<&str> = locations.iter().map(|loc| loc.name()).collect();
        assert_eq!(names, vec!["Oslo", "Lima"]);
    }
}
