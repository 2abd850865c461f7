//! One refresh cycle: snapshot, refresh, commit.

use chrono::{DateTime, Utc};
use common::TemperatureSource;
use location_store::{LocationStore, PersistenceError};
use tracing::{error, info};

use crate::engine::RefreshEngine;

/// Summary of a finished refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshReport {
    /// Locations in the snapshot.
    pub total: usize,
    /// Fetches issued.
    pub attempted: usize,
    /// Locations whose reading changed and were committed.
    pub updated: usize,
    /// Fetches that failed.
    pub failed: usize,
    /// Whether a store transaction was written.
    pub committed: bool,
}

/// Run one refresh cycle over every location in `store`.
///
/// Changed locations are committed in a single transaction; when nothing
/// changed the store is not written at all. Only a store failure is returned
/// as an error, in which case nothing from this cycle is persisted.
pub async fn refresh_cycle<St, S>(
    store: &mut St,
    engine: &RefreshEngine<S>,
    now: DateTime<Utc>,
) -> Result<RefreshReport, PersistenceError>
where
    St: LocationStore + ?Sized,
    S: TemperatureSource,
{
    let snapshot = store.list_all()?;
    let total = snapshot.len();
    info!("Refreshing weather for {} locations", total);

    let outcome = engine.refresh_all(snapshot, now).await;
    let mut report = RefreshReport {
        total,
        attempted: outcome.attempted,
        updated: outcome.updated_count(),
        failed: outcome.failed,
        committed: false,
    };

    if report.updated == 0 {
        info!(
            "No new updates ({} attempted, {} failed)",
            report.attempted, report.failed
        );
        return Ok(report);
    }

    for location in outcome.changed_locations() {
        store.update(location);
    }
    if let Err(e) = store.commit() {
        store.rollback();
        error!("Failed to commit {} updated locations: {}", report.updated, e);
        return Err(e);
    }

    report.committed = true;
    info!(
        "Saved {} updates ({} attempted, {} failed)",
        report.updated, report.attempted, report.failed
    );
    Ok(report)
}
