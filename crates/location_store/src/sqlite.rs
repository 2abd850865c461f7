//! SQLite-backed location store.

use crate::migrations::apply_migrations;
use crate::{LocationStore, Mutation, PersistenceError, StoreResult};
use chrono::{DateTime, Utc};
use common::{never_updated, Coordinates, DefaultLocation, LocationId, TrackedLocation};
use rusqlite::{params, Connection, Transaction};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

const LOCATION_SELECT_SQL: &str = "SELECT
    id,
    name,
    latitude,
    longitude,
    temperature,
    updated_at
FROM locations
ORDER BY id";

const DEFAULT_SELECT_SQL: &str = "SELECT
    name,
    latitude,
    longitude
FROM default_locations
ORDER BY id";

type LocationRow = (i64, String, f64, f64, Option<f64>, i64);

/// Location store over a single SQLite connection.
pub struct SqliteLocationStore {
    conn: Connection,
    pending: Vec<Mutation>,
}

impl SqliteLocationStore {
    /// Open (or create) a database file and apply pending migrations.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let started_at = Instant::now();
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| {
            error!("Failed to open database {}: {}", path.display(), e);
            PersistenceError::from(e)
        })?;
        let store = Self::bootstrap(conn)?;
        info!(
            "Opened location store {} in {}ms",
            path.display(),
            started_at.elapsed().as_millis()
        );
        Ok(store)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::bootstrap(Connection::open_in_memory()?)
    }

    fn bootstrap(mut conn: Connection) -> StoreResult<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        apply_migrations(&mut conn)?;
        Ok(Self {
            conn,
            pending: Vec::new(),
        })
    }

    /// Borrow the underlying connection (schema checks in tests).
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl LocationStore for SqliteLocationStore {
    fn list_all(&self) -> StoreResult<Vec<TrackedLocation>> {
        let mut stmt = self.conn.prepare(LOCATION_SELECT_SQL)?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
            ))
        })?;

        let mut locations = Vec::new();
        for row in rows {
            locations.push(location_from_row(row?)?);
        }
        Ok(locations)
    }

    fn list_defaults(&self) -> StoreResult<Vec<DefaultLocation>> {
        let mut stmt = self.conn.prepare(DEFAULT_SELECT_SQL)?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, f64>(2)?,
            ))
        })?;

        let mut defaults = Vec::new();
        for row in rows {
            let (name, lat, lon) = row?;
            defaults.push(DefaultLocation::new(name, Coordinates::new(lat, lon)?)?);
        }
        Ok(defaults)
    }

    fn is_empty(&self) -> StoreResult<bool> {
        let total: i64 = self.conn.query_row(
            "SELECT (SELECT COUNT(*) FROM locations) + (SELECT COUNT(*) FROM default_locations);",
            [],
            |row| row.get(0),
        )?;
        Ok(total == 0)
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

        // Dropping `tx` on an early return rolls the whole batch back.
        let tx = self.conn.transaction()?;
        for mutation in &batch {
            apply_mutation(&tx, mutation)?;
        }
        tx.commit()?;

        debug!("Committed {} staged mutations", batch.len());
        Ok(batch.len())
    }

    fn rollback(&mut self) {
        self.pending.clear();
    }
}

fn apply_mutation(tx: &Transaction<'_>, mutation: &Mutation) -> StoreResult<()> {
    match mutation {
        Mutation::Insert(template) => {
            tx.execute(
                "INSERT INTO locations (name, latitude, longitude, temperature, updated_at)
                 VALUES (?1, ?2, ?3, NULL, ?4);",
                params![
                    template.name,
                    template.coordinates.latitude(),
                    template.coordinates.longitude(),
                    never_updated().timestamp_millis(),
                ],
            )?;
        }
        Mutation::InsertDefault(template) => {
            tx.execute(
                "INSERT INTO default_locations (name, latitude, longitude) VALUES (?1, ?2, ?3);",
                params![
                    template.name,
                    template.coordinates.latitude(),
                    template.coordinates.longitude(),
                ],
            )?;
        }
        Mutation::UpdateReading {
            id,
            reading,
            last_updated,
        } => {
            let changed = tx.execute(
                "UPDATE locations SET temperature = ?1, updated_at = ?2 WHERE id = ?3;",
                params![reading, last_updated.timestamp_millis(), id.0],
            )?;
            if changed == 0 {
                return Err(PersistenceError::NotFound(*id));
            }
        }
        Mutation::Remove(id) => {
            tx.execute("DELETE FROM locations WHERE id = ?1;", params![id.0])?;
        }
        Mutation::RemoveAll => {
            tx.execute("DELETE FROM locations;", [])?;
        }
    }
    Ok(())
}

fn location_from_row(row: LocationRow) -> StoreResult<TrackedLocation> {
    let (id, name, lat, lon, temperature, updated_at_ms) = row;
    let coordinates = Coordinates::new(lat, lon)?;
    let last_updated: DateTime<Utc> = DateTime::from_timestamp_millis(updated_at_ms)
        .ok_or_else(|| {
            PersistenceError::InvalidData(format!(
                "location {id} has out-of-range updated_at {updated_at_ms}"
            ))
        })?;

    let location =
        TrackedLocation::from_parts(LocationId(id), name, coordinates, temperature, last_updated);
    location.validate()?;
    Ok(location)
}
