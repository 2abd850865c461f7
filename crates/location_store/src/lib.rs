//! Persistence for tracked locations and their default templates.
//!
//! Stores stage every mutation and apply the whole batch on `commit`, so
//! readers see either all of a refresh cycle's writes or none of them.

pub mod bootstrap;
pub mod memory;
pub mod migrations;
pub mod reset;
pub mod sqlite;

use chrono::{DateTime, Utc};
use common::types::LocationValidationError;
use common::{DefaultLocation, LocationId, TrackedLocation};
use thiserror::Error;

pub use bootstrap::{bootstrap_if_empty, read_defaults_csv, BootstrapError};
pub use memory::InMemoryLocationStore;
pub use reset::reset_to_defaults;
pub use sqlite::SqliteLocationStore;

pub type StoreResult<T> = Result<T, PersistenceError>;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("database schema version {db_version} is newer than supported {latest_supported}")]
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },

    #[error("location not found: {0}")]
    NotFound(LocationId),

    #[error("invalid persisted location data: {0}")]
    InvalidData(String),

    #[error("commit failed: {0}")]
    CommitFailed(String),
}

impl From<LocationValidationError> for PersistenceError {
    fn from(value: LocationValidationError) -> Self {
        Self::InvalidData(value.to_string())
    }
}

/// A write waiting for the next `commit`.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Insert(DefaultLocation),
    InsertDefault(DefaultLocation),
    UpdateReading {
        id: LocationId,
        reading: Option<f64>,
        last_updated: DateTime<Utc>,
    },
    Remove(LocationId),
    RemoveAll,
}

/// Repository over tracked and default locations.
///
/// Reads always reflect committed state. Mutations are staged and become
/// durable together on `commit`; a failed commit applies none of them and
/// clears the stage.
pub trait LocationStore {
    fn list_all(&self) -> StoreResult<Vec<TrackedLocation>>;
    fn list_defaults(&self) -> StoreResult<Vec<DefaultLocation>>;

    /// True when there are neither tracked nor default locations.
    fn is_empty(&self) -> StoreResult<bool>;

    fn stage(&mut self, mutation: Mutation);
    fn pending(&self) -> &[Mutation];

    /// Apply every staged mutation atomically. Returns how many were applied.
    fn commit(&mut self) -> StoreResult<usize>;
    fn rollback(&mut self);

    /// Track a new, never-fetched location built from `template`.
    fn insert(&mut self, template: &DefaultLocation) {
        self.stage(Mutation::Insert(template.clone()));
    }

    fn insert_default(&mut self, template: DefaultLocation) {
        self.stage(Mutation::InsertDefault(template));
    }

    /// Persist the reading pair of `location`. Name and coordinates are
    /// never rewritten.
    fn update(&mut self, location: &TrackedLocation) {
        self.stage(Mutation::UpdateReading {
            id: location.id(),
            reading: location.reading(),
            last_updated: location.last_updated(),
        });
    }

    fn remove(&mut self, id: LocationId) {
        self.stage(Mutation::Remove(id));
    }

    fn remove_all(&mut self) {
        self.stage(Mutation::RemoveAll);
    }
}
