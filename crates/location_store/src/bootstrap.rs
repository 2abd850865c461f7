//! One-time load of the default location set from CSV.

use crate::{LocationStore, PersistenceError};
use common::types::LocationValidationError;
use common::{Coordinates, DefaultLocation};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("failed to read bootstrap CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid bootstrap row {line}: {source}")]
    InvalidRow {
        line: u64,
        source: LocationValidationError,
    },

    #[error(transparent)]
    Store(#[from] PersistenceError),
}

/// One CSV row. The first column may also be headed `city`.
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(alias = "city")]
    name: String,
    latitude: f64,
    longitude: f64,
}

/// Parse `name,latitude,longitude` rows into default templates.
pub fn read_defaults_csv(path: impl AsRef<Path>) -> Result<Vec<DefaultLocation>, BootstrapError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut defaults = Vec::new();
    for record in reader.deserialize::<CsvRow>() {
        let row = record?;
        // Header is line 1.
        let line = defaults.len() as u64 + 2;
        let template = Coordinates::new(row.latitude, row.longitude)
            .and_then(|coordinates| DefaultLocation::new(row.name, coordinates))
            .map_err(|source| BootstrapError::InvalidRow { line, source })?;
        defaults.push(template);
    }
    Ok(defaults)
}

/// Populate an empty store from `csv_path`: one default template and one
/// tracked location per row, committed together. Returns the number of rows
/// loaded, or 0 if the store already had data (the CSV is not read then).
pub fn bootstrap_if_empty<S: LocationStore + ?Sized>(
    store: &mut S,
    csv_path: impl AsRef<Path>,
) -> Result<usize, BootstrapError> {
    if !store.is_empty()? {
        info!("Locations already loaded");
        return Ok(0);
    }

    let defaults = read_defaults_csv(csv_path.as_ref())?;
    for template in &defaults {
        store.insert_default(template.clone());
        store.insert(template);
    }
    if let Err(e) = store.commit() {
        store.rollback();
        return Err(e.into());
    }

    info!(
        "Loaded {} locations from {}",
        defaults.len(),
        csv_path.as_ref().display()
    );
    Ok(defaults.len())
}
