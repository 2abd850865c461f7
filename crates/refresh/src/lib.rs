//! Refresh engine crate.
//!
//! Decides which tracked locations are stale, fetches them concurrently and
//! commits the successful readings in one store transaction.

pub mod cycle;
pub mod engine;
pub mod staleness;

#[cfg(test)]
mod stub;

pub use cycle::{refresh_cycle, RefreshReport};
pub use engine::{RefreshEngine, RefreshOutcome};
pub use staleness::{default_freshness_window, location_needs_refresh, needs_refresh};
