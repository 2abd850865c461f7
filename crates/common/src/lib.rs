//! Shared types, config, and error definitions for the weather tracker.

pub mod config;
pub mod error;
pub mod source;
pub mod types;

pub use config::AppConfig;
pub use error::{Error, FetchError};
pub use source::TemperatureSource;
pub use types::*;
