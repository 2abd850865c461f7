//! The seam between the refresh engine and the weather provider.

use async_trait::async_trait;

use crate::FetchError;

/// Anything that can produce a current temperature (°C) for a coordinate pair.
///
/// Implementations make at most one outbound call per invocation and must
/// turn every fault into a `FetchError` instead of panicking.
#[async_trait]
pub trait TemperatureSource: Send + Sync {
    async fn fetch_reading(&self, latitude: f64, longitude: f64) -> Result<f64, FetchError>;
}
