use async_trait::async_trait;
use common::{FetchError, TemperatureSource};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Scripted temperature source that records how it was called.
#[derive(Debug, Default)]
pub(crate) struct StubSource {
    value: f64,
    failing_latitudes: Vec<f64>,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    seen: Mutex<Vec<(f64, f64)>>,
}

impl StubSource {
    pub(crate) fn returning(value: f64) -> Self {
        Self {
            value,
            ..Self::default()
        }
    }

    pub(crate) fn failing_for(mut self, latitudes: &[f64]) -> Self {
        self.failing_latitudes = latitudes.to_vec();
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn seen(&self) -> Vec<(f64, f64)> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TemperatureSource for StubSource {
    async fn fetch_reading(&self, latitude: f64, longitude: f64) -> Result<f64, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.seen.lock() {
            seen.push((latitude, longitude));
        }

        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing_latitudes.contains(&latitude) {
            Err(FetchError::Status { status: 500 })
        } else {
            Ok(self.value)
        }
    }
}
