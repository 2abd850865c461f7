//! Open-Meteo current weather client.
//!
//! One GET per call against the forecast endpoint with
//! `current_weather=true`; the reading is `current_weather.temperature` (°C).
//! Every failure is folded into `FetchError` so a bad provider response can
//! never take down a refresh cycle.

use async_trait::async_trait;
use common::config::FetchConfig;
use common::{Error, FetchError, TemperatureSource};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Async Open-Meteo client with a per-request timeout.
#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

/// Response body of the forecast endpoint (only the fields we read).
#[derive(Debug, Deserialize)]
pub struct ForecastResponse {
    #[serde(default)]
    pub current_weather: Option<CurrentWeather>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CurrentWeather {
    #[serde(default)]
    pub temperature: Option<f64>,
}

/// Raw outcome of a diagnostic request.
#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub status: u16,
    pub payload: serde_json::Value,
    pub temperature: Option<f64>,
}

impl OpenMeteoClient {
    pub fn new(cfg: &FetchConfig) -> Result<Self, Error> {
        Self::with_timeout(
            &cfg.base_url,
            &cfg.user_agent,
            Duration::from_secs(cfg.timeout_secs),
        )
    }

    pub fn with_timeout(base_url: &str, user_agent: &str, timeout: Duration) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .pool_max_idle_per_host(4)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(format!("failed to build Open-Meteo HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            timeout,
        })
    }

    fn query(lat: f64, lon: f64) -> [(&'static str, String); 3] {
        [
            ("latitude", lat.to_string()),
            ("longitude", lon.to_string()),
            ("current_weather", "true".to_string()),
        ]
    }

    fn map_transport(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            FetchError::Transport(err.to_string())
        }
    }

    /// Fetch the current temperature for a coordinate pair.
    pub async fn fetch_current(&self, lat: f64, lon: f64) -> Result<f64, FetchError> {
        debug!("Fetching Open-Meteo current weather: {} lat={} lon={}", self.base_url, lat, lon);

        let resp = self
            .client
            .get(&self.base_url)
            .query(&Self::query(lat, lon))
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;

        let status = resp.status().as_u16();
        if status != 200 {
            return Err(FetchError::Status { status });
        }

        let body = resp.bytes().await.map_err(|e| self.map_transport(e))?;
        let payload: ForecastResponse = serde_json::from_slice(&body)
            .map_err(|e| FetchError::Payload(format!("JSON parse error: {e}")))?;

        extract_temperature(&payload)
    }

    /// Diagnostic request: returns whatever the provider sent, even on a
    /// non-200 status.
    pub async fn probe(&self, lat: f64, lon: f64) -> Result<ProbeReport, FetchError> {
        let resp = self
            .client
            .get(&self.base_url)
            .query(&Self::query(lat, lon))
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;

        let status = resp.status().as_u16();
        let body = resp.bytes().await.map_err(|e| self.map_transport(e))?;
        let payload: serde_json::Value = serde_json::from_slice(&body)
            .map_err(|e| FetchError::Payload(format!("JSON parse error: {e}")))?;

        let temperature = payload
            .get("current_weather")
            .and_then(|cw| cw.get("temperature"))
            .and_then(|t| t.as_f64());

        Ok(ProbeReport {
            status,
            payload,
            temperature,
        })
    }
}

#[async_trait]
impl TemperatureSource for OpenMeteoClient {
    async fn fetch_reading(&self, latitude: f64, longitude: f64) -> Result<f64, FetchError> {
        self.fetch_current(latitude, longitude).await
    }
}

fn extract_temperature(payload: &ForecastResponse) -> Result<f64, FetchError> {
    let current = payload
        .current_weather
        .as_ref()
        .ok_or_else(|| FetchError::Payload("missing current_weather".into()))?;
    let temperature = current
        .temperature
        .ok_or_else(|| FetchError::Payload("missing current_weather.temperature".into()))?;

    if !temperature.is_finite() {
        return Err(FetchError::Payload(format!(
            "temperature {temperature} is not finite"
        )));
    }
    Ok(temperature)
}
