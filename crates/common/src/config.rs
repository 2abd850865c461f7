//! Tracker configuration types.

use crate::Error;
use serde::{Deserialize, Serialize};

/// Default age after which a reading is fetched again.
pub const DEFAULT_FRESHNESS_WINDOW_SECS: u64 = 15 * 60;

/// Top-level tracker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// CSV loaded once when the store is empty.
    #[serde(default = "default_bootstrap_csv")]
    pub bootstrap_csv: String,

    /// Refresh cycle parameters.
    #[serde(default)]
    pub refresh: RefreshConfig,

    /// Weather provider parameters.
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Coordinates used by the `probe` command.
    #[serde(default)]
    pub probe: ProbeConfig,
}

/// Refresh timing (all values in seconds).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Minimum age of a reading before it is fetched again.
    #[serde(default = "default_freshness_window")]
    pub freshness_window_secs: u64,

    /// Pause between cycles in `watch` mode.
    #[serde(default = "default_watch_interval")]
    pub watch_interval_secs: u64,
}

/// Open-Meteo client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Forecast endpoint; coordinates are appended as query parameters.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Wall-clock budget for one request.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    #[serde(default = "default_probe_lat")]
    pub latitude: f64,
    #[serde(default = "default_probe_lon")]
    pub longitude: f64,
}

// ── Defaults ──────────────────────────────────────────────────────────

fn default_database_path() -> String {
    "cities.db".into()
}
fn default_bootstrap_csv() -> String {
    "cities.csv".into()
}

fn default_freshness_window() -> u64 {
    DEFAULT_FRESHNESS_WINDOW_SECS
}
fn default_watch_interval() -> u64 {
    15 * 60
}

fn default_base_url() -> String {
    "https://api.open-meteo.com/v1/forecast".into()
}
fn default_timeout() -> u64 {
    10
}
fn default_user_agent() -> String {
    "weather-tracker/0.1".into()
}

fn default_probe_lat() -> f64 {
    55.7558
}
fn default_probe_lon() -> f64 {
    37.6173
}

impl RefreshConfig {
    /// The freshness window as a chrono duration. Fails instead of wrapping
    /// or panicking when the configured value is out of chrono's range.
    pub fn freshness_window(&self) -> Result<chrono::Duration, Error> {
        i64::try_from(self.freshness_window_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .ok_or_else(|| {
                Error::Config(format!(
                    "refresh.freshness_window_secs {} is out of range",
                    self.freshness_window_secs
                ))
            })
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            freshness_window_secs: default_freshness_window(),
            watch_interval_secs: default_watch_interval(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            latitude: default_probe_lat(),
            longitude: default_probe_lon(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            bootstrap_csv: default_bootstrap_csv(),
            refresh: RefreshConfig::default(),
            fetch: FetchConfig::default(),
            probe: ProbeConfig::default(),
        }
    }
}
