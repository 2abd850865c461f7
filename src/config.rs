//! Configuration loader: defaults, config.toml, then environment overrides.

use common::config::AppConfig;
use common::Error;
use std::path::Path;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Upper bound for refresh periods: one year.
const MAX_PERIOD_SECS: u64 = 365 * 24 * 60 * 60;

fn parse_positive_u64(raw: &str, env_name: &str) -> Result<u64, Error> {
    let parsed = raw
        .trim()
        .parse::<u64>()
        .map_err(|_| Error::Config(format!("{env_name} must be an integer > 0")))?;
    if parsed == 0 {
        return Err(Error::Config(format!("{env_name} must be an integer > 0")));
    }
    Ok(parsed)
}

fn validate_config(config: &AppConfig) -> Result<(), Error> {
    let mut issues: Vec<String> = Vec::new();

    if config.database_path.trim().is_empty() {
        issues.push("database_path must not be empty".into());
    }
    if config.bootstrap_csv.trim().is_empty() {
        issues.push("bootstrap_csv must not be empty".into());
    }

    if config.refresh.freshness_window_secs == 0 {
        issues.push("refresh.freshness_window_secs must be > 0".into());
    } else if config.refresh.freshness_window_secs > MAX_PERIOD_SECS {
        issues.push(format!(
            "refresh.freshness_window_secs must be <= {MAX_PERIOD_SECS}"
        ));
    }
    if config.refresh.watch_interval_secs == 0 {
        issues.push("refresh.watch_interval_secs must be > 0".into());
    } else if config.refresh.watch_interval_secs > MAX_PERIOD_SECS {
        issues.push(format!("refresh.watch_interval_secs must be <= {MAX_PERIOD_SECS}"));
    }

    let base_url = config.fetch.base_url.trim();
    if base_url.is_empty() {
        issues.push("fetch.base_url must not be empty".into());
    } else if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        issues.push("fetch.base_url must start with http:// or https://".into());
    }
    if config.fetch.timeout_secs == 0 {
        issues.push("fetch.timeout_secs must be > 0".into());
    }

    if !(-90.0..=90.0).contains(&config.probe.latitude) {
        issues.push("probe.latitude must be in [-90,90]".into());
    }
    if !(-180.0..=180.0).contains(&config.probe.longitude) {
        issues.push("probe.longitude must be in [-180,180]".into());
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "Invalid config:\n - {}",
            issues.join("\n - ")
        )))
    }
}

/// Load configuration from defaults, an optional TOML file and the
/// environment, in increasing priority. An explicit `path` must exist.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Error> {
    // 1. Load .env file from the working directory or its parents.
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    // 2. Start with defaults.
    let mut config = AppConfig::default();

    // 3. Overlay the config file.
    let config_path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
    if config_path.exists() {
        let contents = std::fs::read_to_string(config_path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", config_path.display(), e))
        })?;
        config = toml::from_str(&contents).map_err(|e| {
            Error::Config(format!("Failed to parse {}: {}", config_path.display(), e))
        })?;
    } else if path.is_some() {
        return Err(Error::Config(format!(
            "Config file {} does not exist",
            config_path.display()
        )));
    }

    // 4. Override with environment variables (highest priority).
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;

    validate_config(&config)?;

    Ok(config)
}

fn apply_env_overrides(
    config: &mut AppConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), Error> {
    if let Some(path) = lookup("WEATHER_DB_PATH") {
        config.database_path = path;
    }
    if let Some(path) = lookup("WEATHER_BOOTSTRAP_CSV") {
        config.bootstrap_csv = path;
    }
    if let Some(raw) = lookup("WEATHER_FRESHNESS_WINDOW_SECS") {
        config.refresh.freshness_window_secs =
            parse_positive_u64(&raw, "WEATHER_FRESHNESS_WINDOW_SECS")?;
    }
    if let Some(raw) = lookup("WEATHER_WATCH_INTERVAL_SECS") {
        config.refresh.watch_interval_secs =
            parse_positive_u64(&raw, "WEATHER_WATCH_INTERVAL_SECS")?;
    }
    if let Some(raw) = lookup("WEATHER_FETCH_TIMEOUT_SECS") {
        config.fetch.timeout_secs = parse_positive_u64(&raw, "WEATHER_FETCH_TIMEOUT_SECS")?;
    }
    if let Some(url) = lookup("OPEN_METEO_BASE_URL") {
        config.fetch.base_url = url.trim().to_string();
    }
    Ok(())
}
