//! Weather-tracker: keeps a cached temperature for a set of cities.
//!
//! Single-binary Tokio application that:
//! 1. Loads the default cities from CSV into an empty store
//! 2. Lists, removes and resets tracked cities
//! 3. Refreshes stale temperatures from Open-Meteo, concurrently
//! 4. Optionally repeats the refresh on an interval until Ctrl+C

mod config;

use std::cmp::Ordering;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use common::{AppConfig, LocationId, TrackedLocation};
use location_store::{
    bootstrap_if_empty, reset_to_defaults, InMemoryLocationStore, LocationStore,
    SqliteLocationStore,
};
use open_meteo_client::OpenMeteoClient;
use refresh::{refresh_cycle, RefreshEngine};

/// City temperature tracker
#[derive(Parser)]
#[command(name = "weather-tracker", about = "Cached city temperatures from Open-Meteo")]
struct Cli {
    /// Path to a TOML config file (default: ./config.toml if present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use a throwaway in-memory store instead of the database file.
    #[arg(long, global = true)]
    in_memory: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show tracked cities, warmest first.
    List,
    /// Run one refresh cycle and report how many cities were updated.
    Refresh,
    /// Refresh on an interval until Ctrl+C.
    Watch,
    /// Stop tracking a city.
    Remove {
        /// Id shown by `list`.
        id: i64,
    },
    /// Replace the tracked cities with the defaults loaded at bootstrap.
    Reset,
    /// Fetch the raw provider payload for one coordinate pair.
    Probe {
        #[arg(long, allow_negative_numbers = true)]
        lat: Option<f64>,
        #[arg(long, allow_negative_numbers = true)]
        lon: Option<f64>,
    },
}

type Store = Box<dyn LocationStore>;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "weather_tracker=info,refresh=info,open_meteo_client=info,location_store=info"
                    .into()
            }),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();

    let cfg = config::load_config(cli.config.as_deref()).context("configuration error")?;
    info!(
        "Store: {}, freshness window: {}s, fetch timeout: {}s",
        if cli.in_memory { "in-memory" } else { cfg.database_path.as_str() },
        cfg.refresh.freshness_window_secs,
        cfg.fetch.timeout_secs,
    );

    let mut store = open_store(&cfg, cli.in_memory)?;
    bootstrap_if_empty(store.as_mut(), &cfg.bootstrap_csv)
        .with_context(|| format!("failed to bootstrap from {}", cfg.bootstrap_csv))?;

    match cli.command {
        Command::List => {
            let locations = store.list_all().context("failed to list locations")?;
            print_locations(sorted_for_display(locations));
        }
        Command::Refresh => {
            let engine = build_engine(&cfg)?;
            let report = refresh_cycle(store.as_mut(), &engine, Utc::now())
                .await
                .context("refresh cycle failed")?;
            println!(
                "Updated {} of {} cities ({} fetched, {} failed)",
                report.updated, report.total, report.attempted, report.failed
            );
        }
        Command::Watch => {
            let engine = build_engine(&cfg)?;
            run_watch(store.as_mut(), &engine, &cfg).await;
        }
        Command::Remove { id } => remove_location(store.as_mut(), LocationId(id))?,
        Command::Reset => {
            let count = reset_to_defaults(store.as_mut()).context("reset failed")?;
            println!("Reset to {} default cities", count);
        }
        Command::Probe { lat, lon } => {
            let client = OpenMeteoClient::new(&cfg.fetch)?;
            let lat = lat.unwrap_or(cfg.probe.latitude);
            let lon = lon.unwrap_or(cfg.probe.longitude);
            match client.probe(lat, lon).await {
                Ok(report) => {
                    println!("status: {}", report.status);
                    println!("temperature: {:?}", report.temperature);
                    println!("{}", serde_json::to_string_pretty(&report.payload)?);
                }
                Err(e) => {
                    error!("Probe failed for ({lat},{lon}): {}", e);
                    anyhow::bail!("probe failed: {e}");
                }
            }
        }
    }

    Ok(())
}

fn open_store(cfg: &AppConfig, in_memory: bool) -> Result<Store> {
    if in_memory {
        return Ok(Box::new(InMemoryLocationStore::new()));
    }
    let store = SqliteLocationStore::open(&cfg.database_path)
        .with_context(|| format!("failed to open database {}", cfg.database_path))?;
    Ok(Box::new(store))
}

fn build_engine(cfg: &AppConfig) -> Result<RefreshEngine<OpenMeteoClient>> {
    let client = OpenMeteoClient::new(&cfg.fetch)?;
    let window = cfg.refresh.freshness_window()?;
    Ok(RefreshEngine::new(client, window))
}

fn remove_location(store: &mut dyn LocationStore, id: LocationId) -> Result<()> {
    let exists = store.list_all()?.iter().any(|loc| loc.id() == id);
    if !exists {
        warn!("No tracked city with id {}", id);
        return Ok(());
    }

    store.remove(id);
    store.commit().context("failed to remove city")?;
    println!("Removed city {}", id);
    Ok(())
}

async fn run_watch(
    store: &mut dyn LocationStore,
    engine: &RefreshEngine<OpenMeteoClient>,
    cfg: &AppConfig,
) {
    let mut interval =
        tokio::time::interval(Duration::from_secs(cfg.refresh.watch_interval_secs));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(
        "Watching; refresh every {}s. Press Ctrl+C to stop.",
        cfg.refresh.watch_interval_secs
    );

    let mut cycle_id: u64 = 0;
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
            _ = interval.tick() => {
                cycle_id = cycle_id.saturating_add(1);
                // A started cycle always runs to completion.
                match refresh_cycle(&mut *store, engine, Utc::now()).await {
                    Ok(report) => info!(
                        "Cycle {}: updated={} fetched={} failed={} total={}",
                        cycle_id, report.updated, report.attempted, report.failed, report.total
                    ),
                    Err(e) => error!("Cycle {} failed to persist: {}", cycle_id, e),
                }
            }
        }
    }
}

/// Warmest first; never-fetched cities last, in id order.
fn sorted_for_display(mut locations: Vec<TrackedLocation>) -> Vec<TrackedLocation> {
    locations.sort_by(|a, b| match (a.reading(), b.reading()) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.id().cmp(&b.id()),
    });
    locations
}

fn print_locations(locations: Vec<TrackedLocation>) {
    if locations.is_empty() {
        println!("No tracked cities");
        return;
    }

    let now = Utc::now();
    println!("{:>5}  {:<24} {:>9} {:>10}  {}", "id", "city", "lat", "lon", "temperature");
    for loc in &locations {
        let reading = match loc.reading() {
            Some(t) => {
                let age_min = (now - loc.last_updated()).num_seconds() as f64 / 60.0;
                format!("{t:.1}°C ({age_min:.0} min ago)")
            }
            None => "n/a".to_string(),
        };
        println!(
            "{:>5}  {:<24} {:>9.4} {:>10.4}  {}",
            loc.id(),
            loc.name(),
            loc.coordinates().latitude(),
            loc.coordinates().longitude(),
            reading
        );
    }
}
