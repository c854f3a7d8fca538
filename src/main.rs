//! Climate API - HTTP query service
//!
//! Serves temperature statistics, station names and observation history from
//! the `measurement` and `station` tables of a PostgreSQL database.
//!
//! Usage:
//!   cargo run --release                          # climate_api.toml or defaults
//!   cargo run --release -- --port 8080 --workers 8
//!   cargo run --release -- --reference-date 2017-08-23
//!
//! Environment:
//!   DATABASE_URL - PostgreSQL connection string (.env is honoured)
//!   RUST_LOG     - tracing filter, overrides --verbose

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use climate_api::config::{self, AppConfig};
use climate_api::db;
use climate_api::endpoint;
use climate_api::store::PgStore;
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "climate_api")]
#[command(about = "Read-only HTTP API over a station climate dataset")]
#[command(version)]
struct Cli {
    #[arg(short, long, help = "Configuration file [default: climate_api.toml if present]")]
    config: Option<PathBuf>,

    #[arg(long, help = "Listen address")]
    host: Option<String>,

    #[arg(short, long, help = "Listen port")]
    port: Option<u16>,

    #[arg(short, long, help = "Worker threads, one database connection each")]
    workers: Option<usize>,

    #[arg(long, help = "End of the /api/v1.0/tobs window (YYYY-MM-DD)")]
    reference_date: Option<NaiveDate>,

    #[arg(long, help = "Station listed by /api/v1.0/tobs")]
    station: Option<String>,

    #[arg(short, long, help = "Enable debug logging")]
    verbose: bool,
}

impl Cli {
    fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(workers) = self.workers {
            config.server.workers = workers;
        }
        if let Some(date) = self.reference_date {
            config.tobs.reference_date = Some(date);
        }
        if let Some(station) = &self.station {
            config.tobs.station = station.clone();
        }
    }
}

fn setup_logging(verbose: bool) {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("climate_api={}", log_level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_timer(fmt::time::uptime())
                .with_writer(std::io::stderr),
        )
        .init();

    debug!("Logging initialized at level: {}", log_level);
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let mut config = config::load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    cli.apply_overrides(&mut config);
    config.validate().context("Invalid configuration after command-line overrides")?;

    match config.tobs.reference_date {
        Some(date) => info!(station = %config.tobs.station, %date, "tobs window ends at configured reference date"),
        None => info!(station = %config.tobs.station, "tobs window ends at latest measurement date"),
    }

    let db_url = db::database_url()?;
    let stores = (0..config.server.workers)
        .map(|_| PgStore::connect(&db_url, &config.database.schema))
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to open database connections")?;
    info!(
        workers = stores.len(),
        schema = %config.database.schema,
        "database connections verified"
    );

    endpoint::start_endpoint_server(&config.server, config.tobs.clone(), stores)?;
    Ok(())
}
