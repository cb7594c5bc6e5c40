// Meterfit Server - HTTP front end for manually read meters
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # Meterfit Server
//!
//! Accepts manual meter readings over HTTP, writes hourly statistics and
//! exports current-value estimates to Prometheus.
//!
//! ## Usage
//!
//! ```bash
//! # Meters from a config file, state and statistics on disk
//! meterfit-server --config meters.json --state-dir state --statistics-dir stats
//!
//! # Submit a reading
//! curl -X POST localhost:9100/meters/sensor.water_m3/readings \
//!      -H 'Content-Type: application/json' \
//!      -d '{"value": 1042.5, "timestamp": "2024-03-01 08"}'
//! ```

mod api;
mod csv_sink;
mod metrics;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use meterfit_tracker::{
    JsonFileStore, MemorySink, MemoryStore, MeterStore, SinkError, StatisticsSink, StoreError,
    Tracker, TrackerConfig, TrackerError,
};
use tokio::net::TcpListener;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

use api::AppState;
use csv_sink::CsvStatisticsSink;

/// Meterfit HTTP server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "9100")]
    port: u16,

    /// Tracker configuration (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for per-meter state; kept in memory when absent
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Directory for CSV statistics; kept in memory when absent
    #[arg(long)]
    statistics_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Startup errors.
#[derive(Debug, thiserror::Error)]
enum ServerError {
    #[error("Tracker error: {0}")]
    Tracker(#[from] TrackerError),

    #[error("State store error: {0}")]
    Store(#[from] StoreError),

    #[error("Statistics sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn build_tracker(args: &Args) -> Result<Tracker, ServerError> {
    let config = match args.config.as_deref() {
        Some(path) => {
            info!("Loading meters from {}", path.display());
            TrackerConfig::load_from_file(path)?
        }
        None => {
            warn!("No configuration given, starting without meters");
            TrackerConfig::default()
        }
    };

    let store: Arc<dyn MeterStore> = match &args.state_dir {
        Some(dir) => Arc::new(JsonFileStore::new(dir)?),
        None => Arc::new(MemoryStore::new()),
    };
    let sink: Arc<dyn StatisticsSink> = match &args.statistics_dir {
        Some(dir) => Arc::new(CsvStatisticsSink::new(dir)?),
        None => Arc::new(MemorySink::new()),
    };

    Ok(Tracker::with_config(config, sink, store)?)
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    let args = Args::parse();

    // Initialize tracing; `log` records from the tracker are bridged
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::from_default_env().add_directive(parse_level(&args.log_level).into())
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Meterfit Server v{}", env!("CARGO_PKG_VERSION"));

    let tracker = build_tracker(&args)?;
    info!("Tracking {} meter(s): {:?}", tracker.meter_count(), tracker.meter_ids());

    let app = api::router(Arc::new(AppState::new(tracker)));

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    info!("Starting server on http://{}", addr);
    info!("Metrics endpoint: http://{}/metrics", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("DEBUG"), Level::DEBUG);
        assert_eq!(parse_level("warn"), Level::WARN);
        assert_eq!(parse_level("verbose"), Level::INFO);
    }

    #[test]
    fn test_args() {
        let args = Args::parse_from([
            "meterfit-server",
            "--port",
            "8080",
            "--state-dir",
            "/tmp/state",
        ]);
        assert_eq!(args.port, 8080);
        assert_eq!(args.state_dir, Some(PathBuf::from("/tmp/state")));
        assert!(args.statistics_dir.is_none());
        assert_eq!(args.log_level, "info");
    }

    #[test]
    fn test_build_tracker_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("meters.json");
        std::fs::write(
            &config,
            r#"{"meters": [{"name": "Water", "unit": "m3", "device_class": "water"}]}"#,
        )
        .unwrap();

        let args = Args::parse_from([
            "meterfit-server".into(),
            "--config".into(),
            config.into_os_string(),
            "--state-dir".into(),
            dir.path().join("state").into_os_string(),
            "--statistics-dir".into(),
            dir.path().join("stats").into_os_string(),
        ]);
        let tracker = build_tracker(&args).unwrap();
        assert_eq!(tracker.meter_ids(), vec!["water_m3"]);

        tracker
            .ingest(&meterfit_tracker::ReadingRequest::new("water_m3", 1.0, "2024-03-01 00"))
            .unwrap();
        assert!(dir.path().join("state/water_m3.json").exists());
        assert!(dir
            .path()
            .join("stats/water_m3_statistics_linear.csv")
            .exists());
    }

    #[test]
    fn test_missing_config_is_error() {
        let args = Args::parse_from(["meterfit-server", "--config", "/nonexistent/meters.json"]);
        assert!(matches!(
            build_tracker(&args),
            Err(ServerError::Tracker(TrackerError::InvalidConfig(_)))
        ));
    }
}
