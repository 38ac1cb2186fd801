//! CLI entry point for the GTFS-RT loader.
//!
//! Provides subcommands for polling an agency's realtime feeds into a
//! database and for printing the stored vehicle positions.

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use gtfsrt_loader::{
    fetch::{BasicClient, UrlParam},
    ingest::Ingestor,
    poll::{self, FeedEndpoints, PollConfig},
    projection,
    store::SqliteStore,
};
use std::ffi::OsStr;
use std::path::Path;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "gtfsrt_loader")]
#[command(about = "Loads GTFS-RT feeds into a database on a polling schedule", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll one or more GTFS-RT feeds for an agency and store each snapshot
    Load {
        /// Agency identifier that scopes all stored rows
        #[arg(short, long)]
        agency_id: String,

        /// SQLite database file to load into
        #[arg(long, default_value = "gtfsrt.db")]
        db: String,

        /// Service alerts feed URL
        #[arg(long)]
        alerts_url: Option<String>,

        /// Trip updates feed URL
        #[arg(long)]
        trips_url: Option<String>,

        /// Vehicle positions feed URL
        #[arg(long)]
        vehicles_url: Option<String>,

        /// API key appended to each feed URL as the appId query parameter
        #[arg(long, env = "GTFS_RT_API_KEY")]
        api_key: Option<String>,

        /// Seconds to sleep between polling iterations; omit for a single pass
        #[arg(short, long)]
        interval: Option<u64>,

        /// Total seconds to keep polling; omit to poll until interrupted
        #[arg(short, long)]
        duration: Option<u64>,

        /// Keep previously stored rows instead of clearing before each load
        #[arg(long, default_value_t = false)]
        no_clear: bool,
    },
    /// Print stored vehicle positions for an agency as JSON
    Vehicles {
        /// Agency identifier to read
        #[arg(short, long)]
        agency_id: String,

        /// SQLite database file to read from
        #[arg(long, default_value = "gtfsrt.db")]
        db: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/gtfsrt_loader.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("gtfsrt_loader.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Load {
            agency_id,
            db,
            alerts_url,
            trips_url,
            vehicles_url,
            api_key,
            interval,
            duration,
            no_clear,
        } => {
            // the outer session for the whole run; failing to open it is the
            // one fatal condition
            let mut store = SqliteStore::open(&db)?;

            let endpoints = FeedEndpoints {
                alerts: alerts_url,
                trips: trips_url,
                vehicles: vehicles_url,
            };
            if endpoints.is_empty() {
                warn!("no feed urls configured; the loop will run but do no work");
            }

            let config = PollConfig {
                interval,
                duration,
                clear_first: !no_clear,
            };

            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("interrupt received, stopping after the current iteration");
                    let _ = shutdown_tx.send(true);
                }
            });

            info!(agency_id = %agency_id, db = %db, "loading gtfs-rt feeds");
            let ok = match api_key {
                Some(key) => {
                    let client = UrlParam {
                        inner: BasicClient::new(),
                        param_name: "appId".to_string(),
                        key,
                    };
                    poll::run(
                        &Ingestor::new(client),
                        &mut store,
                        &agency_id,
                        &endpoints,
                        &config,
                        shutdown_rx,
                    )
                    .await
                }
                None => {
                    poll::run(
                        &Ingestor::new(BasicClient::new()),
                        &mut store,
                        &agency_id,
                        &endpoints,
                        &config,
                        shutdown_rx,
                    )
                    .await
                }
            };

            if ok {
                info!(agency_id = %agency_id, "all feeds loaded cleanly");
            } else {
                warn!(agency_id = %agency_id, "one or more feed loads failed");
                std::process::exit(1);
            }
        }
        Commands::Vehicles { agency_id, db } => {
            let store = SqliteStore::open(&db)?;
            let rows = store.vehicles(&agency_id)?;
            let records = projection::vehicle_records(&agency_id, &rows, Utc::now());
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
    }

    Ok(())
}
