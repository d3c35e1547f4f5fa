//! Simbridge CLI - command-line interface
//!
//! This binary provides a command-line interface to the simbridge library.

use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::error;

use simbridge::config::BridgeConfig;
use simbridge::error::ProviderError;
use simbridge::facility::{FacilityCategory, FacilityIndex};
use simbridge::host::{EventHost, TelemetryConsumer};
use simbridge::logging::{init_logging, LogOptions};
use simbridge::metadata;
use simbridge::provider::{BackendKind, RegistryBuilder, SyntheticLinkConfig};
use simbridge::snapshot::TelemetrySnapshot;

/// How long shutdown waits for backend loops to stop cooperatively.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "simbridge", version = simbridge::VERSION)]
#[command(about = "Normalized flight simulator telemetry bridge", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the bridge until interrupted, printing telemetry events.
    Run {
        /// Use the synthetic demo backend instead of real simulators.
        #[arg(long)]
        synthetic: bool,
    },

    /// Print the telemetry field catalog.
    Fields,

    /// Find the nearest facility to a position.
    Nearest {
        /// Facility category: airport, waypoint, vor, or ndb.
        #[arg(long)]
        category: FacilityCategory,

        /// Query latitude in decimal degrees.
        #[arg(long)]
        lat: f64,

        /// Query longitude in decimal degrees.
        #[arg(long)]
        lon: f64,

        /// Search radius in nautical miles (defaults per category).
        #[arg(long)]
        max_nm: Option<f64>,

        /// Candidate facility as "IDENT,LAT,LON"; repeatable.
        #[arg(long = "facility", value_name = "IDENT,LAT,LON")]
        facilities: Vec<String>,
    },
}

/// Consumer that prints telemetry events to stdout.
struct ConsolePanel;

impl TelemetryConsumer for ConsolePanel {
    fn on_connected(&self, backend: BackendKind) {
        println!("[{backend}] connected");
    }

    fn on_flight_data(&self, backend: BackendKind, snapshot: &TelemetrySnapshot) {
        println!(
            "[{backend}] {:9.4} {:10.4} alt {:6.0} ft hdg {:3.0} gs {:3.0} kt",
            snapshot.latitude,
            snapshot.longitude,
            snapshot.altitude_ft,
            snapshot.heading_deg,
            snapshot.ground_speed_kt,
        );
    }

    fn on_aircraft_change(&self, backend: BackendKind, title: &str) {
        println!("[{backend}] aircraft: {title}");
    }

    fn on_quit(&self, backend: BackendKind) {
        println!("[{backend}] simulator quit");
    }

    fn on_error(&self, backend: BackendKind, err: &ProviderError) {
        println!("[{backend}] error: {err}");
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    match args.command {
        Command::Run { synthetic } => run_bridge(synthetic).await,
        Command::Fields => print_fields(),
        Command::Nearest {
            category,
            lat,
            lon,
            max_nm,
            facilities,
        } => find_nearest(category, lat, lon, max_nm, &facilities),
    }
}

async fn run_bridge(synthetic: bool) {
    let _guard = match init_logging(&LogOptions {
        stdout: false,
        ..Default::default()
    }) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("Error initialising logging: {err}");
            process::exit(1);
        }
    };

    // Real backends need their wire collaborators registered here; until a
    // decoder ships with the CLI, only the synthetic backend is wired. The
    // config file is still read so stale settings get their warnings.
    let config = BridgeConfig::load_or_default();
    let mut builder = RegistryBuilder::new();
    if synthetic {
        let interval = config
            .telemetry
            .min_update_interval
            .max(Duration::from_millis(250));
        builder = builder.with_synthetic(SyntheticLinkConfig { interval });
    }

    let registry = Arc::new(builder.build());
    for kind in registry.available() {
        if let Some(provider) = registry.get(kind) {
            provider.initialize();
        }
    }

    let host = EventHost::new(registry);
    host.attach("console", Arc::new(ConsolePanel) as Arc<dyn TelemetryConsumer>);

    println!("simbridge {} running, Ctrl-C to stop", simbridge::VERSION);
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "Signal handler failed");
    }

    println!("shutting down");
    host.shutdown(SHUTDOWN_TIMEOUT).await;
}

fn print_fields() {
    println!("{:<20} {:<24} {:>6} {:>8}", "FIELD", "DISPLAY", "WIDTH", "FORMAT");
    for meta in metadata::fields() {
        println!(
            "{:<20} {:<24} {:>6} {:>8}",
            meta.field,
            meta.display_name,
            meta.width,
            meta.format.unwrap_or("-"),
        );
    }
}

fn find_nearest(
    category: FacilityCategory,
    lat: f64,
    lon: f64,
    max_nm: Option<f64>,
    specs: &[String],
) {
    let index = FacilityIndex::new();
    for spec in specs {
        let parts: Vec<&str> = spec.split(',').collect();
        let parsed = match parts.as_slice() {
            [ident, lat_s, lon_s] => lat_s
                .trim()
                .parse::<f64>()
                .and_then(|la| lon_s.trim().parse::<f64>().map(|lo| (ident.trim(), la, lo))),
            _ => {
                eprintln!("Error: facility must be \"IDENT,LAT,LON\", got '{spec}'");
                process::exit(1);
            }
        };
        match parsed {
            Ok((ident, la, lo)) => index.add(category, ident, "", la, lo),
            Err(err) => {
                eprintln!("Error parsing facility '{spec}': {err}");
                process::exit(1);
            }
        }
    }

    let max_nm = max_nm.unwrap_or_else(|| category.default_threshold_nm());
    match index.find_nearest(category, lat, lon, max_nm) {
        Some(ident) => println!("{ident}"),
        None => {
            println!("no {category} within {max_nm} NM");
            process::exit(2);
        }
    }
}
