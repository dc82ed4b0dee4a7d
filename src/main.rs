use beacon_trilateration::{
    BeaconRegistry, ConfigurationManager, EstimationPipeline, OutputFormat, PositionFormatter,
};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Reference deployment the demo replays: three beacons, RSSI -50/-55/-60 dBm
const DEMO_DEPLOYMENT: &str = r#"{
    "system": { "calibration": { "reference_rssi": -44.0, "reference_distance": 0.3 } },
    "beacons": [
        { "id": "beacon-1", "x": 5.0, "y": 4.2 },
        { "id": "beacon-2", "x": 3.6, "y": 3.4 },
        { "id": "beacon-3", "x": 2.3, "y": 1.5 }
    ]
}"#;

const DEMO_READINGS: [(&str, f64); 3] = [("beacon-1", -50.0), ("beacon-2", -55.0), ("beacon-3", -60.0)];

#[derive(Debug, Parser)]
#[command(name = "beacon-trilateration", version, about = "Estimate a 2D position from beacon RSSI readings")]
struct Cli {
    /// Log level when RUST_LOG is not set (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output format: text, json or csv
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Decimal places in printed coordinates
    #[arg(long, global = true, default_value_t = 6)]
    precision: usize,

    /// Include exponent, distances and residual in the output
    #[arg(long, global = true)]
    diagnostics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Replay a JSON-lines file of {"id", "rssi"} readings against a deployment
    Locate {
        /// Deployment configuration (JSON)
        #[arg(long)]
        config: PathBuf,

        /// One reading per line
        #[arg(long)]
        readings: PathBuf,
    },
    /// Run the built-in three-beacon reference scenario
    Demo,
}

/// Raw reading as delivered by the scanning layer
#[derive(Debug, Deserialize)]
struct Reading {
    id: String,
    rssi: f64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)))
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    let mut formatter = PositionFormatter::new(cli.format).with_precision(cli.precision);
    if cli.diagnostics {
        formatter = formatter.with_diagnostics();
    }

    match cli.command {
        Commands::Locate { config, readings } => {
            let manager = ConfigurationManager::from_file(&config)?;
            let file = File::open(&readings)?;
            let lines = BufReader::new(file).lines();
            replay(&manager, &formatter, lines)
        }
        Commands::Demo => {
            info!("running reference scenario");
            let manager = ConfigurationManager::from_json(DEMO_DEPLOYMENT)?;
            let lines = DEMO_READINGS
                .iter()
                .map(|(id, rssi)| -> std::io::Result<String> { Ok(format!(r#"{{"id":"{}","rssi":{}}}"#, id, rssi)) });
            replay(&manager, &formatter, lines)
        }
    }
}

/// Upsert each reading and print the outcome of the cycle it triggers
fn replay(
    manager: &ConfigurationManager,
    formatter: &PositionFormatter,
    lines: impl Iterator<Item = std::io::Result<String>>,
) -> Result<(), Box<dyn std::error::Error>> {
    let pipeline: EstimationPipeline = manager.pipeline();
    let mut registry = BeaconRegistry::new();
    let mut sequence = 0u64;

    if let Some(header) = formatter.header() {
        println!("{}", header);
    }

    for (line_no, line) in lines.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let reading: Reading = match serde_json::from_str(&line) {
            Ok(reading) => reading,
            Err(e) => {
                warn!(line = line_no + 1, error = %e, "skipping unparseable reading");
                continue;
            }
        };

        let Some(observation) = manager.observation(&reading.id, reading.rssi) else {
            warn!(id = %reading.id, "reading from unconfigured beacon ignored");
            continue;
        };

        if let Err(e) = registry.upsert(observation) {
            warn!(line = line_no + 1, error = %e, "rejected observation");
            continue;
        }

        sequence += 1;
        let report = pipeline.run(&registry);
        println!("{}", formatter.format(sequence, &report));
    }

    info!(cycles = sequence, beacons = registry.len(), "replay finished");
    Ok(())
}
