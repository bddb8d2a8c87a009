//! ==============================================================================
//! main.rs - network simulator controller entry point
//! ==============================================================================
//!
//! purpose:
//!     runs on the pi next to an esp32 "network simulator". it looks up the
//!     wifi/ble emitters around a location and tells the esp32 to broadcast
//!     them, by writing one json line to the esp32's serial port.
//!
//! responsibilities:
//!     - parse the command line (location, radius, --port, --baud, --config)
//!     - load controller.toml and initialize logging
//!     - check a serial backend exists before doing any network work
//!     - run the pipeline once and print a one-line verdict
//!
//! relationships:
//!     - uses: config.rs, hal.rs, locator.rs, pipeline.rs, transmitter.rs
//!
//! architecture:
//!
//!     ┌──────────────┐   ┌──────────────┐   ┌───────────────┐      ┌───────┐
//!     │   locator    │──>│  formatter   │──>│  transmitter  │─uart─│ esp32 │
//!     │ (sim/wigle)  │   │ (5 fields)   │   │ (json + '\n') │      └───────┘
//!     └──────────────┘   └──────────────┘   └───────────────┘
//!
//! exit status:
//!     non-zero only for bad arguments or an unreadable --config file.
//!     pipeline failures are reported on the console and exit 0.
//!
//! ==============================================================================

mod config;
mod domain;
mod error;
mod formatter;
mod hal;
mod locator;
mod pipeline;
mod transmitter;
mod wigle;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Control the ESP32-based network simulator. Fetches network data from a given location and commands the ESP32 to broadcast it.",
    after_help = "Example: beacon-sim-controller \"40.7128,-74.0060\" 500 --port /dev/ttyUSB0",
    arg_required_else_help = true
)]
struct Cli {
    /// Target location, either as 'latitude,longitude' or a street address
    location: String,

    /// Radius in meters around the location to search for networks
    #[arg(value_parser = clap::value_parser!(u32).range(1..))]
    radius: u32,

    /// Serial port of the connected ESP32 (default: from config, else platform default)
    #[arg(long)]
    port: Option<String>,

    /// Baud rate for the serial link (default: from config, else 115200)
    #[arg(long)]
    baud: Option<u32>,

    /// Path to controller.toml
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // step 1: load configuration
    let config = match &cli.config {
        Some(path) => config::ControllerConfig::load(path)?,
        None => config::ControllerConfig::load_or_default(),
    };

    init_logging(&config.logging.level);

    let port = cli.port.clone().unwrap_or_else(|| config.serial.port.clone());
    let baud = cli.baud.unwrap_or(config.serial.baud);

    println!("--- Network Simulator Controller ---");
    println!("[*] Target Location: {}", cli.location);
    println!("[*] Search Radius: {}m", cli.radius);
    println!("[*] ESP32 Port: {}", port);
    println!("------------------------------------");
    config.print_summary();

    // step 2: serial capability check, before any lookup work
    let hal = match hal::detect() {
        Ok(hal) => hal,
        Err(e) => {
            tracing::error!("{}", e);
            println!("\n[FAILURE] No serial transport available in this build.");
            return Ok(());
        }
    };

    // step 3: pick the locator
    let locator = match locator::Locator::from_config(&config.locator) {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Could not set up locator: {}", e);
            println!("\n[!] Failed to fetch or parse network data. Exiting.");
            return Ok(());
        }
    };

    // step 4: run once
    let transmitter = transmitter::DeviceTransmitter::new(
        hal,
        Duration::from_millis(config.serial.settle_millis),
    );
    let request = pipeline::PipelineRequest {
        location: cli.location,
        radius_m: cli.radius,
        port,
        baud,
        timeout: Duration::from_secs(config.serial.timeout_seconds),
    };

    match pipeline::run(&locator, &transmitter, &request).await {
        Ok(count) => {
            tracing::info!(networks = count, "pipeline complete");
            println!("\n[SUCCESS] Data sent to ESP32. Broadcasting should now be active.");
        }
        Err(e @ error::PipelineError::Transmit(_)) => {
            tracing::debug!("{}", e);
            println!("\n[FAILURE] Failed to send data to the ESP32. Check connections and port.");
        }
        Err(e @ error::PipelineError::Format(_)) | Err(e @ error::PipelineError::Encode(_)) => {
            tracing::error!("{}", e);
            println!("[!] Failed to format data for the ESP32. Exiting.");
        }
        Err(e) => {
            tracing::error!("{}", e);
            println!("[!] Failed to fetch or parse network data. Exiting.");
        }
    }

    Ok(())
}

/// RUST_LOG wins; otherwise the level from controller.toml
fn init_logging(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_target(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_parses_positionals_and_flags() {
        let cli = Cli::try_parse_from([
            "beacon-sim-controller",
            "40.7128,-74.0060",
            "500",
            "--port",
            "/dev/serial0",
            "--baud",
            "9600",
        ])
        .unwrap();

        assert_eq!(cli.location, "40.7128,-74.0060");
        assert_eq!(cli.radius, 500);
        assert_eq!(cli.port.as_deref(), Some("/dev/serial0"));
        assert_eq!(cli.baud, Some(9600));
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_cli_flags_are_optional() {
        let cli = Cli::try_parse_from(["beacon-sim-controller", "Times Square", "100"]).unwrap();
        assert!(cli.port.is_none());
        assert!(cli.baud.is_none());
    }

    #[test]
    fn test_cli_without_arguments_shows_help() {
        let err = Cli::try_parse_from(["beacon-sim-controller"]).unwrap_err();
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
        );
        assert_ne!(err.exit_code(), 0);
    }

    #[test]
    fn test_cli_rejects_bad_radius() {
        assert!(Cli::try_parse_from(["beacon-sim-controller", "0,0", "0"]).is_err());
        assert!(Cli::try_parse_from(["beacon-sim-controller", "0,0", "-5"]).is_err());
        assert!(Cli::try_parse_from(["beacon-sim-controller", "0,0", "far"]).is_err());
    }
}
