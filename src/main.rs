//! # MSP Override
//!
//! Override RC channels on an MSP flight controller and watch the result.
//!
//! This application connects to a flight controller, identifies it, then
//! repeatedly sends the requested channel overrides and prints the channel
//! values and armed state the controller reports back.

use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use msp_override::cli::{parse_overrides, Args};
use msp_override::client::{MspClient, OverrideLoop};
use msp_override::config::{Config, LoggingConfig};
use msp_override::error::MspError;
use msp_override::telemetry::{ConsoleReporter, Reporter, TelemetryLogger};
use msp_override::transport;

/// Exit status for configuration, device and protocol failures
const EXIT_FAILURE: u8 = 1;

/// Exit status when the link to the flight controller is lost
const EXIT_TRANSPORT_LOST: u8 = 2;

/// Main entry point for MSP Override
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Parse arguments, load configuration and apply command-line values
///    - Set up logging with tracing subscriber (stderr or log file)
///    - Open the configured device, or auto-detect a serial port
///
/// 2. **Handshake**
///    - Identify the flight controller and negotiate MSPv2 when supported
///
/// 3. **Main Loop**
///    - Send overrides, read back RC channels and armed state every interval
///    - Print one Tx line and one Rx line per cycle
///    - Handle Ctrl+C for graceful shutdown
///
/// # Exit Status
///
/// - `0` after Ctrl+C
/// - `1` if startup fails
/// - `2` if the transport is lost
///
/// # Examples
///
/// ```bash
/// msp-override -d /dev/ttyACM0 1=1500 3=1000
/// msp-override -d tcp://localhost:5761 --telemetry-dir ./logs 5=2000
/// ```
#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    let logs_to_file = config.logging.file.is_some();
    let _log_guard = match init_logging(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    info!("MSP Override v{} starting...", env!("CARGO_PKG_VERSION"));

    tokio::select! {
        result = run(args, config) => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("{:#}", e);
                if logs_to_file {
                    eprintln!("Error: {:#}", e);
                }
                ExitCode::from(exit_status(&e))
            }
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            ExitCode::SUCCESS
        }
    }
}

/// Connect, identify and poll until the link is lost
async fn run(args: Args, config: Config) -> Result<()> {
    let overrides = parse_overrides(&args.overrides);

    let descriptor = transport::resolve_device(
        &config.device.path,
        config.device.baud_rate,
        &config.device.fallback_paths,
    )?;
    let transport = transport::open(&descriptor).await?;
    info!("Connected to {}", transport.description());

    let mut client = MspClient::start(transport);
    let identity = client.handshake().await?;

    let mut reporters: Vec<Box<dyn Reporter>> = vec![Box::new(ConsoleReporter::stdout())];
    if config.telemetry.enabled {
        let logger = TelemetryLogger::new(&config.telemetry).context("Failed to start telemetry")?;
        reporters.push(Box::new(logger));
    }

    if overrides.is_empty() {
        info!("No channel overrides given, polling only");
    } else {
        for (channel, value) in overrides.iter() {
            info!("Overriding channel {} = {}", channel, value);
        }
    }

    let mut poll = OverrideLoop::new(
        client,
        &overrides,
        identity.status_command(),
        Duration::from_millis(config.poll.interval_ms),
    );
    poll.run(&mut reporters).await?;

    Ok(())
}

/// Load the configuration file if given, then apply command-line values
fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::default(),
    };

    args.apply_to(&mut config);
    config.validate().context("Invalid configuration")?;

    Ok(config)
}

/// Initialize the tracing subscriber
///
/// `RUST_LOG` takes precedence over the configured level. The returned guard
/// must be held until exit so buffered file output is flushed.
fn init_logging(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .with_context(|| format!("Invalid log level '{}'", logging.level))?;

    match &logging.file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|dir| !dir.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .ok_or_else(|| anyhow!("Log file path has no file name: {}", path.display()))?;

            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();

            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();

            Ok(None)
        }
    }
}

/// Map a failure to the process exit status
fn exit_status(error: &anyhow::Error) -> u8 {
    let transport_lost = error
        .chain()
        .filter_map(|cause| cause.downcast_ref::<MspError>())
        .any(MspError::is_transport_loss);

    if transport_lost {
        EXIT_TRANSPORT_LOST
    } else {
        EXIT_FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_status_for_transport_loss() {
        let error = anyhow::Error::from(MspError::TransportClosed);
        assert_eq!(exit_status(&error), EXIT_TRANSPORT_LOST);

        let error = anyhow::Error::from(MspError::ReaderStopped("gone".to_string()))
            .context("while polling");
        assert_eq!(exit_status(&error), EXIT_TRANSPORT_LOST);
    }

    #[test]
    fn test_exit_status_for_other_failures() {
        let error = anyhow::Error::from(MspError::Protocol("short reply".to_string()));
        assert_eq!(exit_status(&error), EXIT_FAILURE);

        assert_eq!(exit_status(&anyhow!("bad config")), EXIT_FAILURE);
    }

    #[test]
    fn test_load_config_applies_arguments() {
        let args = Args::try_parse_from(["msp-override", "-i", "20", "-d", "udp://:14014"]).unwrap();
        let config = load_config(&args).unwrap();
        assert_eq!(config.poll.interval_ms, 20);
        assert_eq!(config.device.path, "udp://:14014");
    }

    #[test]
    fn test_load_config_rejects_invalid_interval() {
        let args = Args::try_parse_from(["msp-override", "-i", "0"]).unwrap();
        assert!(load_config(&args).is_err());
    }
}
