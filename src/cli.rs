//! # Command Line
//!
//! Argument parsing and channel override collection.

use std::path::PathBuf;

use clap::Parser;
use tracing::warn;

use crate::config::Config;
use crate::msp::rc::{ChannelOverrides, RC_OVERRIDE_SLOTS};

/// Override RC channels on an MSP flight controller
#[derive(Debug, Parser)]
#[command(name = "msp-override", version, about)]
pub struct Args {
    /// Device: serial path[@baud], tcp://host:port, udp://..., or a Bluetooth address
    #[arg(short, long)]
    pub device: Option<String>,

    /// Serial baud rate when the device string does not give one
    #[arg(short, long)]
    pub baud: Option<u32>,

    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Delay between poll cycles in milliseconds
    #[arg(short, long, value_name = "MS")]
    pub interval: Option<u64>,

    /// Enable JSONL telemetry logging into this directory
    #[arg(long, value_name = "DIR")]
    pub telemetry_dir: Option<PathBuf>,

    /// Channel overrides, e.g. `1=1500 5=2000` (channels 1-18)
    #[arg(value_name = "CHAN=VALUE")]
    pub overrides: Vec<String>,
}

impl Args {
    /// Apply command-line values on top of file configuration
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(device) = &self.device {
            config.device.path = device.clone();
        }
        if let Some(baud) = self.baud {
            config.device.baud_rate = baud;
        }
        if let Some(interval) = self.interval {
            config.poll.interval_ms = interval;
        }
        if let Some(dir) = &self.telemetry_dir {
            config.telemetry.enabled = true;
            config.telemetry.log_dir = dir.clone();
        }
    }
}

/// Build the override map from `chan=value` entries
///
/// Malformed entries and channels outside 1..=18 are skipped with a warning.
/// A repeated channel keeps the last value.
///
/// # Examples
///
/// ```
/// use msp_override::cli::parse_overrides;
///
/// let overrides = parse_overrides(["1=1500", "bogus", "5=2000"]);
/// assert_eq!(overrides.get(1), Some(1500));
/// assert_eq!(overrides.len(), 2);
/// ```
pub fn parse_overrides<I, S>(entries: I) -> ChannelOverrides
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut overrides = ChannelOverrides::new();

    for entry in entries {
        let entry = entry.as_ref();
        let Some((channel, value)) = parse_entry(entry) else {
            warn!("Ignoring malformed override '{}' (expected CHAN=VALUE)", entry);
            continue;
        };

        if !overrides.insert(channel, value) {
            warn!(
                "Ignoring override for channel {}: channels are 1 to {}",
                channel, RC_OVERRIDE_SLOTS
            );
        }
    }

    overrides
}

fn parse_entry(entry: &str) -> Option<(usize, u16)> {
    let (channel, value) = entry.split_once('=')?;
    let channel = channel.trim().parse().ok()?;
    let value = value.trim().parse().ok()?;
    Some((channel, value))
}
