//! # Telemetry Logger
//!
//! Appends poll reports to JSONL files, one record per line:
//!
//! ```text
//! {"timestamp":"2024-05-01T12:00:00.123+00:00","rx":[1500,1500],"status":{...}}
//! ```
//!
//! A new file is started after `max_records_per_file` records; only the
//! newest `max_files_to_keep` files written by this process are retained.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::Reporter;
use crate::client::PollReport;
use crate::config::TelemetryConfig;
use crate::error::{MspError, Result};

#[derive(Serialize)]
struct TelemetryRecord<'a> {
    timestamp: String,
    #[serde(flatten)]
    report: &'a PollReport,
}

/// Rotating JSONL writer
pub struct TelemetryLogger {
    log_dir: PathBuf,
    max_records_per_file: usize,
    max_files_to_keep: usize,
    current: Option<BufWriter<File>>,
    records_in_file: usize,
    files: VecDeque<PathBuf>,
    sequence: u64,
}

impl TelemetryLogger {
    /// Create the logger, creating `log_dir` if needed
    ///
    /// No file is opened until the first record.
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created or a limit is zero.
    pub fn new(config: &TelemetryConfig) -> Result<Self> {
        if config.max_records_per_file == 0 || config.max_files_to_keep == 0 {
            return Err(MspError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "telemetry file limits must be greater than 0",
            )));
        }

        fs::create_dir_all(&config.log_dir)?;
        info!("Telemetry logging to {}", config.log_dir.display());

        Ok(Self {
            log_dir: config.log_dir.clone(),
            max_records_per_file: config.max_records_per_file,
            max_files_to_keep: config.max_files_to_keep,
            current: None,
            records_in_file: 0,
            files: VecDeque::new(),
            sequence: 0,
        })
    }

    /// Append one report
    pub fn log(&mut self, report: &PollReport) -> Result<()> {
        if self.current.is_none() || self.records_in_file >= self.max_records_per_file {
            self.rotate()?;
        }

        let record = TelemetryRecord {
            timestamp: Utc::now().to_rfc3339(),
            report,
        };

        if let Some(writer) = self.current.as_mut() {
            serde_json::to_writer(&mut *writer, &record).map_err(io::Error::from)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
            self.records_in_file += 1;
        }

        Ok(())
    }

    /// Files currently retained, oldest first
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.files.iter().map(PathBuf::as_path)
    }

    fn rotate(&mut self) -> Result<()> {
        if let Some(mut previous) = self.current.take() {
            previous.flush()?;
        }

        let name = format!(
            "telemetry_{}_{:04}.jsonl",
            Local::now().format("%Y%m%d_%H%M%S"),
            self.sequence
        );
        self.sequence += 1;

        let path = self.log_dir.join(name);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        debug!("Opened telemetry file {}", path.display());

        self.current = Some(BufWriter::new(file));
        self.records_in_file = 0;
        self.files.push_back(path);

        while self.files.len() > self.max_files_to_keep {
            if let Some(old) = self.files.pop_front() {
                if let Err(e) = fs::remove_file(&old) {
                    warn!("Failed to remove old telemetry file {}: {}", old.display(), e);
                }
            }
        }

        Ok(())
    }
}

impl Reporter for TelemetryLogger {
    fn report(&mut self, report: &PollReport) {
        if let Err(e) = self.log(report) {
            warn!("Telemetry write failed: {}", e);
        }
    }
}
