//! # Telemetry Module
//!
//! Reporting of poll results.
//!
//! This module handles:
//! - Printing Tx/Rx/armed lines for the operator
//! - Formatting reports as JSONL (JSON Lines)
//! - Writing to rotating log files
//! - Managing file rotation (max N records per file)
//! - Retaining only last M files

use std::io::{self, Write};

use tracing::warn;

use crate::client::PollReport;

pub mod logger;

pub use logger::TelemetryLogger;

/// Consumer of poll cycle results
#[cfg_attr(test, mockall::automock)]
pub trait Reporter: Send {
    /// Called once per completed poll cycle
    fn report(&mut self, report: &PollReport);
}

/// Fan a report out to several reporters
impl Reporter for Vec<Box<dyn Reporter>> {
    fn report(&mut self, report: &PollReport) {
        for reporter in self.iter_mut() {
            reporter.report(report);
        }
    }
}

/// Operator output: one `Tx:` line and one `Rx:` line per cycle
pub struct ConsoleReporter<W = io::Stdout> {
    out: W,
}

impl ConsoleReporter<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> Reporter for ConsoleReporter<W> {
    fn report(&mut self, report: &PollReport) {
        let result = format_lines(report)
            .iter()
            .try_for_each(|line| writeln!(self.out, "{}", line))
            .and_then(|_| self.out.flush());

        if let Err(e) = result {
            warn!("Failed to write report: {}", e);
        }
    }
}

/// Render a report as operator lines
///
/// ```text
/// Tx: 1500 1759 1000 ...
/// Rx: 1500 1500 1000 ... unarmed (208)
/// ```
pub fn format_lines(report: &PollReport) -> Vec<String> {
    let mut lines = Vec::with_capacity(2);

    if let Some(tx) = &report.tx {
        let mut line = String::from("Tx:");
        for value in tx {
            line.push_str(&format!(" {:4}", value));
        }
        lines.push(line);
    }

    if report.rx.is_some() || report.status.is_some() {
        let mut line = String::from("Rx:");
        for value in report.rx.iter().flatten() {
            line.push_str(&format!(" {:4}", value));
        }
        if let Some(status) = &report.status {
            line.push_str(&format!(" {}", status));
        }
        lines.push(line);
    }

    lines
}
