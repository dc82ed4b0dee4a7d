//! Position output formatting
//!
//! Renders estimation outcomes as human-readable text, JSON, or CSV rows.

use crate::processing::pipeline::{EstimationReport, PositionOutcome};
use crate::validation::error::UnavailableReason;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Most decimal places an f64 coordinate can meaningfully carry
pub const MAX_PRECISION: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Csv,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            other => Err(format!("unknown output format '{}'", other)),
        }
    }
}

/// JSON shape of one cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormattedOutcome {
    pub sequence: u64,
    pub outcome: PositionOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Diagnostics>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostics {
    pub active_set: Vec<String>,
    pub path_loss_exponent: Option<f64>,
    pub distances: Vec<(String, f64)>,
    pub residual_rms: Option<f64>,
}

/// Turns estimation reports into output lines
#[derive(Debug, Clone)]
pub struct PositionFormatter {
    pub format: OutputFormat,
    /// Decimal places for coordinates
    pub precision: usize,
    pub include_diagnostics: bool,
}

impl Default for PositionFormatter {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            precision: 6,
            include_diagnostics: false,
        }
    }
}

impl PositionFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            ..Default::default()
        }
    }

    /// Precision above `MAX_PRECISION` is clamped
    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = precision.min(MAX_PRECISION);
        self
    }

    pub fn with_diagnostics(mut self) -> Self {
        self.include_diagnostics = true;
        self
    }

    /// Column header, only meaningful for CSV
    pub fn header(&self) -> Option<&'static str> {
        match self.format {
            OutputFormat::Csv => Some("sequence,status,x,y,reason"),
            _ => None,
        }
    }

    pub fn format(&self, sequence: u64, report: &EstimationReport) -> String {
        match self.format {
            OutputFormat::Text => self.format_text(report),
            OutputFormat::Csv => self.format_csv(sequence, &report.outcome),
            OutputFormat::Json => self.format_json(sequence, report),
        }
    }

    fn format_text(&self, report: &EstimationReport) -> String {
        let mut line = match report.outcome {
            PositionOutcome::Available(p) => {
                format!("Trilaterated position: ({:.*}, {:.*})", self.digits(), p.x, self.digits(), p.y)
            }
            PositionOutcome::Unavailable { reason } => format!("Searching: {}", describe(reason)),
        };

        if self.include_diagnostics && report.outcome.is_available() {
            if let Some(n) = report.path_loss_exponent {
                line.push_str(&format!(" [n={:.3}", n));
                for d in &report.distances {
                    line.push_str(&format!(" {}={:.*}", d.beacon_id, self.digits(), d.distance));
                }
                if let Some(rms) = report.residual_rms {
                    line.push_str(&format!(" rms={:.*}", self.digits(), rms));
                }
                line.push(']');
            }
        }
        line
    }

    fn format_csv(&self, sequence: u64, outcome: &PositionOutcome) -> String {
        match outcome {
            PositionOutcome::Available(p) => {
                format!("{},available,{:.*},{:.*},", sequence, self.digits(), p.x, self.digits(), p.y)
            }
            PositionOutcome::Unavailable { reason } => format!("{},unavailable,,,{}", sequence, reason),
        }
    }

    fn format_json(&self, sequence: u64, report: &EstimationReport) -> String {
        let outcome = match report.outcome {
            PositionOutcome::Available(mut p) => {
                p.x = self.round(p.x);
                p.y = self.round(p.y);
                PositionOutcome::Available(p)
            }
            unavailable => unavailable,
        };
        let diagnostics = self.include_diagnostics.then(|| Diagnostics {
            active_set: report.active_set.clone(),
            path_loss_exponent: report.path_loss_exponent,
            distances: report
                .distances
                .iter()
                .map(|d| (d.beacon_id.clone(), d.distance))
                .collect(),
            residual_rms: report.residual_rms,
        });

        let formatted = FormattedOutcome {
            sequence,
            outcome,
            diagnostics,
        };
        // plain data with string keys; serialization cannot fail
        serde_json::to_string(&formatted).unwrap_or_default()
    }

    fn digits(&self) -> usize {
        self.precision.min(MAX_PRECISION)
    }

    fn round(&self, value: f64) -> f64 {
        let scale = 10f64.powi(self.digits() as i32);
        (value * scale).round() / scale
    }
}

fn describe(reason: UnavailableReason) -> &'static str {
    match reason {
        UnavailableReason::NotEnoughBeacons => "at least 3 beacons required for trilateration",
        UnavailableReason::DegenerateModel => "signal readings give no usable path-loss model",
        UnavailableReason::SingularGeometry => "beacon geometry is collinear, cannot trilaterate",
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Text => "text",
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
        };
        f.write_str(name)
    }
}
