//! Report generation for analysis results
//!
//! This module provides output formatters for a finished analysis:
//!
//! - **HTML**: Self-contained page with D3.js charts (delay histogram, ROI curve)
//! - **JSON**: The full analysis, machine-readable
//! - **CSV**: The ROI curve in long format, `;`-separated
//!
//! [`export_tables`] additionally writes one CSV per dashboard table.
//!
//! # Usage
//!
//! ```ignore
//! use rentalgap::report;
//!
//! // Automatically picks format based on extension
//! report::generate("report.html", &report)?;  // HTML
//! report::generate("report.json", &report)?;  // JSON
//! report::generate("report.csv", &report)?;   // CSV
//! ```

pub mod csv;
pub mod html;
pub mod json;
pub mod tables;

pub use tables::export_tables;

use crate::analyzer::Analysis;
use crate::error::{AnalysisError, Result};
use crate::ingest::IngestionSummary;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

/// One run: what was read, what was computed, and when.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub generated: DateTime<Utc>,
    pub version: String,
    pub ingestion: IngestionSummary,
    pub analysis: Analysis,
}

impl AnalysisReport {
    pub fn new(ingestion: IngestionSummary, analysis: Analysis) -> Self {
        Self {
            generated: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            ingestion,
            analysis,
        }
    }
}

/// Generate a report in the appropriate format based on file extension
pub fn generate<P: AsRef<Path>>(path: P, report: &AnalysisReport) -> Result<()> {
    let path = path.as_ref();
    let ext = crate::ingest::raw::extension(path);

    let mut file = std::fs::File::create(path).map_err(|e| AnalysisError::io(path, e))?;

    let written = match ext.as_str() {
        "html" | "htm" => html::write(&mut file, report),
        "json" => json::write(&mut file, report),
        _ => csv::write(&mut file, report),
    };
    written.map_err(|e| AnalysisError::io(path, e))
}

/// Headline numbers shown at the top of every report
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub rentals: usize,
    pub excluded: usize,
    pub unreported_rate: f64,
    pub links: usize,
    pub conflicts: usize,
    pub selected_buffer: i64,
    pub masked: usize,
    pub masking_rate: f64,
    pub conflicts_remaining: usize,
    pub conflicts_resolved: i64,
}

impl Summary {
    pub fn from_report(report: &AnalysisReport) -> Self {
        let analysis = &report.analysis;
        let selected = &analysis.selected.overall;
        Self {
            rentals: report.ingestion.rentals,
            excluded: report.ingestion.excluded,
            unreported_rate: analysis.lateness.unreported_rate,
            links: analysis.link_summary.links,
            conflicts: analysis.link_summary.conflicts,
            selected_buffer: analysis.selected.buffer_minutes,
            masked: selected.links_masked,
            masking_rate: selected.masking_rate,
            conflicts_remaining: selected.conflicts_remaining,
            conflicts_resolved: selected.conflicts_resolved,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::analyzer::Analyzer;
    use crate::config::{BufferSweep, ImpactAssumptions};
    use crate::model::fixtures::rental;
    use crate::model::RentalStatus;

    /// A small two-vehicle report with one conflict, one masked link and a cancellation.
    pub fn sample_report() -> AnalysisReport {
        let mut rentals = vec![
            rental(1, "A", 0, 600, Some(20)),
            rental(2, "A", 615, 700, Some(-5)),
            rental(3, "A", 760, 900, Some(10)),
            rental(4, "A", 950, 1100, None),
            rental(5, "B", 0, 100, Some(0)),
            rental(6, "B", 300, 400, None),
        ];
        rentals[3].status = RentalStatus::Canceled;

        let analysis = Analyzer::new()
            .with_buffers(&BufferSweep::new(vec![0, 30, 60]).unwrap())
            .with_selected_buffer(30)
            .with_impact(ImpactAssumptions::new(100.0))
            .analyze(&rentals)
            .unwrap();
        let ingestion = IngestionSummary {
            sources: vec!["rentals.csv".to_string()],
            rows_read: 6,
            rentals: 6,
            ..Default::default()
        };
        AnalysisReport::new(ingestion, analysis)
    }
}
