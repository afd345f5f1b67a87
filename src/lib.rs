//! Rentalgap - Measure how late returns collide with the next rental
//!
//! Rentalgap reads a table of finished vehicle rentals (scheduled and actual
//! checkout times) and answers one product question: how large a minimum gap
//! between two bookings of the same car is worth enforcing?
//!
//! # Overview
//!
//! A rental returned late can eat into the next booking of the same vehicle.
//! Hiding slots that start too soon after a previous return (a *buffer*)
//! removes those conflicts but also removes bookable supply. Rentalgap
//! quantifies both sides of that trade-off from historical data.
//!
//! # Pipeline
//!
//! 1. **Ingestion** ([`ingest`]): CSV/JSON tables are read, malformed rows
//!    are excluded and counted, never fatal.
//! 2. **Lateness** ([`analyzer::lateness`]): per-rental delay, early / on-time
//!    / late split and IQR outlier fences. Unreported returns stay unknown.
//! 3. **Chains** ([`analyzer::chain`]): consecutive rentals of each vehicle
//!    are linked; a vehicle with N rentals gives N - 1 links.
//! 4. **Buffer sweep** ([`analyzer::buffer`]): for each candidate buffer,
//!    links masked, conflicts remaining and resolved (the ROI curve).
//! 5. **Cascade** ([`analyzer::cascade`]): next-rental cancellation rate by
//!    previous delay bucket, each with its sample size.
//!
//! # Quick Start
//!
//! ```no_run
//! use rentalgap::{ingest, Analyzer};
//!
//! let batch = ingest::load("get_around_delay_analysis.csv")?;
//! let analysis = Analyzer::new().with_selected_buffer(60).analyze(&batch.rentals)?;
//!
//! let at_60 = &analysis.selected.overall;
//! println!("masked {:.1}% of links", at_60.masking_rate * 100.0);
//! println!("resolved {} of {} conflicts", at_60.conflicts_resolved, at_60.conflicts_without_buffer);
//! # Ok::<(), rentalgap::AnalysisError>(())
//! ```
//!
//! # Modules
//!
//! - [`model`]: Rental records
//! - [`ingest`]: Discovery, reading and cleaning of rental tables
//! - [`analyzer`]: Lateness, chains, buffer sweep, cascade and impact
//! - [`config`]: Analysis settings and TOML loading
//! - [`report`]: Output formatters (HTML, JSON, CSV) and table export

pub mod analyzer;
pub mod config;
pub mod error;
pub mod ingest;
pub mod model;
pub mod report;

pub use analyzer::{Analysis, Analyzer, ChainLink, RoiCurve, RoiMetric};
pub use config::{AnalysisConfig, BufferSweep, ImpactAssumptions, Scope};
pub use error::{AnalysisError, Result};
pub use ingest::{IngestionSummary, RentalBatch};
pub use model::{CheckinType, Rental, RentalStatus};
pub use report::AnalysisReport;

#[cfg(test)]
mod tests {
    use super::*;

    // ==========================================================================
    // PUBLIC API TESTS
    // ==========================================================================
    //
    // These tests verify the public API surface is reachable from the crate root.
    // ==========================================================================

    #[test]
    fn test_public_exports() {
        let _: CheckinType = CheckinType::Mobile;
        let _: RentalStatus = RentalStatus::Ended;
        let _: Scope = Scope::default();
        let _analyzer = Analyzer::new();
    }

    #[test]
    fn test_analyzer_defaults() {
        let analyzer = Analyzer::new();
        assert_eq!(analyzer.config().selected_buffer, config::DEFAULT_SELECTED_BUFFER);
        assert_eq!(analyzer.config().scope, Scope::All);
        assert!(analyzer.config().impact.is_none());
    }

    #[test]
    fn test_empty_table_analyzes_cleanly() {
        let analysis = Analyzer::new().analyze(&[]).unwrap();
        assert_eq!(analysis.lateness.total, 0);
        assert_eq!(analysis.roi.points.len(), BufferSweep::default().values().len());
    }
}
