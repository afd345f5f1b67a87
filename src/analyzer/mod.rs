//! Analysis engine.
//!
//! [`Analyzer`] runs every stage over one cleaned rental table:
//!
//! 1. **Lateness**: per-rental delay, early / on-time / late split, quartiles
//!    and IQR fences computed separately for early and late returns.
//! 2. **Chains**: consecutive rentals of each vehicle linked into pairs.
//! 3. **Buffer sweep**: for each candidate buffer, how many links would be
//!    hidden and how many conflicts remain (the ROI curve).
//! 4. **Cascade**: cancellation rate of the next rental bucketed by how late
//!    the previous one came back, plus lateness propagation.
//! 5. **Impact** (optional): revenue exposure of the selected buffer.
//!
//! The result is a pure function of the rentals and the config: the same
//! table in any row order gives an identical [`Analysis`].

pub mod buffer;
pub mod cascade;
pub mod chain;
pub mod impact;
pub mod lateness;
pub mod overview;
pub mod stats;

pub use buffer::{BufferCounts, BufferOutcome, RoiCurve, RoiMetric};
pub use cascade::{CascadeBucket, CascadeTable, PropagationStats};
pub use chain::{build_chains, ChainLink, LinkRow, LinkSummary};
pub use impact::BusinessImpact;
pub use lateness::{CheckoutOutcome, DelayRecord, LatenessSummary};
pub use overview::DatasetOverview;
pub use stats::{HistogramBin, SummaryStats};

use crate::config::{AnalysisConfig, BufferSweep, HistogramConfig, ImpactAssumptions, Scope};
use crate::error::Result;
use crate::model::Rental;
use serde::Serialize;
use tracing::{debug, info};

/// Everything one run produces. Deterministic for a given input set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub config: AnalysisConfig,
    pub overview: DatasetOverview,
    pub lateness: LatenessSummary,
    pub histogram: Vec<HistogramBin>,
    pub delays: Vec<DelayRecord>,
    pub link_summary: LinkSummary,
    /// Per-link flags evaluated at the selected buffer
    pub links: Vec<LinkRow>,
    pub roi: RoiCurve,
    pub selected: BufferOutcome,
    pub cascade: CascadeTable,
    pub propagation: PropagationStats,
    pub impact: Option<BusinessImpact>,
}

/// Analyzer configuration and entry point.
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    config: AnalysisConfig,
}

impl Analyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn with_buffers(mut self, sweep: &BufferSweep) -> Self {
        self.config.buffers = sweep.values().to_vec();
        self
    }

    pub fn with_selected_buffer(mut self, minutes: i64) -> Self {
        self.config.selected_buffer = minutes;
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.config.scope = scope;
        self
    }

    pub fn with_impact(mut self, assumptions: ImpactAssumptions) -> Self {
        self.config.impact = Some(assumptions);
        self
    }

    pub fn with_cascade_edges(mut self, edges: Vec<i64>) -> Self {
        self.config.cascade_edges = edges;
        self
    }

    pub fn with_histogram(mut self, histogram: HistogramConfig) -> Self {
        self.config.histogram = histogram;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Run every stage. Fails only on an invalid config, before any work.
    pub fn analyze(&self, rentals: &[Rental]) -> Result<Analysis> {
        self.config.validate()?;
        let sweep = self.config.sweep()?;
        let scope = self.config.scope;
        let selected_buffer = self.config.selected_buffer;

        let scoped: Vec<&Rental> = rentals
            .iter()
            .filter(|r| scope.admits(r.checkin_type))
            .collect();
        debug!(%scope, rentals = scoped.len(), "scoped rental table");

        // Lateness
        let overview = DatasetOverview::from_rentals(scoped.iter().copied());
        let delays = lateness::delay_records(scoped.iter().copied());
        let lateness = lateness::summarize(&delays);
        let known: Vec<i64> = delays.iter().filter_map(|d| d.delay_minutes).collect();
        let histogram = stats::histogram(&known, &self.config.histogram);
        info!(
            known = lateness.known,
            unreported = lateness.unreported,
            late = lateness.late,
            "computed lateness"
        );

        // Chains are built on the full table; scope only selects links
        let links: Vec<ChainLink<'_>> = build_chains(rentals)
            .into_iter()
            .filter(|l| scope.admits(l.next.checkin_type))
            .collect();
        let link_summary = LinkSummary::from_links(scoped.iter().copied(), &links);
        info!(
            links = link_summary.links,
            conflicts = link_summary.conflicts,
            "built rental chains"
        );

        // Buffers
        let roi = buffer::sweep(&links, &sweep);
        let selected = buffer::evaluate(&links, selected_buffer)?;
        let link_rows = links.iter().map(|l| LinkRow::new(l, selected_buffer)).collect();
        info!(
            buffers = roi.points.len(),
            selected_buffer,
            masked = selected.overall.links_masked,
            remaining = selected.overall.conflicts_remaining,
            "swept buffers"
        );

        // Cascade
        let cascade = cascade::cascade_table(&links, &self.config.cascade_edges);
        let propagation = cascade::propagation(&links);

        let impact = self
            .config
            .impact
            .as_ref()
            .map(|a| BusinessImpact::estimate(selected_buffer, &selected.overall, a));

        Ok(Analysis {
            config: self.config.clone(),
            overview,
            lateness,
            histogram,
            delays,
            link_summary,
            links: link_rows,
            roi,
            selected,
            cascade,
            propagation,
            impact,
        })
    }
}
