//! Minimum-gap buffer simulation.
//!
//! A buffer of B minutes hides (masks) any slot whose scheduled gap to the
//! previous rental is below B. A masked link was never bookable, so it can
//! not conflict; it is counted as avoided exposure instead. For unmasked
//! links the previous return must land at least B minutes before the next
//! start, otherwise the link still conflicts.
//!
//! Masking is a pure function of (link, buffer). Nothing is stored on the
//! link, so any number of buffers can be evaluated over the same links.

use super::chain::ChainLink;
use crate::config::{validate_buffer, BufferSweep};
use crate::error::Result;
use crate::model::CheckinType;
use chrono::Duration;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;

/// The link's slot would be hidden under this buffer. A zero buffer hides
/// nothing, and a gap equal to the buffer is still bookable.
pub fn is_masked(link: &ChainLink<'_>, buffer_minutes: i64) -> bool {
    if buffer_minutes <= 0 {
        return false;
    }
    match Duration::try_minutes(buffer_minutes) {
        Some(buffer) => link.gap() < buffer,
        None => true,
    }
}

/// Conflict once the buffer is applied. Masked links never conflict;
/// `None` when the previous return is unknown.
pub fn conflicts_with_buffer(link: &ChainLink<'_>, buffer_minutes: i64) -> Option<bool> {
    let actual = link.previous.actual_checkout_at?;
    if is_masked(link, buffer_minutes) {
        return Some(false);
    }
    let ready_by = Duration::try_minutes(buffer_minutes)
        .and_then(|buffer| link.next.scheduled_checkin_at.checked_sub_signed(buffer));
    Some(ready_by.map_or(true, |ready_by| actual > ready_by))
}

/// Outcome counts for one buffer over a set of evaluable links.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BufferCounts {
    /// Links whose previous return is known
    pub evaluated_links: usize,
    pub links_masked: usize,
    pub conflicts_without_buffer: usize,
    /// Unmasked links still conflicting under the buffer
    pub conflicts_remaining: usize,
    /// `conflicts_without_buffer - conflicts_remaining`; negative when the
    /// buffer's stricter readiness margin flags more links than it hides
    pub conflicts_resolved: i64,
    /// Historic conflicts whose slot the buffer hides
    pub conflicts_avoided: usize,
    /// `links_masked / evaluated_links`
    pub masking_rate: f64,
    /// `conflicts_resolved / links_masked`; `None` when nothing is masked
    pub resolution_efficiency: Option<f64>,
    /// `conflicts_avoided / conflicts_without_buffer`
    pub avoided_rate: f64,
}

impl BufferCounts {
    fn tally<'a, I>(links: I, buffer_minutes: i64) -> Self
    where
        I: IntoIterator<Item = &'a ChainLink<'a>>,
    {
        let mut counts = BufferCounts::default();
        for link in links {
            let Some(conflict) = link.conflict() else {
                continue;
            };
            let masked = is_masked(link, buffer_minutes);
            counts.evaluated_links += 1;
            if masked {
                counts.links_masked += 1;
            }
            if conflict {
                counts.conflicts_without_buffer += 1;
                if masked {
                    counts.conflicts_avoided += 1;
                }
            }
            if conflicts_with_buffer(link, buffer_minutes) == Some(true) {
                counts.conflicts_remaining += 1;
            }
        }

        counts.conflicts_resolved =
            counts.conflicts_without_buffer as i64 - counts.conflicts_remaining as i64;
        counts.masking_rate = ratio(counts.links_masked, counts.evaluated_links);
        counts.avoided_rate = ratio(counts.conflicts_avoided, counts.conflicts_without_buffer);
        counts.resolution_efficiency = if counts.links_masked == 0 {
            None
        } else {
            Some(counts.conflicts_resolved as f64 / counts.links_masked as f64)
        };
        counts
    }
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// One point of the ROI curve.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BufferOutcome {
    pub buffer_minutes: i64,
    #[serde(flatten)]
    pub overall: BufferCounts,
    /// Same counts split by the checkin type of the rental that would be hidden
    pub by_checkin_type: BTreeMap<CheckinType, BufferCounts>,
}

/// Evaluate one buffer. Negative buffers are rejected before any work.
pub fn evaluate(links: &[ChainLink<'_>], buffer_minutes: i64) -> Result<BufferOutcome> {
    let buffer_minutes = validate_buffer(buffer_minutes)?;
    Ok(evaluate_unchecked(links, buffer_minutes))
}

fn evaluate_unchecked(links: &[ChainLink<'_>], buffer_minutes: i64) -> BufferOutcome {
    let mut by_checkin_type = BTreeMap::new();
    for checkin_type in CheckinType::ALL {
        let subset: Vec<&ChainLink<'_>> = links
            .iter()
            .filter(|l| l.next.checkin_type == checkin_type)
            .collect();
        if !subset.is_empty() {
            by_checkin_type.insert(checkin_type, BufferCounts::tally(subset, buffer_minutes));
        }
    }

    BufferOutcome {
        buffer_minutes,
        overall: BufferCounts::tally(links, buffer_minutes),
        by_checkin_type,
    }
}

/// Metrics that can be read off the curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoiMetric {
    LinksMasked,
    ConflictsRemaining,
    ConflictsResolved,
    MaskingRate,
    AvoidedRate,
    ResolutionEfficiency,
}

impl RoiMetric {
    fn read(&self, counts: &BufferCounts) -> Option<f64> {
        match self {
            RoiMetric::LinksMasked => Some(counts.links_masked as f64),
            RoiMetric::ConflictsRemaining => Some(counts.conflicts_remaining as f64),
            RoiMetric::ConflictsResolved => Some(counts.conflicts_resolved as f64),
            RoiMetric::MaskingRate => Some(counts.masking_rate),
            RoiMetric::AvoidedRate => Some(counts.avoided_rate),
            RoiMetric::ResolutionEfficiency => counts.resolution_efficiency,
        }
    }
}

/// Buffer sweep results, ascending by buffer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RoiCurve {
    pub points: Vec<BufferOutcome>,
}

impl RoiCurve {
    pub fn at(&self, buffer_minutes: i64) -> Option<&BufferOutcome> {
        self.points.iter().find(|p| p.buffer_minutes == buffer_minutes)
    }

    /// Metric at an arbitrary buffer, linearly interpolated between the
    /// nearest swept points and clamped to the first/last point outside them.
    pub fn value_at(&self, metric: RoiMetric, buffer_minutes: f64) -> Option<f64> {
        let known: Vec<(f64, f64)> = self
            .points
            .iter()
            .filter_map(|p| metric.read(&p.overall).map(|v| (p.buffer_minutes as f64, v)))
            .collect();
        let (first, last) = (known.first()?, known.last()?);

        if buffer_minutes <= first.0 {
            return Some(first.1);
        }
        if buffer_minutes >= last.0 {
            return Some(last.1);
        }
        known.windows(2).find_map(|w| {
            let ((x0, y0), (x1, y1)) = (w[0], w[1]);
            if buffer_minutes < x0 || buffer_minutes > x1 {
                return None;
            }
            let weight = if x1 > x0 { (buffer_minutes - x0) / (x1 - x0) } else { 0.0 };
            Some(y0 + weight * (y1 - y0))
        })
    }
}

/// Evaluate every buffer of the sweep independently.
pub fn sweep(links: &[ChainLink<'_>], buffers: &BufferSweep) -> RoiCurve {
    let points = buffers
        .values()
        .par_iter()
        .map(|&b| evaluate_unchecked(links, b))
        .collect();
    RoiCurve { points }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::chain::build_chains;
    use crate::error::AnalysisError;
    use crate::model::fixtures::rental;
    use crate::model::Rental;

    // ==========================================================================
    // MASKING AND CONFLICTS
    // ==========================================================================
    //
    // Reference case: R1 due back 10:00 and returned 10:20, R2 starts 10:15.
    //   gap = 15 min, conflict without buffer (10:20 > 10:15)
    //   buffer 30 -> masked (15 < 30), so not a remaining conflict
    // ==========================================================================

    fn reference_pair() -> Vec<Rental> {
        vec![
            rental(1, "V", 8 * 60, 10 * 60, Some(20)),
            rental(2, "V", 10 * 60 + 15, 12 * 60, None),
        ]
    }

    #[test]
    fn test_reference_pair_masked_at_30() {
        let rentals = reference_pair();
        let links = build_chains(&rentals);
        let link = &links[0];

        assert_eq!(link.conflict(), Some(true));
        assert!(!is_masked(link, 0));
        assert!(is_masked(link, 30));
        assert_eq!(conflicts_with_buffer(link, 30), Some(false));

        let outcome = evaluate(&links, 30).unwrap();
        assert_eq!(outcome.overall.links_masked, 1);
        assert_eq!(outcome.overall.conflicts_remaining, 0);
        assert_eq!(outcome.overall.conflicts_avoided, 1);
        assert_eq!(outcome.overall.conflicts_resolved, 1);
        assert_eq!(outcome.overall.resolution_efficiency, Some(1.0));
    }

    #[test]
    fn test_zero_buffer_matches_raw_conflicts() {
        let rentals = reference_pair();
        let links = build_chains(&rentals);
        let outcome = evaluate(&links, 0).unwrap();

        assert_eq!(outcome.overall.links_masked, 0);
        assert_eq!(
            outcome.overall.conflicts_remaining,
            outcome.overall.conflicts_without_buffer
        );
        assert_eq!(outcome.overall.resolution_efficiency, None);
    }

    #[test]
    fn test_buffer_requires_readiness_margin_on_unmasked_links() {
        // Gap 60, returned 40 late: no raw conflict, but inside a 30 min margin
        let rentals = vec![
            rental(1, "V", 0, 600, Some(40)),
            rental(2, "V", 660, 800, None),
        ];
        let links = build_chains(&rentals);

        assert_eq!(links[0].conflict(), Some(false));
        assert!(!is_masked(&links[0], 30));
        assert_eq!(conflicts_with_buffer(&links[0], 30), Some(true));

        let outcome = evaluate(&links, 30).unwrap();
        assert_eq!(outcome.overall.conflicts_resolved, -1);
    }

    #[test]
    fn test_unknown_previous_return_not_evaluated() {
        let rentals = vec![
            rental(1, "V", 0, 600, None),
            rental(2, "V", 605, 800, None),
        ];
        let links = build_chains(&rentals);
        let outcome = evaluate(&links, 30).unwrap();

        assert_eq!(outcome.overall.evaluated_links, 0);
        assert_eq!(outcome.overall.links_masked, 0);
        assert_eq!(conflicts_with_buffer(&links[0], 30), None);
    }

    #[test]
    fn test_negative_buffer_rejected() {
        let rentals = reference_pair();
        let links = build_chains(&rentals);
        assert!(matches!(evaluate(&links, -10), Err(AnalysisError::InvalidBuffer(-10))));
    }

    #[test]
    fn test_gap_equal_to_buffer_is_not_masked() {
        // Gap exactly 30
        let rentals = vec![
            rental(1, "V", 0, 600, Some(10)),
            rental(2, "V", 630, 800, None),
        ];
        let links = build_chains(&rentals);

        assert_eq!(links[0].gap_minutes(), 30);
        assert!(!is_masked(&links[0], 30));
        assert!(is_masked(&links[0], 31));
        assert_eq!(conflicts_with_buffer(&links[0], 30), Some(false));
        assert_eq!(evaluate(&links, 30).unwrap().overall.links_masked, 0);
    }

    #[test]
    fn test_oversized_buffer_is_an_error_not_a_panic() {
        let rentals = reference_pair();
        let links = build_chains(&rentals);
        let huge = 200_000_000_000_000;

        assert!(matches!(evaluate(&links, huge), Err(AnalysisError::InvalidBuffer(b)) if b == huge));
        assert!(is_masked(&links[0], huge));
        assert_eq!(conflicts_with_buffer(&links[0], huge), Some(false));
    }

    #[test]
    fn test_breakdown_by_next_checkin_type() {
        let mut rentals = reference_pair();
        rentals[1].checkin_type = CheckinType::Connect;
        let links = build_chains(&rentals);
        let outcome = evaluate(&links, 30).unwrap();

        assert!(outcome.by_checkin_type.contains_key(&CheckinType::Connect));
        assert!(!outcome.by_checkin_type.contains_key(&CheckinType::Mobile));
        assert_eq!(outcome.by_checkin_type[&CheckinType::Connect].links_masked, 1);
    }

    // ==========================================================================
    // SWEEP AND CURVE
    // ==========================================================================

    fn mixed_table() -> Vec<Rental> {
        vec![
            rental(1, "A", 0, 600, Some(20)),
            rental(2, "A", 615, 700, Some(-5)),
            rental(3, "A", 760, 900, Some(90)),
            rental(4, "A", 1000, 1100, None),
            rental(5, "B", 0, 100, Some(0)),
            rental(6, "B", 100, 200, Some(10)),
        ]
    }

    #[test]
    fn test_sweep_masking_is_monotone() {
        let rentals = mixed_table();
        let links = build_chains(&rentals);
        let curve = sweep(&links, &BufferSweep::default());

        let masked: Vec<usize> = curve.points.iter().map(|p| p.overall.links_masked).collect();
        assert!(masked.windows(2).all(|w| w[0] <= w[1]), "masked: {:?}", masked);
        assert_eq!(curve.points.len(), 13);
        assert_eq!(curve.points[0].buffer_minutes, 0);
    }

    #[test]
    fn test_sweep_points_match_single_evaluation() {
        let rentals = mixed_table();
        let links = build_chains(&rentals);
        let buffers = BufferSweep::new(vec![0, 60, 120]).unwrap();
        let curve = sweep(&links, &buffers);

        for point in &curve.points {
            assert_eq!(point, &evaluate(&links, point.buffer_minutes).unwrap());
        }
    }

    #[test]
    fn test_value_at_interpolates_and_clamps() {
        let rentals = mixed_table();
        let links = build_chains(&rentals);
        let curve = sweep(&links, &BufferSweep::new(vec![0, 60, 120]).unwrap());

        let at0 = curve.at(0).unwrap().overall.masking_rate;
        let at60 = curve.at(60).unwrap().overall.masking_rate;
        let mid = curve.value_at(RoiMetric::MaskingRate, 30.0).unwrap();
        assert!((mid - (at0 + at60) / 2.0).abs() < 1e-12);

        assert_eq!(curve.value_at(RoiMetric::MaskingRate, -5.0), Some(at0));
        assert_eq!(
            curve.value_at(RoiMetric::MaskingRate, 500.0),
            Some(curve.at(120).unwrap().overall.masking_rate)
        );
        assert_eq!(RoiCurve::default().value_at(RoiMetric::AvoidedRate, 10.0), None);
    }
}
