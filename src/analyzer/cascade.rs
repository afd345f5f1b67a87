//! How a late return carries over to the next rental of the same vehicle.

use super::chain::ChainLink;
use serde::Serialize;

/// Links grouped by how late the previous rental came back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CascadeBucket {
    pub label: String,
    /// Inclusive lower bound (minutes); `None` is unbounded
    pub lower: Option<i64>,
    /// Exclusive upper bound (minutes); `None` is unbounded
    pub upper: Option<i64>,
    /// Sample size; always read alongside the rate
    pub links: usize,
    pub next_canceled: usize,
    /// `None` for an empty bucket
    pub cancellation_rate: Option<f64>,
}

impl CascadeBucket {
    fn new(lower: Option<i64>, upper: Option<i64>) -> Self {
        let label = match (lower, upper) {
            (None, Some(hi)) => format!("<{}", hi),
            (Some(lo), Some(hi)) => format!("{}-{}", lo, hi),
            (Some(lo), None) => format!(">={}", lo),
            (None, None) => "all".to_string(),
        };
        Self {
            label,
            lower,
            upper,
            links: 0,
            next_canceled: 0,
            cancellation_rate: None,
        }
    }

    fn contains(&self, delay_minutes: i64) -> bool {
        self.lower.map_or(true, |lo| delay_minutes >= lo)
            && self.upper.map_or(true, |hi| delay_minutes < hi)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CascadeTable {
    pub buckets: Vec<CascadeBucket>,
    /// Links skipped because the previous return is unknown
    pub unknown_previous_delay: usize,
}

/// Bucket links on previous lateness with `edges` as the bucket boundaries
/// (strictly increasing). Edges `[100, 500]` give `<100`, `100-500`, `>=500`.
pub fn cascade_table(links: &[ChainLink<'_>], edges: &[i64]) -> CascadeTable {
    let mut bounds: Vec<Option<i64>> = vec![None];
    bounds.extend(edges.iter().copied().map(Some));
    bounds.push(None);
    let mut buckets: Vec<CascadeBucket> = bounds
        .windows(2)
        .map(|w| CascadeBucket::new(w[0], w[1]))
        .collect();

    let mut unknown_previous_delay = 0;
    for link in links {
        let Some(delay) = link.previous.delay_minutes() else {
            unknown_previous_delay += 1;
            continue;
        };
        if let Some(bucket) = buckets.iter_mut().find(|b| b.contains(delay)) {
            bucket.links += 1;
            if link.next.is_canceled() {
                bucket.next_canceled += 1;
            }
        }
    }

    for bucket in &mut buckets {
        if bucket.links > 0 {
            bucket.cancellation_rate = Some(bucket.next_canceled as f64 / bucket.links as f64);
        }
    }

    CascadeTable {
        buckets,
        unknown_previous_delay,
    }
}

/// Lateness of the next rental given the previous one is known.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PropagationStats {
    /// Links where both returns are known
    pub pairs: usize,
    pub next_late: usize,
    pub next_late_share: f64,
    pub mean_next_delay_when_late: Option<f64>,
}

pub fn propagation(links: &[ChainLink<'_>]) -> PropagationStats {
    let next_delays: Vec<i64> = links
        .iter()
        .filter(|l| l.previous.actual_checkout_at.is_some())
        .filter_map(|l| l.next.delay_minutes())
        .collect();
    let late: Vec<i64> = next_delays.iter().copied().filter(|&d| d > 0).collect();

    PropagationStats {
        pairs: next_delays.len(),
        next_late: late.len(),
        next_late_share: if next_delays.is_empty() {
            0.0
        } else {
            late.len() as f64 / next_delays.len() as f64
        },
        mean_next_delay_when_late: if late.is_empty() {
            None
        } else {
            Some(late.iter().sum::<i64>() as f64 / late.len() as f64)
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::chain::build_chains;
    use crate::model::fixtures::rental;
    use crate::model::{Rental, RentalStatus};

    fn canceled(mut r: Rental) -> Rental {
        r.status = RentalStatus::Canceled;
        r.actual_checkout_at = None;
        r
    }

    // ==========================================================================
    // CASCADE BUCKETS
    // ==========================================================================
    //
    // Default edges [100, 500, 1000] give four buckets. Each bucket reports
    // its sample size next to the cancellation rate of the following rental.
    // ==========================================================================

    #[test]
    fn test_bucket_labels_and_bounds() {
        let table = cascade_table(&[], &[100, 500, 1000]);
        let labels: Vec<&str> = table.buckets.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["<100", "100-500", "500-1000", ">=1000"]);
        assert!(table.buckets.iter().all(|b| b.links == 0 && b.cancellation_rate.is_none()));
    }

    #[test]
    fn test_next_cancellation_counted_per_bucket() {
        let rentals = vec![
            rental(1, "A", 0, 100, Some(10)),
            canceled(rental(2, "A", 200, 300, None)),
            rental(3, "A", 400, 500, Some(600)),
            rental(4, "A", 1200, 1300, Some(0)),
            rental(5, "B", 0, 100, Some(150)),
            canceled(rental(6, "B", 200, 300, None)),
        ];
        let links = build_chains(&rentals);
        let table = cascade_table(&links, &[100, 500, 1000]);

        // A: 1->2 (prev 10, canceled), 2->3 (prev unknown), 3->4 (prev 600)
        // B: 5->6 (prev 150, canceled)
        assert_eq!(table.unknown_previous_delay, 1);
        assert_eq!(table.buckets[0].links, 1);
        assert_eq!(table.buckets[0].cancellation_rate, Some(1.0));
        assert_eq!(table.buckets[1].links, 1);
        assert_eq!(table.buckets[1].next_canceled, 1);
        assert_eq!(table.buckets[2].links, 1);
        assert_eq!(table.buckets[2].cancellation_rate, Some(0.0));
        assert_eq!(table.buckets[3].links, 0);
    }

    #[test]
    fn test_edge_value_falls_in_upper_bucket() {
        let rentals = vec![
            rental(1, "A", 0, 100, Some(100)),
            rental(2, "A", 500, 600, None),
        ];
        let links = build_chains(&rentals);
        let table = cascade_table(&links, &[100]);
        assert_eq!(table.buckets[0].links, 0);
        assert_eq!(table.buckets[1].links, 1);
    }

    // ==========================================================================
    // PROPAGATION
    // ==========================================================================

    #[test]
    fn test_propagation_needs_both_returns() {
        let rentals = vec![
            rental(1, "A", 0, 100, Some(30)),
            rental(2, "A", 110, 200, Some(20)),
            rental(3, "A", 210, 300, Some(-5)),
            rental(4, "A", 310, 400, None),
            rental(5, "A", 410, 500, Some(40)),
        ];
        let links = build_chains(&rentals);
        let stats = propagation(&links);

        // 1->2 and 2->3 qualify; 3->4 has unknown next, 4->5 unknown previous
        assert_eq!(stats.pairs, 2);
        assert_eq!(stats.next_late, 1);
        assert_eq!(stats.next_late_share, 0.5);
        assert_eq!(stats.mean_next_delay_when_late, Some(20.0));
    }

    #[test]
    fn test_propagation_empty() {
        let stats = propagation(&[]);
        assert_eq!(stats, PropagationStats::default());
    }
}
