//! Revenue exposure of the selected buffer.

use super::buffer::BufferCounts;
use crate::config::ImpactAssumptions;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BusinessImpact {
    pub buffer_minutes: i64,
    /// Links with a known previous return
    pub eligible_links: usize,
    pub masked_links: usize,
    pub masked_share: f64,
    pub historic_conflicts: usize,
    /// Historic conflicts the buffer would have hidden
    pub conflicts_avoided: usize,
    pub avoided_share: f64,
    /// Mean daily price times mean duration
    pub booking_value: f64,
    pub lost_revenue: f64,
    pub baseline_revenue: f64,
    pub revenue_share_affected: f64,
}

impl BusinessImpact {
    pub fn estimate(buffer_minutes: i64, counts: &BufferCounts, assumptions: &ImpactAssumptions) -> Self {
        let booking_value = assumptions.mean_daily_price * assumptions.rental_days;
        let lost_revenue = counts.links_masked as f64 * booking_value * assumptions.loss_rate;
        let baseline_revenue = counts.evaluated_links as f64 * booking_value;

        Self {
            buffer_minutes,
            eligible_links: counts.evaluated_links,
            masked_links: counts.links_masked,
            masked_share: counts.masking_rate,
            historic_conflicts: counts.conflicts_without_buffer,
            conflicts_avoided: counts.conflicts_avoided,
            avoided_share: counts.avoided_rate,
            booking_value,
            lost_revenue,
            baseline_revenue,
            revenue_share_affected: if baseline_revenue > 0.0 {
                lost_revenue / baseline_revenue
            } else {
                0.0
            },
        }
    }
}
