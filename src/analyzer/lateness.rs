//! Per-rental lateness and its distribution.
//!
//! Unknown lateness (no actual checkout) is carried as `None` all the way
//! through: it is counted as unreported and never lands in a bucket.

use super::stats::SummaryStats;
use crate::model::{CheckinType, Rental};
use serde::Serialize;
use std::fmt;

/// Late returns above this many minutes are reported as long delays
pub const LONG_DELAY_MINUTES: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutOutcome {
    Early,
    OnTime,
    Late,
}

impl CheckoutOutcome {
    pub fn classify(delay_minutes: i64) -> Self {
        match delay_minutes {
            d if d < 0 => CheckoutOutcome::Early,
            0 => CheckoutOutcome::OnTime,
            _ => CheckoutOutcome::Late,
        }
    }
}

impl fmt::Display for CheckoutOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CheckoutOutcome::Early => "early",
            CheckoutOutcome::OnTime => "on_time",
            CheckoutOutcome::Late => "late",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DelayRecord {
    pub rental_id: u64,
    pub vehicle_id: String,
    pub checkin_type: CheckinType,
    /// `None` when the actual checkout was never reported
    pub delay_minutes: Option<i64>,
    pub outcome: Option<CheckoutOutcome>,
}

impl DelayRecord {
    pub fn from_rental(rental: &Rental) -> Self {
        let delay_minutes = rental.delay_minutes();
        Self {
            rental_id: rental.rental_id,
            vehicle_id: rental.vehicle_id.clone(),
            checkin_type: rental.checkin_type,
            delay_minutes,
            outcome: delay_minutes.map(CheckoutOutcome::classify),
        }
    }
}

/// Delay records for every rental, ordered by rental id.
pub fn delay_records<'a, I>(rentals: I) -> Vec<DelayRecord>
where
    I: IntoIterator<Item = &'a Rental>,
{
    let mut records: Vec<DelayRecord> = rentals.into_iter().map(DelayRecord::from_rental).collect();
    records.sort_by_key(|r| r.rental_id);
    records
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatenessSummary {
    pub total: usize,
    pub known: usize,
    /// Rentals without an actual checkout
    pub unreported: usize,
    pub unreported_rate: f64,
    pub early: usize,
    pub on_time: usize,
    pub late: usize,
    /// Early returns only (negative minutes)
    pub early_stats: Option<SummaryStats>,
    /// Late returns only (positive minutes)
    pub late_stats: Option<SummaryStats>,
    /// Share of late returns above `LONG_DELAY_MINUTES`
    pub long_delay_share_of_late: f64,
    /// Share of known returns above `LONG_DELAY_MINUTES`
    pub long_delay_share_of_known: f64,
}

fn share(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

pub fn summarize(records: &[DelayRecord]) -> LatenessSummary {
    let known: Vec<i64> = records.iter().filter_map(|r| r.delay_minutes).collect();
    let early: Vec<f64> = known.iter().filter(|&&d| d < 0).map(|&d| d as f64).collect();
    let late: Vec<f64> = known.iter().filter(|&&d| d > 0).map(|&d| d as f64).collect();
    let on_time = known.iter().filter(|&&d| d == 0).count();
    let long = known.iter().filter(|&&d| d > LONG_DELAY_MINUTES).count();

    LatenessSummary {
        total: records.len(),
        known: known.len(),
        unreported: records.len() - known.len(),
        unreported_rate: share(records.len() - known.len(), records.len()),
        early: early.len(),
        on_time,
        late: late.len(),
        early_stats: SummaryStats::from_values(&early),
        late_stats: SummaryStats::from_values(&late),
        long_delay_share_of_late: share(long, late.len()),
        long_delay_share_of_known: share(long, known.len()),
    }
}
